//! cache_get tool implementation.
//!
//! Looks a request up in the current stores without touching the network.

use std::collections::BTreeMap;

use harbor_client::{Request, Worker, fetch::Method};
use harbor_core::{Error, Snapshot};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// Method part of the request key (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Limit the lookup to one store; default is runtime then precache.
    #[serde(default)]
    pub store: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    /// Store the entry was found in.
    pub store: String,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub body_bytes: usize,
    pub stored_at: String,
}

impl CacheGetOutput {
    fn new(store: String, snapshot: Snapshot) -> Self {
        let content_type = snapshot.content_type().map(String::from);
        Self {
            store,
            method: snapshot.method,
            url: snapshot.url,
            status_code: snapshot.status_code,
            content_type,
            headers: snapshot.headers,
            body: String::from_utf8_lossy(&snapshot.body).to_string(),
            body_bytes: snapshot.body.len(),
            stored_at: snapshot.stored_at,
        }
    }
}

pub async fn get(worker: &Worker, params: CacheGetParams) -> Result<CacheGetOutput, Error> {
    let origin = worker.config().origin_url()?;
    let mut request = Request::get(&params.url, &origin)?;
    if let Some(method) = params.method.as_deref() {
        request.method = method
            .to_ascii_uppercase()
            .parse::<Method>()
            .map_err(|e| Error::InvalidInput(format!("invalid method {method}: {e}")))?;
    }

    let db = &worker.state().db;
    let key = request.cache_key();
    let hit = match params.store {
        Some(store) => {
            if !db.has_store(&store).await? {
                return Err(Error::InvalidInput(format!("unknown store: {store}")));
            }
            db.get_entry(&store, &key).await?.map(|snapshot| (store, snapshot))
        }
        None => db.match_entry(&worker.state().stores.lookup_order(), &key).await?,
    };

    let (store, snapshot) = hit.ok_or_else(|| Error::CacheMiss(request.display_key()))?;
    Ok(CacheGetOutput::new(store, snapshot))
}

/// Implementation of the cache_get tool.
pub async fn get_impl(worker: &Worker, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    json_result(&get(worker, params).await?)
}
