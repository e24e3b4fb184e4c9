//! fetch tool implementation.
//!
//! Delivers an intercepted request to the worker. Requests the worker does
//! not intercept go straight to the network, as a browser would.

use std::collections::BTreeMap;

use harbor_client::fetch::{Method, fetch_with_timeout};
use harbor_client::{Destination, Request, RequestMode, ResponseSource, Strategy, Worker};
use harbor_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the fetch tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Declared resource category: document, image, style, script, font, manifest.
    #[serde(default)]
    pub destination: Option<String>,

    /// Request mode: navigate, same-origin, no-cors, cors.
    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body as text.
    #[serde(default)]
    pub body: Option<String>,
}

/// Output from the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchOutput {
    /// Canonical URL the request resolved to.
    pub url: String,
    /// False when the worker left the request alone.
    pub intercepted: bool,
    pub strategy: Option<Strategy>,
    pub status: u16,
    pub source: ResponseSource,
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    /// Underlying failure for synthesized responses.
    pub error: Option<String>,
}

fn build_request(worker: &Worker, params: FetchParams) -> Result<Request, Error> {
    let origin = worker.config().origin_url()?;
    let mut request = Request::get(&params.url, &origin)?;

    if let Some(method) = params.method.as_deref() {
        request.method = method
            .to_ascii_uppercase()
            .parse::<Method>()
            .map_err(|e| Error::InvalidInput(format!("invalid method {method}: {e}")))?;
    }
    if let Some(destination) = params.destination.as_deref() {
        request = request.with_destination(destination.parse::<Destination>()?);
    }
    if let Some(mode) = params.mode.as_deref() {
        request = request.with_mode(mode.parse::<RequestMode>()?);
    }
    for (name, value) in &params.headers {
        request = request.with_header(name, value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }
    Ok(request)
}

pub async fn fetch(worker: &Worker, params: FetchParams) -> Result<FetchOutput, Error> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()));
    }
    let request = build_request(worker, params)?;
    let strategy = worker.state().dispatcher.classify(&request);

    let (intercepted, response) = match worker.handle_fetch(&request).await {
        Some(response) => (true, response),
        None => {
            let fetcher = worker.state().fetcher.as_ref();
            (false, fetch_with_timeout(fetcher, &request, worker.config().timeout()).await?)
        }
    };

    let body = response.text();
    Ok(FetchOutput {
        url: request.url.to_string(),
        intercepted,
        strategy: if intercepted { strategy } else { None },
        status: response.status,
        source: response.source,
        headers: response.headers,
        body,
        error: response.error,
    })
}

/// Implementation of the fetch tool.
pub async fn fetch_impl(worker: &Worker, params: FetchParams) -> Result<CallToolResult, McpError> {
    json_result(&fetch(worker, params).await?)
}
