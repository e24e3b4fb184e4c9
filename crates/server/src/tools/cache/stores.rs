//! cache_stores tool implementation.
//!
//! Lists every store with its entry count.

use harbor_client::Worker;
use harbor_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreSummary {
    pub name: String,
    /// Whether the store belongs to the configured version.
    pub current: bool,
    pub entries: u64,
    /// Readable request keys (`METHOD url`).
    pub keys: Vec<String>,
}

/// Output from the cache_stores tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStoresOutput {
    pub stores: Vec<StoreSummary>,
}

pub async fn stores(worker: &Worker) -> Result<CacheStoresOutput, Error> {
    let db = &worker.state().db;
    let names = &worker.state().stores;

    let mut stores = Vec::new();
    for name in db.store_names().await? {
        let keys = db.entry_keys(&name).await?;
        let current = names.is_current(&name);
        let entries = keys.len() as u64;
        stores.push(StoreSummary { name, current, entries, keys });
    }
    Ok(CacheStoresOutput { stores })
}

/// Implementation of the cache_stores tool.
pub async fn stores_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    json_result(&stores(worker).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{active_worker, online};

    #[tokio::test]
    async fn test_lists_current_stores() {
        let (worker, _) = active_worker(online()).await;

        let output = stores(&worker).await.unwrap();
        let names: Vec<_> = output.stores.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["app-runtime-v2", "app-v2"]);
        assert!(output.stores.iter().all(|s| s.current));
        assert_eq!(output.stores[1].entries, 2);
        assert_eq!(output.stores[1].keys[0], "GET https://app.test/");
    }
}
