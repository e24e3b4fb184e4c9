//! status tool implementation.

use harbor_client::{VersionState, Worker};
use harbor_core::{Error, TaskRecord};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Output from the status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusOutput {
    pub version: String,
    pub state: VersionState,
    pub precache_store: String,
    pub runtime_store: String,
    /// Immediate takeover requested (config or SKIP_WAITING).
    pub skip_waiting: bool,
    pub pending_tasks: Vec<TaskRecord>,
}

pub async fn status(worker: &Worker) -> Result<StatusOutput, Error> {
    let state = worker.state();
    Ok(StatusOutput {
        version: state.config.version.clone(),
        state: state.lifecycle.state().await,
        precache_store: state.stores.precache.clone(),
        runtime_store: state.stores.runtime.clone(),
        skip_waiting: state.lifecycle.skip_waiting(),
        pending_tasks: state.tasks.pending().await?,
    })
}

/// Implementation of the status tool.
pub async fn status_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    json_result(&status(worker).await?)
}
