//! control tool implementation.
//!
//! Posts a control message to the worker. Messages are fire-and-forget; the
//! output only acknowledges delivery.

use harbor_client::{ControlMessage, Event, Worker};
use harbor_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the control tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControlParams {
    /// `{"type": "SKIP_WAITING"}`, `{"type": "CACHE_URLS", "urls": [...]}` or `{"type": "CLEAR_CACHE"}`.
    pub message: ControlMessage,
}

/// Output from the control tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControlOutput {
    pub accepted: bool,
    #[serde(rename = "type")]
    pub kind: String,
}

pub async fn control(worker: &Worker, params: ControlParams) -> Result<ControlOutput, Error> {
    let kind = params.message.kind().to_string();
    worker.dispatch(Event::Message(params.message)).await?;
    Ok(ControlOutput { accepted: true, kind })
}

/// Implementation of the control tool.
pub async fn control_impl(worker: &Worker, params: ControlParams) -> Result<CallToolResult, McpError> {
    json_result(&control(worker, params).await?)
}
