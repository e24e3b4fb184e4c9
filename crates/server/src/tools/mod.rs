//! MCP tool implementations.
//!
//! Each tool is a host hook delivered to the worker. Tools follow the same
//! shape: a `*Params` input, a `*Output` result, a typed function doing the
//! work, and an `*_impl` wrapper that renders the output as JSON text.

pub mod cache;
pub mod control;
pub mod fetch;
pub mod lifecycle;
pub mod notify;
pub mod status;
pub mod tasks;

use harbor_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

/// Render a tool output as pretty JSON text content.
pub fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::Serialization(format!("failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
