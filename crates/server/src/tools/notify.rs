//! push and notification_click tools.

use harbor_client::{ClickOutcome, Event, EventOutcome, Notification, Worker};
use harbor_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the push tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PushParams {
    /// Push message text; absent uses the default body.
    #[serde(default)]
    pub payload: Option<String>,
}

/// Output from the push tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushOutput {
    /// False when rendering failed; the message is not retried.
    pub shown: bool,
    pub notification: Option<Notification>,
}

/// Parameters for the notification_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClickParams {
    /// Id of the clicked notification.
    pub id: u64,
    /// Action button (`explore` or `close`); absent for a body click.
    #[serde(default)]
    pub action: Option<String>,
}

pub async fn push(worker: &Worker, params: PushParams) -> Result<PushOutput, Error> {
    match worker.dispatch(Event::Push { payload: params.payload }).await? {
        EventOutcome::Notification(notification) => Ok(PushOutput { shown: notification.is_some(), notification }),
        other => Err(Error::InvalidInput(format!("unexpected push outcome: {other:?}"))),
    }
}

pub async fn click(worker: &Worker, params: ClickParams) -> Result<ClickOutcome, Error> {
    worker.notification_click(params.id, params.action.as_deref()).await
}

/// Implementation of the push tool.
pub async fn push_impl(worker: &Worker, params: PushParams) -> Result<CallToolResult, McpError> {
    json_result(&push(worker, params).await?)
}

/// Implementation of the notification_click tool.
pub async fn click_impl(worker: &Worker, params: ClickParams) -> Result<CallToolResult, McpError> {
    json_result(&click(worker, params).await?)
}
