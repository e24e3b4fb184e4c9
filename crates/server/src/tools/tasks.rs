//! Deferred task tools: register_sync, sync and periodic_sync.

use harbor_client::{SYNC_PREDICTIONS, TaskOutcome, UPDATE_PREDICTIONS, Worker};
use harbor_core::{Error, TaskRecord};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters naming a one-shot task tag.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncParams {
    /// Task tag (default: sync-predictions).
    #[serde(default = "default_sync_tag")]
    pub tag: String,
}

impl Default for SyncParams {
    fn default() -> Self {
        Self { tag: default_sync_tag() }
    }
}

fn default_sync_tag() -> String {
    SYNC_PREDICTIONS.into()
}

/// Parameters naming a periodic task tag.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PeriodicSyncParams {
    /// Task tag (default: update-predictions).
    #[serde(default = "default_periodic_tag")]
    pub tag: String,
}

impl Default for PeriodicSyncParams {
    fn default() -> Self {
        Self { tag: default_periodic_tag() }
    }
}

fn default_periodic_tag() -> String {
    UPDATE_PREDICTIONS.into()
}

/// Output from the register_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegisterOutput {
    pub tag: String,
    /// False if the tag was already pending.
    pub created: bool,
    pub pending: Vec<TaskRecord>,
}

/// Result of firing a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaskOutput {
    pub tag: String,
    /// completed, retry, not-pending or unknown-tag.
    pub outcome: String,
    /// Failed attempts so far, on retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    /// How long the host should wait before firing again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl TaskOutput {
    pub fn new(tag: &str, outcome: &TaskOutcome) -> Self {
        let (name, attempt, retry_after_ms) = match outcome {
            TaskOutcome::Completed => ("completed", None, None),
            TaskOutcome::Retry { attempt, backoff } => ("retry", Some(*attempt), Some(backoff.as_millis() as u64)),
            TaskOutcome::NotPending => ("not-pending", None, None),
            TaskOutcome::UnknownTag => ("unknown-tag", None, None),
        };
        Self { tag: tag.to_string(), outcome: name.to_string(), attempt, retry_after_ms }
    }
}

pub async fn register_sync(worker: &Worker, params: SyncParams) -> Result<RegisterOutput, Error> {
    let created = worker.register_sync(&params.tag).await?;
    let pending = worker.state().tasks.pending().await?;
    Ok(RegisterOutput { tag: params.tag, created, pending })
}

pub async fn sync(worker: &Worker, params: SyncParams) -> Result<TaskOutput, Error> {
    let outcome = worker.sync(&params.tag).await?;
    Ok(TaskOutput::new(&params.tag, &outcome))
}

pub async fn periodic_sync(worker: &Worker, params: PeriodicSyncParams) -> TaskOutput {
    let outcome = worker.periodic_sync(&params.tag).await;
    TaskOutput::new(&params.tag, &outcome)
}

/// Implementation of the register_sync tool.
pub async fn register_sync_impl(worker: &Worker, params: SyncParams) -> Result<CallToolResult, McpError> {
    json_result(&register_sync(worker, params).await?)
}

/// Implementation of the sync tool.
pub async fn sync_impl(worker: &Worker, params: SyncParams) -> Result<CallToolResult, McpError> {
    json_result(&sync(worker, params).await?)
}

/// Implementation of the periodic_sync tool.
pub async fn periodic_sync_impl(worker: &Worker, params: PeriodicSyncParams) -> Result<CallToolResult, McpError> {
    json_result(&periodic_sync(worker, params).await)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{ORIGIN, StubFetcher, online, worker};

    #[test]
    fn test_task_output_from_outcome() {
        let retry = TaskOutcome::Retry { attempt: 2, backoff: Duration::from_millis(200) };
        let output = TaskOutput::new(SYNC_PREDICTIONS, &retry);
        assert_eq!(output.outcome, "retry");
        assert_eq!(output.attempt, Some(2));
        assert_eq!(output.retry_after_ms, Some(200));

        let json = serde_json::to_value(TaskOutput::new(SYNC_PREDICTIONS, &TaskOutcome::Completed)).unwrap();
        assert_eq!(json, serde_json::json!({"tag": "sync-predictions", "outcome": "completed"}));
    }

    #[tokio::test]
    async fn test_register_fail_then_replay() {
        let key = format!("POST {ORIGIN}/api/sync-predictions");
        let (worker, fetcher) = worker(StubFetcher::default().route(&key, 503, "busy")).await;

        let registered = register_sync(&worker, SyncParams::default()).await.unwrap();
        assert!(registered.created);
        assert_eq!(registered.pending.len(), 1);

        let failed = sync(&worker, SyncParams::default()).await.unwrap();
        assert_eq!(failed.outcome, "retry");
        assert_eq!(failed.retry_after_ms, Some(100));

        fetcher.set(&key, 200, "ok");
        assert_eq!(sync(&worker, SyncParams::default()).await.unwrap().outcome, "completed");
        assert_eq!(sync(&worker, SyncParams::default()).await.unwrap().outcome, "not-pending");
    }

    #[tokio::test]
    async fn test_unknown_tag_is_rejected_on_register() {
        let (worker, _) = worker(online()).await;
        let err = register_sync_impl(&worker, SyncParams { tag: "bogus".into() }).await.unwrap_err();
        assert_eq!(err.code.0, -32031);
    }

    #[tokio::test]
    async fn test_periodic_sync_swallows_errors() {
        let (worker, _) = worker(online()).await;
        let output = periodic_sync(&worker, PeriodicSyncParams::default()).await;
        assert_eq!(output.outcome, "completed");
    }
}
