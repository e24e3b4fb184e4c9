//! Messages the application posts to the worker.

use serde::{Deserialize, Serialize};

use super::WorkerState;
use crate::lifecycle::VersionState;

/// A control message, tagged on `type` as the application sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Take over immediately instead of waiting for old clients.
    SkipWaiting,
    /// Fetch these URLs into the runtime store (all or none).
    CacheUrls { urls: Vec<String> },
    /// Delete every store.
    ClearCache,
}

impl ControlMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::SkipWaiting => "SKIP_WAITING",
            ControlMessage::CacheUrls { .. } => "CACHE_URLS",
            ControlMessage::ClearCache => "CLEAR_CACHE",
        }
    }
}

/// Apply a control message. Nothing is returned to the sender; failures are logged.
pub(crate) async fn handle(state: &WorkerState, message: ControlMessage) {
    tracing::debug!(kind = message.kind(), "control message received");

    match message {
        ControlMessage::SkipWaiting => {
            state.lifecycle.request_skip_waiting();
            if state.lifecycle.state().await == VersionState::Installed
                && let Err(e) = state.lifecycle.activate().await
            {
                tracing::warn!("skip-waiting activation failed: {}", e);
            }
        }
        ControlMessage::CacheUrls { urls } => match state.lifecycle.populate_runtime(&urls).await {
            Ok(count) => tracing::info!(count, "cached urls on request"),
            Err(e) => tracing::warn!("CACHE_URLS failed: {}", e),
        },
        ControlMessage::ClearCache => {
            if let Err(e) = state.lifecycle.clear_all().await {
                tracing::warn!("CLEAR_CACHE failed: {}", e);
            }
        }
    }
}
