//! Deferred task queue: tag-to-handler bindings with explicit retry.
//!
//! ### Contract
//!
//! - A one-shot tag (`sync-predictions`) must be registered before it can
//!   fire. Its registration is persisted and only cleared when a handler run
//!   succeeds. Firing a tag that is not pending does nothing, so the host may
//!   replay freely.
//! - A periodic tag (`update-predictions`) is never registered. Every firing
//!   runs the handler and failures stay local.
//! - Handlers return `Result`; the queue turns a failure into
//!   [`TaskOutcome::Retry`] with the back-off the host should wait.

pub mod refresh;
pub mod sync;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harbor_core::{AppConfig, CacheDb, Error, TaskRecord};
use tokio::sync::Mutex;

pub use refresh::RefreshHandler;
pub use sync::SyncHandler;

/// Tag for replaying queued prediction mutations.
pub const SYNC_PREDICTIONS: &str = "sync-predictions";

/// Tag for the periodic prediction refresh.
pub const UPDATE_PREDICTIONS: &str = "update-predictions";

/// Work bound to a tag.
///
/// Handlers may run several times for one registration and must be safe to repeat.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, tag: &str) -> Result<(), Error>;
}

/// Result of firing a tag, as reported to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Handler succeeded; the registration is gone.
    Completed,
    /// Handler failed; fire again after `backoff`.
    Retry { attempt: u32, backoff: Duration },
    /// Nothing registered under this tag.
    NotPending,
    /// No handler is bound to this tag.
    UnknownTag,
}

/// Exponential back-off: `base * 2^(attempt - 1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Duration::from_millis(config.retry_base_ms), Duration::from_millis(config.retry_max_ms))
    }

    /// Delay before retrying after `attempt` failures.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base.saturating_mul(2u32.pow(exponent)).min(self.max)
    }

    /// Whether a pending record has waited out its back-off.
    pub fn is_due(&self, record: &TaskRecord, now: DateTime<Utc>) -> bool {
        if record.attempts == 0 {
            return true;
        }
        let Some(last) = record.last_attempt_at.as_deref().and_then(|s| DateTime::parse_from_rfc3339(s).ok()) else {
            return true;
        };
        match chrono::Duration::from_std(self.delay(record.attempts)) {
            Ok(delay) => last.with_timezone(&Utc) + delay <= now,
            Err(_) => false,
        }
    }
}

/// Binds tags to handlers and tracks pending registrations.
pub struct TaskQueue {
    db: CacheDb,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    periodic: HashMap<String, Arc<dyn TaskHandler>>,
    backoff: Backoff,
    firing: Mutex<()>,
}

impl TaskQueue {
    pub fn new(db: CacheDb, backoff: Backoff) -> Self {
        Self { db, handlers: HashMap::new(), periodic: HashMap::new(), backoff, firing: Mutex::new(()) }
    }

    /// Bind a one-shot, retryable handler.
    pub fn with_handler(mut self, tag: &str, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(tag.to_string(), handler);
        self
    }

    /// Bind a periodic handler whose failures are swallowed.
    pub fn with_periodic(mut self, tag: &str, handler: Arc<dyn TaskHandler>) -> Self {
        self.periodic.insert(tag.to_string(), handler);
        self
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Record that `tag` must run once connectivity returns.
    ///
    /// Returns false if it was already pending.
    pub async fn register(&self, tag: &str) -> Result<bool, Error> {
        if !self.handlers.contains_key(tag) {
            return Err(Error::UnknownTask(tag.to_string()));
        }
        let created = self.db.register_task(tag).await?;
        tracing::info!(tag, created, "deferred task registered");
        Ok(created)
    }

    pub async fn pending(&self) -> Result<Vec<TaskRecord>, Error> {
        self.db.pending_tasks().await
    }

    /// Pending registrations whose back-off has elapsed.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<TaskRecord>, Error> {
        let pending = self.db.pending_tasks().await?;
        Ok(pending.into_iter().filter(|record| self.backoff.is_due(record, now)).collect())
    }

    /// Run the handler for a pending one-shot tag.
    ///
    /// Firings are serialized so two replays of the same tag cannot both
    /// perform the side effect.
    pub async fn fire(&self, tag: &str) -> Result<TaskOutcome, Error> {
        let Some(handler) = self.handlers.get(tag) else {
            tracing::warn!(tag, "no handler bound");
            return Ok(TaskOutcome::UnknownTag);
        };

        let _guard = self.firing.lock().await;
        if self.db.get_task(tag).await?.is_none() {
            tracing::debug!(tag, "not pending, nothing to do");
            return Ok(TaskOutcome::NotPending);
        }

        match handler.run(tag).await {
            Ok(()) => {
                self.db.complete_task(tag).await?;
                tracing::info!(tag, "deferred task completed");
                Ok(TaskOutcome::Completed)
            }
            Err(e) => {
                let attempt = self.db.record_task_failure(tag, &e.to_string()).await?;
                let backoff = self.backoff.delay(attempt);
                tracing::warn!(tag, attempt, backoff_ms = backoff.as_millis() as u64, "deferred task failed: {}", e);
                Ok(TaskOutcome::Retry { attempt, backoff })
            }
        }
    }

    /// Run a periodic handler; errors are logged and never retried.
    pub async fn fire_periodic(&self, tag: &str) -> TaskOutcome {
        let Some(handler) = self.periodic.get(tag) else {
            tracing::warn!(tag, "no periodic handler bound");
            return TaskOutcome::UnknownTag;
        };

        if let Err(e) = handler.run(tag).await {
            tracing::warn!(tag, "periodic task failed: {}", e);
        }
        TaskOutcome::Completed
    }
}
