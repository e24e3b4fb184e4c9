//! Host-side schedule for deferred tasks.
//!
//! Stands in for the platform scheduler: fires the periodic refresh on a
//! fixed interval and replays pending one-shot tags once their back-off has
//! elapsed, giving up after `max_sync_attempts` failures.

use std::time::Duration;

use chrono::{DateTime, Utc};
use harbor_client::{TaskOutcome, UPDATE_PREDICTIONS, Worker};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Start the schedule on its own task.
pub fn spawn(worker: Worker) -> JoinHandle<()> {
    tokio::spawn(run(worker))
}

async fn run(worker: Worker) {
    let config = worker.config();
    let mut refresh = time::interval(config.refresh_interval().max(Duration::from_secs(1)));
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut replay = time::interval(Duration::from_millis(config.retry_base_ms.max(1)));
    replay.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // first tick fires immediately; the first refresh waits a full period
    refresh.tick().await;

    tracing::info!(refresh_secs = config.refresh_interval_secs, "scheduler started");
    loop {
        tokio::select! {
            _ = refresh.tick() => {
                refresh_once(&worker).await;
            }
            _ = replay.tick() => {
                replay_due(&worker, Utc::now()).await;
            }
        }
    }
}

/// Fire the periodic refresh if the worker is active.
pub async fn refresh_once(worker: &Worker) -> Option<TaskOutcome> {
    if !worker.state().lifecycle.is_active().await {
        tracing::debug!("skipping periodic refresh, worker not active");
        return None;
    }
    Some(worker.periodic_sync(UPDATE_PREDICTIONS).await)
}

/// Fire every pending tag whose back-off has elapsed at `now`.
///
/// Returns the tags fired with their outcomes.
pub async fn replay_due(worker: &Worker, now: DateTime<Utc>) -> Vec<(String, TaskOutcome)> {
    let due = match worker.state().tasks.due(now).await {
        Ok(due) => due,
        Err(e) => {
            tracing::warn!("failed to read pending tasks: {}", e);
            return Vec::new();
        }
    };

    let max_attempts = worker.config().max_sync_attempts;
    let mut fired = Vec::new();
    for record in due {
        if record.attempts >= max_attempts {
            tracing::debug!(tag = %record.tag, attempts = record.attempts, "retry limit reached, not replaying");
            continue;
        }
        match worker.sync(&record.tag).await {
            Ok(outcome) => fired.push((record.tag, outcome)),
            Err(e) => tracing::warn!(tag = %record.tag, "replay failed: {}", e),
        }
    }
    fired
}
