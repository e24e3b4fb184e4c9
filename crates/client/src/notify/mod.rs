//! Notification rendering and click routing.
//!
//! Push payloads and periodic refresh results both end up here. Rendering is
//! delegated to a [`NotificationSink`] supplied by the host; a failed render
//! is logged and dropped, never retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use harbor_core::{AppConfig, Error};
use serde::{Deserialize, Serialize};

/// Action id that opens the application.
pub const ACTION_EXPLORE: &str = "explore";

/// Action id that only dismisses.
pub const ACTION_CLOSE: &str = "close";

const VIBRATE_PATTERN: [u32; 3] = [200, 100, 200];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NotificationData {
    /// Milliseconds since the epoch.
    pub date_of_arrival: i64,
    pub primary_key: u32,
}

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vibrate: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NotificationData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<NotificationAction>,
}

/// What a click ended up doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ClickOutcome {
    Dismissed,
    Opened { url: String },
}

/// Host surface that actually displays notifications and windows.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<(), Error>;

    async fn close(&self, id: u64) -> Result<(), Error>;

    /// Open (or focus) an application window at `url`.
    async fn open_window(&self, url: &str) -> Result<(), Error>;
}

/// Sink that emits structured log events instead of drawing anything.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn show(&self, notification: &Notification) -> Result<(), Error> {
        tracing::info!(
            id = notification.id,
            title = %notification.title,
            body = %notification.body,
            actions = notification.actions.len(),
            "notification shown"
        );
        Ok(())
    }

    async fn close(&self, id: u64) -> Result<(), Error> {
        tracing::debug!(id, "notification closed");
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<(), Error> {
        tracing::info!(%url, "open window");
        Ok(())
    }
}

/// Builds notifications and routes user interaction back into the app.
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    title: String,
    icon: String,
    badge: String,
    root: String,
    next_id: AtomicU64,
}

impl NotificationDispatcher {
    pub fn new(config: &AppConfig, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            title: config.notification_title.clone(),
            icon: config.notification_icon.clone(),
            badge: config.notification_badge.clone(),
            root: "/".to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Notification for a push message; an absent payload uses the default text.
    pub fn push_notification(&self, payload: Option<&str>) -> Notification {
        let body = match payload.map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => format!("New notification from {}", self.title),
        };

        Notification {
            id: self.next_id(),
            title: self.title.clone(),
            body,
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            vibrate: VIBRATE_PATTERN.to_vec(),
            data: Some(NotificationData { date_of_arrival: chrono::Utc::now().timestamp_millis(), primary_key: 1 }),
            actions: vec![
                NotificationAction {
                    action: ACTION_EXPLORE.into(),
                    title: "View".into(),
                    icon: "/static/images/checkmark.png".into(),
                },
                NotificationAction {
                    action: ACTION_CLOSE.into(),
                    title: "Close".into(),
                    icon: "/static/images/xmark.png".into(),
                },
            ],
        }
    }

    /// Notification announcing newly available predictions.
    pub fn refresh_notification(&self, new_predictions: u64) -> Notification {
        Notification {
            id: self.next_id(),
            title: self.title.clone(),
            body: format!("{new_predictions} new predictions available!"),
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            vibrate: Vec::new(),
            data: None,
            actions: Vec::new(),
        }
    }

    /// Render a notification.
    ///
    /// Returns None when the sink failed; the failure is logged only.
    pub async fn show(&self, notification: Notification) -> Option<Notification> {
        match self.sink.show(&notification).await {
            Ok(()) => Some(notification),
            Err(e) => {
                tracing::error!(id = notification.id, "failed to render notification: {}", e);
                None
            }
        }
    }

    pub async fn push(&self, payload: Option<&str>) -> Option<Notification> {
        let notification = self.push_notification(payload);
        self.show(notification).await
    }

    pub async fn notify_refresh(&self, new_predictions: u64) -> Option<Notification> {
        let notification = self.refresh_notification(new_predictions);
        self.show(notification).await
    }

    /// Handle a click on notification `id`.
    ///
    /// The notification is always closed first; only `explore` navigates.
    pub async fn click(&self, id: u64, action: Option<&str>) -> Result<ClickOutcome, Error> {
        if let Err(e) = self.sink.close(id).await {
            tracing::warn!(id, "failed to close notification: {}", e);
        }

        match action {
            Some(ACTION_EXPLORE) => {
                self.sink.open_window(&self.root).await?;
                Ok(ClickOutcome::Opened { url: self.root.clone() })
            }
            _ => Ok(ClickOutcome::Dismissed),
        }
    }
}
