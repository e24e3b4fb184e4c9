//! Periodic refresh of today's predictions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use harbor_core::{AppConfig, Error};
use reqwest::Method;
use serde::Deserialize;
use url::Url;

use super::TaskHandler;
use crate::fetch::{Fetcher, Request, fetch_with_timeout};
use crate::notify::NotificationDispatcher;

/// Shape of the refresh endpoint payload; other fields are ignored.
#[derive(Debug, Deserialize)]
struct RefreshPayload {
    #[serde(default)]
    new_predictions: i64,
}

/// Fetches the refresh endpoint and announces new predictions.
pub struct RefreshHandler {
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<NotificationDispatcher>,
    endpoint: Url,
    timeout: Duration,
}

impl RefreshHandler {
    pub fn new(
        config: &AppConfig, fetcher: Arc<dyn Fetcher>, notifier: Arc<NotificationDispatcher>,
    ) -> Result<Self, Error> {
        Ok(Self { fetcher, notifier, endpoint: config.resolve(&config.refresh_endpoint)?, timeout: config.timeout() })
    }
}

#[async_trait]
impl TaskHandler for RefreshHandler {
    async fn run(&self, tag: &str) -> Result<(), Error> {
        let request = Request::new(Method::GET, self.endpoint.clone());
        let response = fetch_with_timeout(self.fetcher.as_ref(), &request, self.timeout).await?;

        // The body is read whatever the status; an unparseable one fails the run.
        let payload: RefreshPayload = serde_json::from_slice(&response.body)?;
        tracing::debug!(tag, status = response.status, new_predictions = payload.new_predictions, "refresh fetched");

        if payload.new_predictions > 0 {
            self.notifier.notify_refresh(payload.new_predictions as u64).await;
        }
        Ok(())
    }
}
