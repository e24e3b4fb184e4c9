//! Replay of queued prediction mutations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use harbor_core::{AppConfig, Error};
use reqwest::Method;
use url::Url;

use super::TaskHandler;
use crate::fetch::{Fetcher, Request, fetch_with_timeout};

/// Posts once to the sync endpoint.
///
/// Any network error or non-2xx status is a failure, which keeps the
/// registration pending for the next replay.
pub struct SyncHandler {
    fetcher: Arc<dyn Fetcher>,
    endpoint: Url,
    timeout: Duration,
}

impl SyncHandler {
    pub fn new(config: &AppConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        Ok(Self { fetcher, endpoint: config.resolve(&config.sync_endpoint)?, timeout: config.timeout() })
    }
}

#[async_trait]
impl TaskHandler for SyncHandler {
    async fn run(&self, tag: &str) -> Result<(), Error> {
        let request = Request::new(Method::POST, self.endpoint.clone());
        let response = fetch_with_timeout(self.fetcher.as_ref(), &request, self.timeout).await?;

        if !response.ok() {
            return Err(Error::TaskFailed(format!("{tag}: {} returned {}", request.display_key(), response.status)));
        }

        tracing::info!(tag, status = response.status, "sync completed");
        Ok(())
    }
}
