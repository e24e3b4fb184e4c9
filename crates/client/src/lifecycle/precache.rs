//! Concurrent population of a store from a list of URLs.

use std::time::Duration;

use futures_util::future::try_join_all;
use harbor_core::{Error, Snapshot};
use reqwest::Method;
use url::Url;

use crate::fetch::{Fetcher, Request, fetch_with_timeout};

/// Fetch every URL and capture the responses as snapshots.
///
/// All requests run concurrently. The first network error or non-cacheable
/// status fails the whole batch, so callers never see a partial list.
pub async fn fetch_all(fetcher: &dyn Fetcher, urls: &[Url], timeout: Duration) -> Result<Vec<Snapshot>, Error> {
    let fetches = urls.iter().map(|url| async move {
        let request = Request::new(Method::GET, url.clone());
        let response = fetch_with_timeout(fetcher, &request, timeout).await?;
        if !response.is_cacheable() {
            return Err(Error::HttpError(format!("{} returned {}", request.display_key(), response.status)));
        }
        Ok(response.to_snapshot(&request))
    });

    try_join_all(fetches).await
}
