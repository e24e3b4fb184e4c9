//! Network-first retrieval for API calls and documents.

use crate::fetch::{Request, Response, ResponseSource};

use super::StrategyContext;

/// Body of the 503 returned when every fallback is exhausted.
pub const OFFLINE_BODY: &str = "Offline - no network connection";

/// Prefer a fresh network response, degrading to cache and then the offline page.
///
/// Fallback chain on network failure (timeouts included):
/// 1. the cached snapshot for this request key
/// 2. the precached offline document, for navigations only
/// 3. a 503 carrying the network error
pub async fn network_first(ctx: &StrategyContext, request: &Request) -> Response {
    let error = match ctx.fetch(request).await {
        Ok(response) => {
            if response.is_cacheable() {
                ctx.write_through(request, &response).await;
            }
            return response;
        }
        Err(e) => e,
    };

    tracing::debug!("network failed for {}, trying cache: {}", request.display_key(), error);

    if let Some(cached) = ctx.lookup(request).await {
        return cached;
    }

    if request.is_navigation() {
        if let Some(page) = ctx.offline_fallback().await {
            return page.with_source(ResponseSource::OfflineFallback);
        }
        tracing::warn!("offline page {} missing from precache", ctx.offline_page);
    }

    Response::unavailable(OFFLINE_BODY, error)
}
