//! Cache-first retrieval for static assets.

use crate::fetch::{Destination, Request, Response};

use super::StrategyContext;

/// Body of the 503 returned when neither cache nor network can answer.
pub const OFFLINE_BODY: &str = "Offline";

/// Serve from cache, falling back to the network on a miss.
///
/// A hit never touches the network and is never revalidated. When the
/// network fails, images get a placeholder and everything else gets a 503.
pub async fn cache_first(ctx: &StrategyContext, request: &Request) -> Response {
    if let Some(cached) = ctx.lookup(request).await {
        return cached;
    }

    match ctx.fetch(request).await {
        Ok(response) => {
            if response.is_cacheable() {
                ctx.write_through(request, &response).await;
            }
            response
        }
        Err(e) => {
            tracing::debug!("network failed for {}: {}", request.display_key(), e);
            if request.destination == Destination::Image {
                Response::placeholder_image()
            } else {
                Response::unavailable(OFFLINE_BODY, e)
            }
        }
    }
}
