//! Request classification and the two retrieval strategies.
//!
//! ### Classification (first match wins)
//! 1. Path under the API prefix: network-first
//! 2. Path under the static prefix, or an image/style/script destination: cache-first
//! 3. Anything else: network-first
//!
//! Non-network schemes are never touched. Classification only inspects the
//! path and declared destination; there is no content negotiation.

pub mod cache_first;
pub mod network_first;

use std::sync::Arc;
use std::time::Duration;

use harbor_core::{CacheDb, Error, StoreNames};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::fetch::{Fetcher, Request, Response, fetch_with_timeout, is_network_addressable};

pub use cache_first::cache_first;
pub use network_first::network_first;

/// Which retrieval algorithm handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
}

/// Everything a strategy needs: the store, the network and the fallbacks.
#[derive(Clone)]
pub struct StrategyContext {
    pub db: CacheDb,
    pub fetcher: Arc<dyn Fetcher>,
    pub stores: StoreNames,
    /// Canonical URL of the precached offline document.
    pub offline_page: Url,
    pub timeout: Duration,
}

impl StrategyContext {
    /// Network call bounded by the configured timeout.
    pub(crate) async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        fetch_with_timeout(self.fetcher.as_ref(), request, self.timeout).await
    }

    /// Look the request up in the current stores (runtime, then precache).
    ///
    /// A read failure is logged and treated as a miss.
    pub(crate) async fn lookup(&self, request: &Request) -> Option<Response> {
        match self.db.match_entry(&self.stores.lookup_order(), &request.cache_key()).await {
            Ok(Some((store, snapshot))) => {
                tracing::debug!("cache hit for {} in {}", request.display_key(), store);
                Some(Response::from_snapshot(snapshot))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("cache read failed for {}: {}", request.display_key(), e);
                None
            }
        }
    }

    /// Store a successful response in the runtime store.
    ///
    /// The write runs on its own task: if the caller abandons the request the
    /// write still completes. A failed write is logged and otherwise ignored.
    pub(crate) async fn write_through(&self, request: &Request, response: &Response) {
        if request.method != Method::GET {
            tracing::debug!("not caching non-GET response for {}", request.display_key());
            return;
        }

        let snapshot = response.to_snapshot(request);
        let db = self.db.clone();
        let store = self.stores.runtime.clone();
        let key = request.display_key();

        let write = tokio::spawn(async move { db.put_entry(&store, &snapshot).await });
        match write.await {
            Ok(Ok(())) => tracing::debug!("cached {}", key),
            Ok(Err(e)) => tracing::warn!("failed to cache {}: {}", key, e),
            Err(e) => tracing::warn!("cache write task for {} did not finish: {}", key, e),
        }
    }

    /// The precached offline document, if present.
    pub(crate) async fn offline_fallback(&self) -> Option<Response> {
        let request = Request::new(Method::GET, self.offline_page.clone());
        match self.db.get_entry(&self.stores.precache, &request.cache_key()).await {
            Ok(snapshot) => snapshot.map(Response::from_snapshot),
            Err(e) => {
                tracing::warn!("failed to read offline page: {}", e);
                None
            }
        }
    }
}

/// Routes each intercepted request to exactly one strategy.
#[derive(Clone)]
pub struct Dispatcher {
    ctx: StrategyContext,
    api_prefix: String,
    static_prefix: String,
}

impl Dispatcher {
    pub fn new(ctx: StrategyContext, api_prefix: impl Into<String>, static_prefix: impl Into<String>) -> Self {
        Self { ctx, api_prefix: api_prefix.into(), static_prefix: static_prefix.into() }
    }

    pub fn context(&self) -> &StrategyContext {
        &self.ctx
    }

    /// Pick a strategy, or None when the request must not be touched.
    pub fn classify(&self, request: &Request) -> Option<Strategy> {
        if !is_network_addressable(&request.url) {
            return None;
        }

        let path = request.url.path();
        if path.starts_with(&self.api_prefix) {
            return Some(Strategy::NetworkFirst);
        }
        if path.starts_with(&self.static_prefix) || request.destination.is_static_asset() {
            return Some(Strategy::CacheFirst);
        }
        Some(Strategy::NetworkFirst)
    }

    /// Produce a response for an intercepted request.
    ///
    /// None means the request was left alone and the caller should go to
    /// the network directly.
    pub async fn handle(&self, request: &Request) -> Option<Response> {
        let strategy = self.classify(request)?;
        tracing::debug!(?strategy, "dispatching {}", request.display_key());

        let response = match strategy {
            Strategy::CacheFirst => cache_first(&self.ctx, request).await,
            Strategy::NetworkFirst => network_first(&self.ctx, request).await,
        };
        Some(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{Destination, ResponseSource};
    use crate::testing::{ORIGIN, ScriptedFetcher, origin, test_config};

    async fn dispatcher(fetcher: ScriptedFetcher) -> (Dispatcher, Arc<ScriptedFetcher>) {
        let config = test_config();
        let fetcher = Arc::new(fetcher);
        let ctx = StrategyContext {
            db: CacheDb::open_in_memory().await.unwrap(),
            fetcher: fetcher.clone(),
            stores: config.store_names(),
            offline_page: config.resolve(&config.offline_page).unwrap(),
            timeout: config.timeout(),
        };
        (Dispatcher::new(ctx, &config.api_prefix, &config.static_prefix), fetcher)
    }

    #[tokio::test]
    async fn test_classify_precedence() {
        let (dispatcher, _) = dispatcher(ScriptedFetcher::offline()).await;
        let o = origin();

        let api = Request::get("/api/predictions/today", &o).unwrap();
        assert_eq!(dispatcher.classify(&api), Some(Strategy::NetworkFirst));

        let api_image = Request::get("/api/avatar.png", &o).unwrap().with_destination(Destination::Image);
        assert_eq!(dispatcher.classify(&api_image), Some(Strategy::NetworkFirst));

        let asset = Request::get("/static/css/responsive.css", &o).unwrap();
        assert_eq!(dispatcher.classify(&asset), Some(Strategy::CacheFirst));

        let script = Request::get("/vendor/lib.js", &o).unwrap().with_destination(Destination::Script);
        assert_eq!(dispatcher.classify(&script), Some(Strategy::CacheFirst));

        let font = Request::get("/fonts/a.woff2", &o).unwrap().with_destination(Destination::Font);
        assert_eq!(dispatcher.classify(&font), Some(Strategy::NetworkFirst));

        let page = Request::navigate("/dashboard", &o).unwrap();
        assert_eq!(dispatcher.classify(&page), Some(Strategy::NetworkFirst));
    }

    #[tokio::test]
    async fn test_non_network_scheme_is_ignored() {
        let (dispatcher, fetcher) = dispatcher(ScriptedFetcher::offline()).await;
        let request = Request::new(Method::GET, Url::parse("chrome-extension://abc/static/x.js").unwrap());

        assert_eq!(dispatcher.classify(&request), None);
        assert!(dispatcher.handle(&request).await.is_none());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_handle_routes_static_to_cache_first() {
        let fetcher = ScriptedFetcher::offline().on_get("/static/js/app.js", 200, "console.log(1)");
        let (dispatcher, fetcher) = dispatcher(fetcher).await;
        let request = Request::get("/static/js/app.js", &origin()).unwrap();

        let first = dispatcher.handle(&request).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);
        let second = dispatcher.handle(&request).await.unwrap();
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(fetcher.calls_to(&format!("GET {ORIGIN}/static/js/app.js")), 1);
    }

    #[tokio::test]
    async fn test_write_through_skips_non_get() {
        let (dispatcher, _) = dispatcher(ScriptedFetcher::offline()).await;
        let ctx = dispatcher.context();
        let request = Request::new(Method::POST, origin().join("/api/sync-predictions").unwrap());

        ctx.write_through(&request, &Response::new(200, "ok")).await;
        assert_eq!(ctx.db.count_entries(&ctx.stores.runtime).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lookup_prefers_runtime_over_precache() {
        let (dispatcher, _) = dispatcher(ScriptedFetcher::offline()).await;
        let ctx = dispatcher.context();
        let request = Request::get("/", &origin()).unwrap();

        ctx.db.put_entry(&ctx.stores.precache, &Response::new(200, "precached").to_snapshot(&request)).await.unwrap();
        assert_eq!(ctx.lookup(&request).await.unwrap().text(), "precached");

        ctx.write_through(&request, &Response::new(200, "fresh")).await;
        assert_eq!(ctx.lookup(&request).await.unwrap().text(), "fresh");
    }

    #[tokio::test]
    async fn test_write_through_survives_caller_abort() {
        let (dispatcher, _) = dispatcher(ScriptedFetcher::offline().on_get("/api/x", 200, "fresh")).await;
        let ctx = dispatcher.context().clone();
        let request = Request::get("/api/x", &origin()).unwrap();

        // Hold the connection so the write is still queued when the caller goes away.
        let db = ctx.db.clone();
        let blocker = tokio::spawn(async move { db.block_for(Duration::from_millis(100)).await });
        tokio::task::yield_now().await;

        let handle = {
            let (ctx, request) = (ctx.clone(), request.clone());
            tokio::spawn(async move { network_first(&ctx, &request).await })
        };
        tokio::task::yield_now().await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        blocker.await.unwrap().unwrap();

        let mut cached = None;
        for _ in 0..50 {
            cached = ctx.lookup(&request).await;
            if cached.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(cached.unwrap().text(), "fresh");
    }

    #[tokio::test]
    async fn test_failed_cache_write_still_returns_network_response() {
        let fetcher = ScriptedFetcher::offline().on_get("/static/js/app.js", 200, "app").on_get("/api/x", 200, "api");
        let (dispatcher, fetcher) = dispatcher(fetcher).await;
        let ctx = dispatcher.context();
        ctx.db.break_entries().await.unwrap();

        let asset = Request::get("/static/js/app.js", &origin()).unwrap();
        let response = cache_first(ctx, &asset).await;
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(response.text(), "app");

        let api = Request::get("/api/x", &origin()).unwrap();
        let response = network_first(ctx, &api).await;
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(response.text(), "api");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_cache_read_is_a_miss() {
        let fetcher = ScriptedFetcher::offline().on_get("/static/app.css", 200, "body{}");
        let (dispatcher, fetcher) = dispatcher(fetcher).await;
        let ctx = dispatcher.context();
        let request = Request::get("/static/app.css", &origin()).unwrap();
        ctx.write_through(&request, &Response::new(200, "stale")).await;
        ctx.db.break_entries().await.unwrap();

        assert!(ctx.lookup(&request).await.is_none());
        let response = cache_first(ctx, &request).await;
        assert_eq!(response.text(), "body{}");
        assert_eq!(fetcher.calls(), 1);

        let page = Request::navigate("/dashboard", &origin()).unwrap();
        let response = network_first(ctx, &page).await;
        assert_eq!(response.status, 503);
        assert_eq!(response.source, ResponseSource::Unavailable);
        assert!(response.error.is_some());
    }
}
