//! Worker fixtures for the tool and scheduler tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use harbor_client::{Fetcher, Request, Response, TracingSink, Worker};
use harbor_core::{AppConfig, CacheDb, Error};

pub const ORIGIN: &str = "https://app.test";

/// Network fake: fixed responses per `METHOD url`, everything else offline.
#[derive(Default)]
pub struct StubFetcher {
    routes: Mutex<HashMap<String, (u16, String)>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn route(self, key: &str, status: u16, body: &str) -> Self {
        self.routes.lock().unwrap().insert(key.to_string(), (status, body.to_string()));
        self
    }

    pub fn get(self, path: &str, status: u16, body: &str) -> Self {
        self.route(&format!("GET {ORIGIN}{path}"), status, body)
    }

    /// Change or add a route after the worker was built.
    pub fn set(&self, key: &str, status: u16, body: &str) {
        self.routes.lock().unwrap().insert(key.to_string(), (status, body.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = request.display_key();
        match self.routes.lock().unwrap().get(&key) {
            Some((status, body)) => Ok(Response::new(*status, body.clone())),
            None => Err(Error::Network(format!("offline: {key}"))),
        }
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        origin: ORIGIN.into(),
        cache_prefix: "app".into(),
        version: "v2".into(),
        precache_manifest: vec!["/".into(), "/offline.html".into()],
        timeout_ms: 200,
        retry_base_ms: 100,
        retry_max_ms: 1_000,
        max_sync_attempts: 3,
        ..Default::default()
    }
}

/// A fetcher that serves the two manifest entries.
pub fn online() -> StubFetcher {
    StubFetcher::default().get("/", 200, "<h1>home</h1>").get("/offline.html", 200, "<h1>offline</h1>")
}

pub async fn worker(fetcher: StubFetcher) -> (Worker, Arc<StubFetcher>) {
    let fetcher = Arc::new(fetcher);
    let db = CacheDb::open_in_memory().await.unwrap();
    let worker = Worker::new(test_config(), db, fetcher.clone(), Arc::new(TracingSink)).unwrap();
    (worker, fetcher)
}

/// A worker that has installed and activated.
pub async fn active_worker(fetcher: StubFetcher) -> (Worker, Arc<StubFetcher>) {
    let (worker, fetcher) = worker(fetcher).await;
    worker.install().await.unwrap();
    worker.activate(0).await.unwrap();
    (worker, fetcher)
}
