//! In-process fakes shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use harbor_core::{AppConfig, Error};
use url::Url;

use crate::fetch::{Fetcher, Request, Response};
use crate::notify::{Notification, NotificationSink};

pub const ORIGIN: &str = "https://app.test";

pub fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

/// Config pointing at the test origin with a two-entry manifest.
pub fn test_config() -> AppConfig {
    AppConfig {
        origin: ORIGIN.into(),
        cache_prefix: "app".into(),
        version: "v2".into(),
        precache_manifest: vec!["/".into(), "/offline.html".into()],
        timeout_ms: 200,
        retry_base_ms: 100,
        retry_max_ms: 1_000,
        ..Default::default()
    }
}

#[derive(Clone)]
pub enum Scripted {
    Respond(Response),
    Fail(String),
    Hang,
}

/// Network fake keyed by `METHOD url`.
///
/// Each key holds a queue of outcomes; the last one repeats forever.
/// Unscripted keys fail as if the device were offline.
#[derive(Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn offline() -> Self {
        Self::default()
    }

    fn push(&self, key: &str, outcome: Scripted) {
        self.routes.lock().unwrap().entry(key.to_string()).or_default().push_back(outcome);
    }

    /// Script a `GET` for `path` under the test origin.
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.respond(&format!("GET {ORIGIN}{path}"), Response::new(status, body.to_string()))
    }

    pub fn respond(self, key: &str, response: Response) -> Self {
        self.push(key, Scripted::Respond(response));
        self
    }

    pub fn fail(self, key: &str, message: &str) -> Self {
        self.push(key, Scripted::Fail(message.to_string()));
        self
    }

    pub fn hang(self, key: &str) -> Self {
        self.push(key, Scripted::Hang);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_to(&self, key: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|k| k.as_str() == key).count()
    }

    fn next(&self, key: &str) -> Option<Scripted> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(key)?;
        if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() }
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let key = request.display_key();
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(key.clone());

        match self.next(&key) {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(Error::Network(message)),
            Some(Scripted::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::Network("hung request released".into()))
            }
            None => Err(Error::Network(format!("offline: {key}"))),
        }
    }
}

/// Notification sink that records every call in order.
#[derive(Default)]
pub struct RecordingSink {
    fail_show: bool,
    shown: Mutex<Vec<Notification>>,
    events: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self { fail_show: true, ..Default::default() }
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn show(&self, notification: &Notification) -> Result<(), Error> {
        if self.fail_show {
            return Err(Error::NotifyFailed("permission denied".into()));
        }
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn close(&self, id: u64) -> Result<(), Error> {
        self.events.lock().unwrap().push(format!("close:{id}"));
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<(), Error> {
        self.events.lock().unwrap().push(format!("open:{url}"));
        Ok(())
    }
}
