//! The worker: shared state plus an event dispatch table.
//!
//! Every host hook (lifecycle, fetch, message, sync, push, click) arrives as
//! an [`Event`]. Each event is handled against the same [`WorkerState`],
//! built once at start and shared behind an `Arc`, so handlers can run
//! concurrently on independent tasks.

pub mod control;

use std::sync::Arc;

use harbor_core::{AppConfig, CacheDb, Error, StoreNames};

use crate::fetch::{Fetcher, Request, Response};
use crate::lifecycle::LifecycleManager;
use crate::notify::{ClickOutcome, Notification, NotificationDispatcher, NotificationSink};
use crate::strategy::{Dispatcher, StrategyContext};
use crate::tasks::{Backoff, RefreshHandler, SYNC_PREDICTIONS, SyncHandler, TaskOutcome, TaskQueue, UPDATE_PREDICTIONS};

pub use control::ControlMessage;

/// Everything the event handlers share.
pub struct WorkerState {
    pub config: AppConfig,
    pub stores: StoreNames,
    pub db: CacheDb,
    pub fetcher: Arc<dyn Fetcher>,
    pub lifecycle: LifecycleManager,
    pub dispatcher: Dispatcher,
    pub tasks: TaskQueue,
    pub notifier: Arc<NotificationDispatcher>,
}

/// A host hook delivered to the worker.
#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate { clients_on_previous: usize },
    Fetch(Request),
    Message(ControlMessage),
    Sync { tag: String },
    PeriodicSync { tag: String },
    Push { payload: Option<String> },
    NotificationClick { id: u64, action: Option<String> },
}

/// What handling an event produced.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed { entries: usize },
    Activated { deleted: Vec<String> },
    /// Installed, but clients of the previous version hold activation back.
    Waiting,
    /// `None` when the request was not intercepted.
    Response(Option<Response>),
    /// Control messages never answer.
    Accepted,
    Task(TaskOutcome),
    Notification(Option<Notification>),
    Click(ClickOutcome),
}

#[derive(Clone)]
pub struct Worker {
    state: Arc<WorkerState>,
}

impl Worker {
    /// Wire the worker for the configured version.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin, manifest or fixed endpoints do not resolve.
    pub fn new(
        config: AppConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>, sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, Error> {
        let stores = config.store_names();
        let notifier = Arc::new(NotificationDispatcher::new(&config, sink));
        let lifecycle = LifecycleManager::new(&config, db.clone(), fetcher.clone())?;

        let ctx = StrategyContext {
            db: db.clone(),
            fetcher: fetcher.clone(),
            stores: stores.clone(),
            offline_page: config.resolve(&config.offline_page)?,
            timeout: config.timeout(),
        };
        let dispatcher = Dispatcher::new(ctx, &config.api_prefix, &config.static_prefix);

        let sync = SyncHandler::new(&config, fetcher.clone())?;
        let refresh = RefreshHandler::new(&config, fetcher.clone(), notifier.clone())?;
        let tasks = TaskQueue::new(db.clone(), Backoff::from_config(&config))
            .with_handler(SYNC_PREDICTIONS, Arc::new(sync))
            .with_periodic(UPDATE_PREDICTIONS, Arc::new(refresh));

        let state = WorkerState { config, stores, db, fetcher, lifecycle, dispatcher, tasks, notifier };
        Ok(Self { state: Arc::new(state) })
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.config
    }

    pub async fn install(&self) -> Result<usize, Error> {
        self.state.lifecycle.install().await
    }

    /// `Ok(None)` while waiting on clients of the previous version.
    pub async fn activate(&self, clients_on_previous: usize) -> Result<Option<Vec<String>>, Error> {
        self.state.lifecycle.try_activate(clients_on_previous).await
    }

    /// Intercept a request.
    ///
    /// Nothing is intercepted until the version is active; `None` tells the
    /// host to perform a plain network fetch.
    pub async fn handle_fetch(&self, request: &Request) -> Option<Response> {
        if !self.state.lifecycle.is_active().await {
            tracing::debug!("not active, passing through {}", request.display_key());
            return None;
        }
        self.state.dispatcher.handle(request).await
    }

    pub async fn handle_message(&self, message: ControlMessage) {
        control::handle(&self.state, message).await
    }

    pub async fn register_sync(&self, tag: &str) -> Result<bool, Error> {
        self.state.tasks.register(tag).await
    }

    pub async fn sync(&self, tag: &str) -> Result<TaskOutcome, Error> {
        self.state.tasks.fire(tag).await
    }

    pub async fn periodic_sync(&self, tag: &str) -> TaskOutcome {
        self.state.tasks.fire_periodic(tag).await
    }

    pub async fn push(&self, payload: Option<&str>) -> Option<Notification> {
        self.state.notifier.push(payload).await
    }

    pub async fn notification_click(&self, id: u64, action: Option<&str>) -> Result<ClickOutcome, Error> {
        self.state.notifier.click(id, action).await
    }

    /// Route one event to its handler.
    pub async fn dispatch(&self, event: Event) -> Result<EventOutcome, Error> {
        match event {
            Event::Install => Ok(EventOutcome::Installed { entries: self.install().await? }),
            Event::Activate { clients_on_previous } => Ok(match self.activate(clients_on_previous).await? {
                Some(deleted) => EventOutcome::Activated { deleted },
                None => EventOutcome::Waiting,
            }),
            Event::Fetch(request) => Ok(EventOutcome::Response(self.handle_fetch(&request).await)),
            Event::Message(message) => {
                self.handle_message(message).await;
                Ok(EventOutcome::Accepted)
            }
            Event::Sync { tag } => Ok(EventOutcome::Task(self.sync(&tag).await?)),
            Event::PeriodicSync { tag } => Ok(EventOutcome::Task(self.periodic_sync(&tag).await)),
            Event::Push { payload } => Ok(EventOutcome::Notification(self.push(payload.as_deref()).await)),
            Event::NotificationClick { id, action } => {
                Ok(EventOutcome::Click(self.notification_click(id, action.as_deref()).await?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{Destination, ResponseSource};
    use crate::lifecycle::VersionState;
    use crate::testing::{ORIGIN, RecordingSink, ScriptedFetcher, origin, test_config};

    async fn worker(fetcher: ScriptedFetcher) -> (Worker, Arc<ScriptedFetcher>, Arc<RecordingSink>) {
        let fetcher = Arc::new(fetcher);
        let sink = Arc::new(RecordingSink::default());
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = Worker::new(test_config(), db, fetcher.clone(), sink.clone()).unwrap();
        (worker, fetcher, sink)
    }

    /// Both manifest entries answer once, then the network goes away.
    fn online_then_offline() -> ScriptedFetcher {
        ScriptedFetcher::offline()
            .on_get("/", 200, "<h1>home</h1>")
            .fail(&format!("GET {ORIGIN}/"), "network unreachable")
            .on_get("/offline.html", 200, "<h1>offline</h1>")
            .fail(&format!("GET {ORIGIN}/offline.html"), "network unreachable")
    }

    #[tokio::test]
    async fn test_install_activate_then_serve_offline() {
        let (worker, _, _) = worker(online_then_offline()).await;
        let db = worker.state().db.clone();
        db.open_store("app-v1").await.unwrap();
        db.open_store("app-runtime-v1").await.unwrap();

        let installed = worker.dispatch(Event::Install).await.unwrap();
        assert!(matches!(installed, EventOutcome::Installed { entries: 2 }));

        let activated = worker.dispatch(Event::Activate { clients_on_previous: 0 }).await.unwrap();
        let EventOutcome::Activated { mut deleted } = activated else { panic!("expected activation") };
        deleted.sort();
        assert_eq!(deleted, vec!["app-runtime-v1", "app-v1"]);
        assert_eq!(db.store_names().await.unwrap(), vec!["app-runtime-v2", "app-v2"]);

        let home = worker.handle_fetch(&Request::navigate("/", &origin()).unwrap()).await.unwrap();
        assert_eq!(home.source, ResponseSource::Cache);
        assert_eq!(home.text(), "<h1>home</h1>");

        let other = worker.handle_fetch(&Request::navigate("/history", &origin()).unwrap()).await.unwrap();
        assert_eq!(other.source, ResponseSource::OfflineFallback);
        assert_eq!(other.text(), "<h1>offline</h1>");
    }

    #[tokio::test]
    async fn test_failed_install_never_intercepts() {
        let (worker, fetcher, _) = worker(ScriptedFetcher::offline().on_get("/", 200, "<h1>home</h1>")).await;

        assert!(matches!(worker.dispatch(Event::Install).await, Err(Error::InstallFailed(_))));
        assert!(worker.dispatch(Event::Activate { clients_on_previous: 0 }).await.is_err());
        assert_eq!(worker.state().lifecycle.state().await, VersionState::InstallFailed);

        let calls = fetcher.calls();
        let request = Request::get("/static/css/styles.css", &origin()).unwrap();
        assert!(worker.handle_fetch(&request).await.is_none());
        assert_eq!(fetcher.calls(), calls);
    }

    #[tokio::test]
    async fn test_skip_waiting_message_activates() {
        let mut config = test_config();
        config.skip_waiting = false;
        let fetcher = Arc::new(online_then_offline());
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = Worker::new(config, db, fetcher, Arc::new(RecordingSink::default())).unwrap();

        worker.install().await.unwrap();
        let outcome = worker.dispatch(Event::Activate { clients_on_previous: 1 }).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Waiting));

        let outcome = worker.dispatch(Event::Message(ControlMessage::SkipWaiting)).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Accepted));
        assert_eq!(worker.state().lifecycle.state().await, VersionState::Active);
    }

    #[tokio::test]
    async fn test_cache_urls_and_clear_cache_messages() {
        let fetcher = online_then_offline().on_get("/static/images/logo.png", 200, "png");
        let (worker, _, _) = worker(fetcher).await;
        worker.install().await.unwrap();
        worker.activate(0).await.unwrap();

        worker
            .dispatch(Event::Message(ControlMessage::CacheUrls { urls: vec!["/static/images/logo.png".into()] }))
            .await
            .unwrap();
        let db = &worker.state().db;
        assert_eq!(db.count_entries("app-runtime-v2").await.unwrap(), 1);

        let logo = Request::get("/static/images/logo.png", &origin()).unwrap().with_destination(Destination::Image);
        assert_eq!(worker.handle_fetch(&logo).await.unwrap().source, ResponseSource::Cache);

        worker.dispatch(Event::Message(ControlMessage::ClearCache)).await.unwrap();
        assert!(db.store_names().await.unwrap().is_empty());

        let refetched = worker.handle_fetch(&logo).await.unwrap();
        assert_eq!(refetched.source, ResponseSource::Network);
        assert_eq!(db.count_entries("app-runtime-v2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sync_and_push_events() {
        let key = format!("POST {ORIGIN}/api/sync-predictions");
        let (worker, fetcher, sink) = worker(ScriptedFetcher::offline().respond(&key, Response::new(204, ""))).await;

        worker.register_sync(SYNC_PREDICTIONS).await.unwrap();
        let outcome = worker.dispatch(Event::Sync { tag: SYNC_PREDICTIONS.into() }).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Task(TaskOutcome::Completed)));
        let replay = worker.dispatch(Event::Sync { tag: SYNC_PREDICTIONS.into() }).await.unwrap();
        assert!(matches!(replay, EventOutcome::Task(TaskOutcome::NotPending)));
        assert_eq!(fetcher.calls_to(&key), 1);

        let pushed = worker.dispatch(Event::Push { payload: None }).await.unwrap();
        let EventOutcome::Notification(Some(notification)) = pushed else { panic!("expected notification") };
        assert_eq!(sink.shown().len(), 1);

        let click = Event::NotificationClick { id: notification.id, action: Some("explore".into()) };
        let EventOutcome::Click(outcome) = worker.dispatch(click).await.unwrap() else { panic!("expected click") };
        assert_eq!(outcome, ClickOutcome::Opened { url: "/".into() });
        assert_eq!(sink.events(), vec![format!("close:{}", notification.id), "open:/".to_string()]);
    }
}
