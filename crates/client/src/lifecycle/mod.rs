//! Version lifecycle: install, activate and store pruning.
//!
//! ### States
//!
//! ```text
//! installing -> installed -> activating -> active
//!      \
//!       -> install-failed (terminal)
//! ```
//!
//! Install populates the current precache store all-or-nothing. Activate
//! deletes every store that does not belong to the current version, and is
//! the only place (besides an explicit clear) where stores are deleted.
//! Transitions are serialized; concurrent callers queue on one lock.

pub mod precache;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use harbor_core::{AppConfig, CacheDb, Error, StoreNames};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::fetch::{Fetcher, canonicalize};

pub use precache::fetch_all;

/// Lifecycle state of the deployed version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum VersionState {
    Installing,
    Installed,
    Activating,
    Active,
    InstallFailed,
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VersionState::Installing => "installing",
            VersionState::Installed => "installed",
            VersionState::Activating => "activating",
            VersionState::Active => "active",
            VersionState::InstallFailed => "install-failed",
        };
        f.write_str(s)
    }
}

/// Owns the store versioning for one deployed version.
pub struct LifecycleManager {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    stores: StoreNames,
    origin: Url,
    manifest: Vec<Url>,
    timeout: Duration,
    state: RwLock<VersionState>,
    transition: Mutex<()>,
    skip_waiting: AtomicBool,
}

impl LifecycleManager {
    /// Build a manager for the configured version.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the origin or a manifest path does not resolve.
    pub fn new(config: &AppConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let manifest = config.precache_manifest.iter().map(|path| config.resolve(path)).collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            db,
            fetcher,
            stores: config.store_names(),
            origin: config.origin_url()?,
            manifest,
            timeout: config.timeout(),
            state: RwLock::new(VersionState::Installing),
            transition: Mutex::new(()),
            skip_waiting: AtomicBool::new(config.skip_waiting),
        })
    }

    pub async fn state(&self) -> VersionState {
        *self.state.read().await
    }

    pub async fn is_active(&self) -> bool {
        self.state().await == VersionState::Active
    }

    pub fn stores(&self) -> &StoreNames {
        &self.stores
    }

    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    /// Ask for activation without waiting for old clients to go away.
    pub fn request_skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    async fn set_state(&self, next: VersionState) {
        let mut state = self.state.write().await;
        let previous = *state;
        tracing::info!(from = %previous, to = %next, "lifecycle transition");
        *state = next;
    }

    async fn expect_state(&self, action: &str, expected: VersionState) -> Result<(), Error> {
        let current = self.state().await;
        if current == expected {
            Ok(())
        } else {
            Err(Error::InvalidTransition { action: action.to_string(), state: current.to_string() })
        }
    }

    /// Populate the current precache store from the manifest.
    ///
    /// Returns the number of entries written. Any fetch failure or
    /// non-cacheable status leaves the store empty and the version stuck in
    /// `install-failed`.
    pub async fn install(&self) -> Result<usize, Error> {
        let _guard = self.transition.lock().await;
        self.expect_state("install", VersionState::Installing).await?;

        tracing::info!(store = %self.stores.precache, entries = self.manifest.len(), "installing");

        match self.populate(&self.stores.precache, &self.manifest).await {
            Ok(count) => {
                self.set_state(VersionState::Installed).await;
                Ok(count)
            }
            Err(e) => {
                tracing::error!("install failed: {}", e);
                self.set_state(VersionState::InstallFailed).await;
                Err(Error::InstallFailed(e.to_string()))
            }
        }
    }

    /// Activate if nothing is holding the version back.
    ///
    /// Returns `Ok(None)` while clients of the previous version remain and
    /// immediate takeover was not requested; otherwise the names of the
    /// deleted stores.
    pub async fn try_activate(&self, clients_on_previous: usize) -> Result<Option<Vec<String>>, Error> {
        self.expect_state("activate", VersionState::Installed).await?;

        if clients_on_previous > 0 && !self.skip_waiting() {
            tracing::info!(clients_on_previous, "waiting for previous version clients to close");
            return Ok(None);
        }
        self.activate().await.map(Some)
    }

    /// Prune superseded stores and take control.
    ///
    /// Returns the names of the deleted stores. If pruning fails the version
    /// stays `installed` so activation can be retried.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        let _guard = self.transition.lock().await;
        self.expect_state("activate", VersionState::Installed).await?;
        self.set_state(VersionState::Activating).await;

        match self.prune().await {
            Ok(deleted) => {
                self.set_state(VersionState::Active).await;
                Ok(deleted)
            }
            Err(e) => {
                tracing::error!("activation failed: {}", e);
                self.set_state(VersionState::Installed).await;
                Err(e)
            }
        }
    }

    async fn prune(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.db.store_names().await? {
            if self.stores.is_current(&name) {
                continue;
            }
            if self.db.delete_store(&name).await? {
                tracing::info!(store = %name, "deleted stale store");
                deleted.push(name);
            }
        }

        self.db.open_store(&self.stores.precache).await?;
        self.db.open_store(&self.stores.runtime).await?;
        Ok(deleted)
    }

    /// Fetch `urls` and add all of them to the runtime store, or none.
    ///
    /// Relative paths resolve against the origin.
    pub async fn populate_runtime(&self, urls: &[String]) -> Result<usize, Error> {
        let urls = urls
            .iter()
            .map(|u| canonicalize(u, &self.origin).map_err(|e| Error::InvalidUrl(format!("{u}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        self.populate(&self.stores.runtime, &urls).await
    }

    async fn populate(&self, store: &str, urls: &[Url]) -> Result<usize, Error> {
        self.db.open_store(store).await?;
        let snapshots = fetch_all(self.fetcher.as_ref(), urls, self.timeout).await?;
        let count = snapshots.len();
        self.db.put_entries(store, snapshots).await?;
        Ok(count)
    }

    /// Delete every store, current ones included.
    pub async fn clear_all(&self) -> Result<Vec<String>, Error> {
        let _guard = self.transition.lock().await;
        let mut deleted = Vec::new();
        for name in self.db.store_names().await? {
            if self.db.delete_store(&name).await? {
                deleted.push(name);
            }
        }
        tracing::info!(count = deleted.len(), "cleared all stores");
        Ok(deleted)
    }
}
