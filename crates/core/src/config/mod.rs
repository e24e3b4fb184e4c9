//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (HARBOR_*)
//! 2. TOML config file (if HARBOR_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (HARBOR_*)
/// 2. TOML config file (if HARBOR_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via HARBOR_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin of the application whose traffic is intercepted.
    ///
    /// Manifest paths and fixed endpoints are resolved against it.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix shared by every store name this deployment owns.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version tag embedded in the store names.
    ///
    /// Set via HARBOR_VERSION; bump on every deployment.
    #[serde(default = "default_version")]
    pub version: String,

    /// Absolute paths that must be cached before install completes.
    #[serde(default = "default_precache_manifest")]
    pub precache_manifest: Vec<String>,

    /// Document served for navigations when both network and cache miss.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Path prefix routed network-first.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Path prefix routed cache-first.
    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,

    /// Network timeout in milliseconds for every strategy fetch.
    ///
    /// Set via HARBOR_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes accepted per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Take control as soon as install succeeds instead of waiting for old clients.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Endpoint posted to when queued mutations are replayed.
    #[serde(default = "default_sync_endpoint")]
    pub sync_endpoint: String,

    /// Endpoint polled by the periodic refresh.
    #[serde(default = "default_refresh_endpoint")]
    pub refresh_endpoint: String,

    /// Seconds between periodic refresh runs.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Title shown on every notification.
    #[serde(default = "default_notification_title")]
    pub notification_title: String,

    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    #[serde(default = "default_notification_badge")]
    pub notification_badge: String,

    /// First retry delay for a failed deferred task.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Upper bound on the retry delay.
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    /// Attempts after which the host stops replaying a deferred task.
    #[serde(default = "default_max_sync_attempts")]
    pub max_sync_attempts: u32,
}

/// Names of the two stores that are current for a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNames {
    pub precache: String,
    pub runtime: String,
}

impl StoreNames {
    /// Whether `name` belongs to the current deployment.
    pub fn is_current(&self, name: &str) -> bool {
        name == self.precache || name == self.runtime
    }

    /// Stores consulted on lookup, in order.
    pub fn lookup_order(&self) -> Vec<String> {
        vec![self.runtime.clone(), self.precache.clone()]
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./harbor-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:5000".into()
}

fn default_cache_prefix() -> String {
    "harbor".into()
}

fn default_version() -> String {
    "v1.0.0".into()
}

fn default_precache_manifest() -> Vec<String> {
    [
        "/",
        "/static/css/responsive.css",
        "/static/js/responsive.js",
        "/static/manifest.json",
        "/static/images/logo.svg",
        "/static/images/icon-192x192.png",
        "/static/images/icon-512x512.png",
        "/offline.html",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_offline_page() -> String {
    "/offline.html".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_static_prefix() -> String {
    "/static/".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    "harbor/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_true() -> bool {
    true
}

fn default_sync_endpoint() -> String {
    "/api/sync-predictions".into()
}

fn default_refresh_endpoint() -> String {
    "/api/predictions/today".into()
}

fn default_refresh_interval_secs() -> u64 {
    3600
}

fn default_notification_title() -> String {
    "Harbor".into()
}

fn default_notification_icon() -> String {
    "/static/images/icon-192x192.png".into()
}

fn default_notification_badge() -> String {
    "/static/images/badge-72x72.png".into()
}

fn default_retry_base_ms() -> u64 {
    1_000
}

fn default_retry_max_ms() -> u64 {
    300_000
}

fn default_max_sync_attempts() -> u32 {
    8
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            version: default_version(),
            precache_manifest: default_precache_manifest(),
            offline_page: default_offline_page(),
            api_prefix: default_api_prefix(),
            static_prefix: default_static_prefix(),
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            skip_waiting: true,
            sync_endpoint: default_sync_endpoint(),
            refresh_endpoint: default_refresh_endpoint(),
            refresh_interval_secs: default_refresh_interval_secs(),
            notification_title: default_notification_title(),
            notification_icon: default_notification_icon(),
            notification_badge: default_notification_badge(),
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
            max_sync_attempts: default_max_sync_attempts(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Store names for the configured version.
    ///
    /// The precache store is `{prefix}-{version}` and the runtime store is
    /// `{prefix}-runtime-{version}`, so a version bump supersedes both.
    pub fn store_names(&self) -> StoreNames {
        StoreNames {
            precache: format!("{}-{}", self.cache_prefix, self.version),
            runtime: format!("{}-runtime-{}", self.cache_prefix, self.version),
        }
    }

    /// Parse the configured origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: format!("unsupported scheme: {scheme}"),
            }),
        }
    }

    /// Resolve an absolute path against the origin.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        self.origin_url()?
            .join(path)
            .map_err(|e| ConfigError::Invalid { field: path.to_string(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `HARBOR_`
    /// 2. TOML file from `HARBOR_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("HARBOR_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("HARBOR_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
