//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL
    /// - `cache_prefix` or `version` is empty
    /// - any manifest entry, prefix, or endpoint is not an absolute path
    /// - `offline_page` is not part of the precache manifest
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - the retry window is empty or inverted
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url()?;

        if self.cache_prefix.is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if self.version.is_empty() {
            return Err(invalid("version", "must not be empty"));
        }

        for (field, path) in [
            ("offline_page", &self.offline_page),
            ("api_prefix", &self.api_prefix),
            ("static_prefix", &self.static_prefix),
            ("sync_endpoint", &self.sync_endpoint),
            ("refresh_endpoint", &self.refresh_endpoint),
        ] {
            if !path.starts_with('/') {
                return Err(invalid(field, "must be an absolute path"));
            }
        }

        if let Some(entry) = self.precache_manifest.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid {
                field: "precache_manifest".into(),
                reason: format!("{entry} is not an absolute path"),
            });
        }
        if !self.precache_manifest.contains(&self.offline_page) {
            return Err(invalid("offline_page", "must be listed in precache_manifest"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.refresh_interval_secs == 0 {
            return Err(invalid("refresh_interval_secs", "must be greater than 0"));
        }
        if self.retry_base_ms == 0 {
            return Err(invalid("retry_base_ms", "must be greater than 0"));
        }
        if self.retry_max_ms < self.retry_base_ms {
            return Err(invalid("retry_max_ms", "must not be less than retry_base_ms"));
        }

        if self.api_prefix.starts_with(&self.static_prefix) || self.static_prefix.starts_with(&self.api_prefix) {
            tracing::warn!(
                api_prefix = %self.api_prefix,
                static_prefix = %self.static_prefix,
                "api_prefix and static_prefix overlap; api_prefix takes precedence"
            );
        }

        Ok(())
    }
}
