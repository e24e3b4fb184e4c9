//! Network access for the interception layer.
//!
//! ### Fetcher
//! - Strategies, the lifecycle manager and task handlers only see the
//!   [`Fetcher`] trait, so tests can script the network.
//! - A non-success status is still a successful fetch; strategies decide
//!   whether to cache it.
//!
//! ### URL Canonicalization
//! - Trim whitespace, resolve paths against the origin
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Limits
//! - Request timeout (configurable, also enforced by the strategies)
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod request;
pub mod response;
pub mod url;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use harbor_core::{AppConfig, Error};
use reqwest::{Client, header};

pub use reqwest::Method;

pub use request::{Destination, Request, RequestMode};
pub use response::{CACHEABLE_STATUS, PLACEHOLDER_SVG, Response, ResponseSource, SERVICE_UNAVAILABLE};
pub use self::url::{UrlError, canonicalize, is_network_addressable};

/// Anything that can turn a request into a network response.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the network call.
    ///
    /// Returns `Err` only when no response was received.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Run a fetch bounded by `timeout`.
///
/// An elapsed timeout is reported as `Error::FetchTimeout` so every caller
/// treats it like any other network failure.
pub async fn fetch_with_timeout(
    fetcher: &dyn Fetcher, request: &Request, timeout: Duration,
) -> Result<Response, Error> {
    match tokio::time::timeout(timeout, fetcher.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(Error::FetchTimeout(format!("{} after {}ms", request.display_key(), timeout.as_millis()))),
    }
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "harbor/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 10s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "harbor/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(10_000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// HTTP fetch client backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let mut builder = self.http.request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {}", request.url, e))
            } else {
                Error::Network(format!("{}: {}", request.url, e))
            }
        })?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter(|(name, _)| *name != header::SET_COOKIE)
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status,
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response { status, headers, body, source: ResponseSource::Network, error: None })
    }
}
