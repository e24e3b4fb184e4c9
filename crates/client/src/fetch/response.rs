//! Response model returned to intercepted callers.

use std::collections::BTreeMap;

use bytes::Bytes;
use harbor_core::Snapshot;
use serde::{Deserialize, Serialize};

use super::request::Request;

/// Status written to the cache; every other status passes through uncached.
pub const CACHEABLE_STATUS: u16 = 200;

/// Status of synthesized failure responses.
pub const SERVICE_UNAVAILABLE: u16 = 503;

/// Inline placeholder for images that could not be loaded.
pub const PLACEHOLDER_SVG: &str = concat!(
    r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">"##,
    r##"<rect width="100" height="100" fill="#f0f0f0"/>"##,
    r##"<text x="50" y="50" text-anchor="middle" dy=".3em" fill="#999">No image</text>"##,
    "</svg>"
);

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    Placeholder,
    OfflineFallback,
    Unavailable,
}

/// A response handed back to the caller.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    pub source: ResponseSource,
    /// Underlying failure kept for diagnostics on synthesized responses.
    pub error: Option<String>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: BTreeMap::new(), body: body.into(), source: ResponseSource::Network, error: None }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    /// Fixed SVG placeholder served to image requests when the network fails.
    pub fn placeholder_image() -> Self {
        Self::new(CACHEABLE_STATUS, PLACEHOLDER_SVG)
            .with_header("content-type", "image/svg+xml")
            .with_source(ResponseSource::Placeholder)
    }

    /// Synthesized 503 carrying the failure that caused it.
    pub fn unavailable(message: &'static str, error: impl ToString) -> Self {
        let mut response = Self::new(SERVICE_UNAVAILABLE, message)
            .with_header("content-type", "text/plain")
            .with_source(ResponseSource::Unavailable);
        response.error = Some(error.to_string());
        response
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            status: snapshot.status_code,
            headers: snapshot.headers,
            body: Bytes::from(snapshot.body),
            source: ResponseSource::Cache,
            error: None,
        }
    }

    /// Capture this response for the runtime store.
    pub fn to_snapshot(&self, request: &Request) -> Snapshot {
        Snapshot {
            request_key: request.cache_key(),
            method: request.method.as_str().to_string(),
            url: request.url.to_string(),
            status_code: self.status,
            headers: self.headers.clone(),
            body: self.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Only the exact success status is ever written to a store.
    pub fn is_cacheable(&self) -> bool {
        self.status == CACHEABLE_STATUS
    }

    /// Any 2xx status.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_placeholder_image() {
        let response = Response::placeholder_image();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type(), Some("image/svg+xml"));
        assert_eq!(response.source, ResponseSource::Placeholder);
        assert!(response.text().starts_with("<svg"));
    }

    #[test]
    fn test_unavailable_keeps_error() {
        let response = Response::unavailable("Offline", "connection refused");
        assert_eq!(response.status, 503);
        assert_eq!(response.text(), "Offline");
        assert_eq!(response.error.as_deref(), Some("connection refused"));
        assert_eq!(response.content_type(), Some("text/plain"));
    }

    #[test]
    fn test_only_200_is_cacheable() {
        assert!(Response::new(200, "").is_cacheable());
        assert!(!Response::new(204, "").is_cacheable());
        assert!(!Response::new(304, "").is_cacheable());
        assert!(!Response::new(404, "").is_cacheable());
        assert!(Response::new(204, "").ok());
    }

    #[test]
    fn test_snapshot_preserves_status_and_body() {
        let origin = Url::parse("https://app.example.com").unwrap();
        let request = Request::get("/static/app.css", &origin).unwrap();
        let response = Response::new(200, "body{}").with_header("Content-Type", "text/css");

        let snapshot = response.to_snapshot(&request);
        assert_eq!(snapshot.request_key, request.cache_key());
        assert_eq!(snapshot.method, "GET");

        let restored = Response::from_snapshot(snapshot);
        assert_eq!(restored.status, 200);
        assert_eq!(restored.body, response.body);
        assert_eq!(restored.content_type(), Some("text/css"));
        assert_eq!(restored.source, ResponseSource::Cache);
    }
}
