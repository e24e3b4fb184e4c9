//! Intercepted request model.

use std::collections::BTreeMap;
use std::str::FromStr;

use bytes::Bytes;
use harbor_core::Error;
use harbor_core::cache::hash::{compute_request_key, request_key};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use super::url::canonicalize;

/// What kind of resource the caller declared it is loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Image,
    Style,
    Script,
    Font,
    Manifest,
    /// No declared category (fetch/XHR).
    #[default]
    Empty,
}

impl Destination {
    /// Static asset categories routed cache-first.
    pub fn is_static_asset(self) -> bool {
        matches!(self, Destination::Image | Destination::Style | Destination::Script)
    }
}

impl FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" => Ok(Destination::Document),
            "image" => Ok(Destination::Image),
            "style" => Ok(Destination::Style),
            "script" => Ok(Destination::Script),
            "font" => Ok(Destination::Font),
            "manifest" => Ok(Destination::Manifest),
            "" | "empty" => Ok(Destination::Empty),
            other => Err(Error::InvalidInput(format!("unknown destination: {other}"))),
        }
    }
}

/// How the request was initiated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

impl FromStr for RequestMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "navigate" => Ok(RequestMode::Navigate),
            "same-origin" => Ok(RequestMode::SameOrigin),
            "no-cors" => Ok(RequestMode::NoCors),
            "" | "cors" => Ok(RequestMode::Cors),
            other => Err(Error::InvalidInput(format!("unknown request mode: {other}"))),
        }
    }
}

/// A request seen by the interception layer.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Canonical URL (fragment removed, host lowercased).
    pub url: Url,
    pub destination: Destination,
    pub mode: RequestMode,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            destination: Destination::default(),
            mode: RequestMode::default(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// A GET request for `input`, resolved against `origin` when it is a path.
    pub fn get(input: &str, origin: &Url) -> Result<Self, Error> {
        let url = canonicalize(input, origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self::new(Method::GET, url))
    }

    /// A top-level document navigation.
    pub fn navigate(input: &str, origin: &Url) -> Result<Self, Error> {
        Ok(Self::get(input, origin)?
            .with_destination(Destination::Document)
            .with_mode(RequestMode::Navigate))
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Hashed request key used as the store primary key.
    pub fn cache_key(&self) -> String {
        compute_request_key(self.method.as_str(), self.url.as_str())
    }

    /// Readable request key for logs.
    pub fn display_key(&self) -> String {
        request_key(self.method.as_str(), self.url.as_str())
    }
}
