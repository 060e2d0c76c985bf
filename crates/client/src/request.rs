//! Inbound request model.

use bytes::Bytes;
use edgecache_core::CacheKey;
use reqwest::header::HeaderMap;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

/// What kind of resource the request is for.
///
/// Mirrors the values browsers send in `Sec-Fetch-Dest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level navigation.
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    /// `fetch()`/XHR and anything without a destination.
    #[default]
    Empty,
    Other,
}

impl Destination {
    /// Parse a `Sec-Fetch-Dest` value. Unknown values map to `Other`.
    pub fn from_fetch_dest(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" => Destination::Document,
            "script" => Destination::Script,
            "style" => Destination::Style,
            "image" => Destination::Image,
            "font" => Destination::Font,
            "manifest" => Destination::Manifest,
            "" | "empty" => Destination::Empty,
            _ => Destination::Other,
        }
    }

    /// Read the destination from request headers, defaulting to `Empty`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(SEC_FETCH_DEST)
            .and_then(|v| v.to_str().ok())
            .map(Self::from_fetch_dest)
            .unwrap_or_default()
    }
}

const SEC_FETCH_DEST: &str = "sec-fetch-dest";

/// A request entering the cache worker or the edge proxy.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Absolute URL; the fragment is not part of the cache identity.
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub destination: Destination,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), body: Bytes::new(), destination: Destination::Empty }
    }

    /// A bodiless GET, the shape of navigations and asset loads.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Normalized identity used to key cache entries.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.method.as_str(), &self.url)
    }

    /// Only GET requests are read from or written to a cache store.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET
    }

    /// A copy that asks the origin for the full representation.
    ///
    /// Fetches that fill a cache store go out without the caller's
    /// validators or range, so the stored entry is never a 304 or a slice.
    pub fn unconditional(&self) -> Request {
        let mut request = self.clone();
        for name in VALIDATORS {
            request.headers.remove(name);
        }
        request
    }
}

/// Request headers that make a response depend on what the caller already holds.
const VALIDATORS: [&str; 6] = ["if-none-match", "if-modified-since", "if-match", "if-unmodified-since", "if-range", "range"];

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
