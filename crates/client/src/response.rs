//! Response model shared by the fetcher, the strategies and the cache stores.

use bytes::Bytes;
use edgecache_core::{CacheEntry, CacheKey};
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

/// Body returned by the network-first strategy when offline with nothing cached.
pub const OFFLINE_ERROR: &str = "Offline - cached data not available";

/// Where a response came from, in the sense of the Fetch `Response.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin network response, or one replayed from a cache store.
    Basic,
    /// Cross-origin response whose body is readable.
    Cors,
    /// Cross-origin response whose body and status can't be inspected.
    Opaque,
    /// Network error placeholder.
    Error,
    /// Built locally, never fetched.
    Synthetic,
}

/// A complete, buffered response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub kind: ResponseKind,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into(), kind: ResponseKind::Basic }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    /// The synthesized reply for an API request made offline with no cached copy.
    ///
    /// The status is left at the default (200); callers recognise this
    /// response by its body, not its status.
    pub fn offline() -> Self {
        let body = serde_json::json!({ "error": OFFLINE_ERROR }).to_string();
        Self::new(StatusCode::OK, body)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_kind(ResponseKind::Synthetic)
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Neither a 304 nor a 206; the body is the whole representation.
    pub fn is_complete(&self) -> bool {
        !matches!(self.status, StatusCode::NOT_MODIFIED | StatusCode::PARTIAL_CONTENT)
    }

    /// Same-origin 200, the only shape the static asset strategy stores.
    pub fn is_storable_asset(&self) -> bool {
        self.status == StatusCode::OK && self.kind == ResponseKind::Basic
    }

    /// Snapshot this response as a cache entry under `key`.
    pub fn to_entry(&self, key: CacheKey) -> CacheEntry {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();
        CacheEntry::new(key, self.status.as_u16(), headers, self.body.to_vec())
    }

    /// Rebuild a response from a stored entry.
    ///
    /// Headers that no longer parse are dropped rather than failing the replay.
    pub fn from_entry(entry: CacheEntry) -> Self {
        let status = StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK);
        let mut headers = HeaderMap::with_capacity(entry.headers.len());
        for (name, value) in &entry.headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::debug!(header = %name, key = %entry.key, "dropping unparsable cached header"),
            }
        }
        Self { status, headers, body: Bytes::from(entry.body), kind: ResponseKind::Basic }
    }
}
