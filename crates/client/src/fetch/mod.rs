//! Network access for the strategies, the lifecycle manager and the proxy.
//!
//! ### Outcome model
//! - Any response that arrives, whatever its status, is `Ok`.
//! - Only transport failures (DNS, connect, reset, TLS, a body cut short)
//!   become `Error::NetworkFailure`.
//! - Bodies over `max_bytes` become `Error::BodyTooLarge`.
//!
//! ### Forwarding
//! - Method, headers and body are forwarded unchanged, except hop-by-hop
//!   headers, `Host`, `Content-Length` and `Accept-Encoding`, which the
//!   client sets itself.
//! - No timeout unless one is configured.

pub mod url;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, Url};
use std::time::{Duration, Instant};

pub use url::{UrlError, rebase, resolve, same_origin};

use crate::request::{Request, strip_hop_by_hop};
use crate::response::{Response, ResponseKind};
use edgecache_core::{AppConfig, Error};

/// Something that can turn a request into a response over the network.
///
/// The strategies only see this trait, so tests can count and script fetches.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "edgecache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: none)
    pub timeout: Option<Duration>,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Origin responses are compared against to tell `Basic` from `Cors`.
    /// Without one every response counts as same-origin.
    pub origin: Option<Url>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "edgecache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: None,
            max_redirects: 5,
            origin: None,
        }
    }
}

impl FetchConfig {
    /// Derive the fetch settings from application configuration.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_body_bytes,
            timeout: config.timeout(),
            origin: Some(origin),
            ..Default::default()
        })
    }
}

/// reqwest-backed `Fetcher`.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    fn kind_for(&self, final_url: &Url) -> ResponseKind {
        match &self.config.origin {
            Some(origin) if !same_origin(origin, final_url) => ResponseKind::Cors,
            _ => ResponseKind::Basic,
        }
    }

    fn check_size(&self, len: usize, url: &Url) -> Result<(), Error> {
        if len > self.config.max_bytes {
            return Err(Error::BodyTooLarge(format!("{url}: {len} bytes exceeds {}", self.config.max_bytes)));
        }
        Ok(())
    }
}

/// Headers to send upstream for `request`.
pub fn forwarded_headers(request: &Request) -> HeaderMap {
    let mut headers = request.headers.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::ACCEPT_ENCODING);
    headers
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let mut outbound = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(forwarded_headers(request));
        if !request.body.is_empty() {
            outbound = outbound.body(request.body.clone());
        }

        let response = outbound
            .send()
            .await
            .map_err(|e| Error::NetworkFailure(format!("{} {}: {e}", request.method, request.url)))?;

        if let Some(len) = response.content_length() {
            self.check_size(len as usize, &request.url)?;
        }

        let status = response.status();
        let final_url = response.url().clone();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkFailure(format!("failed to read {}: {e}", request.url)))?;

        self.check_size(body.len(), &request.url)?;

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            final_url = %final_url,
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms,
            "fetched"
        );

        Ok(Response { status, headers, body, kind: self.kind_for(&final_url) })
    }
}
