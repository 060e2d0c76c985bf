//! Edge proxy: backend forwarding with CORS, static assets for the rest.
//!
//! Routing rules, first match wins:
//! 1. a path ending in `.json` is a static asset, whatever the method or query;
//! 2. `OPTIONS` gets a CORS preflight answer;
//! 3. `/api/` is forwarded to the backend;
//! 4. anything else is a static asset.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use edgecache_client::classify::API_PREFIX;
use edgecache_client::{FetchClient, Fetcher};
use url::Url;

use crate::assets;
use crate::convert::{into_axum_response, into_client_request};
use crate::error::ServerError;

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type";
const PREFLIGHT_MAX_AGE: &str = "86400";
const PROXIED_CACHE_CONTROL: &str = "public, max-age=300";

/// Where the edge sends a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Asset,
    Preflight,
    Backend,
}

pub fn route(method: &Method, path: &str) -> Route {
    if path.ends_with(".json") {
        Route::Asset
    } else if *method == Method::OPTIONS {
        Route::Preflight
    } else if path.starts_with(API_PREFIX) {
        Route::Backend
    } else {
        Route::Asset
    }
}

/// CORS headers the edge adds on behalf of the backend.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_origin: HeaderValue,
}

impl CorsPolicy {
    pub fn new(allowed_origin: &str) -> Result<Self, ServerError> {
        let allow_origin = HeaderValue::from_str(allowed_origin)
            .map_err(|e| ServerError::InvalidConfig(format!("allowed_origin: {e}")))?;
        Ok(Self { allow_origin })
    }

    /// Empty 200 answering a preflight.
    pub fn preflight(&self) -> Response {
        let mut response = StatusCode::OK.into_response();
        let headers = response.headers_mut();
        self.overlay(headers);
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(PREFLIGHT_MAX_AGE));
        response
    }

    /// Set allow-origin, allow-methods and allow-headers, replacing upstream values.
    pub fn overlay(&self, headers: &mut HeaderMap) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    }
}

#[derive(Clone)]
pub struct EdgeState {
    pub fetcher: Arc<FetchClient>,
    pub backend: Url,
    pub assets_dir: PathBuf,
    pub cors: CorsPolicy,
    pub max_body_bytes: usize,
}

/// Fallback handler for every edge request.
pub async fn proxy(State(state): State<EdgeState>, request: Request) -> Response {
    match route(request.method(), request.uri().path()) {
        Route::Asset => assets::serve(&state.assets_dir, request.uri().path()).await,
        Route::Preflight => state.cors.preflight(),
        Route::Backend => match forward(&state, request).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        },
    }
}

async fn forward(state: &EdgeState, request: Request) -> Result<Response, ServerError> {
    let outbound = into_client_request(&state.backend, request, state.max_body_bytes).await?;
    tracing::debug!(method = %outbound.method, url = %outbound.url, "forwarding to backend");

    let upstream = state.fetcher.fetch(&outbound).await?;

    let mut response = into_axum_response(upstream);
    let headers = response.headers_mut();
    state.cors.overlay(headers);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(PROXIED_CACHE_CONTROL));
    Ok(response)
}
