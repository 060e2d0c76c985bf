//! Router construction for the two server modes.

use std::sync::Arc;

use axum::{Router, middleware};
use edgecache_client::{CacheWorker, FetchClient, FetchConfig, LifecycleEvents, WorkerConfig};
use edgecache_core::{AppConfig, CacheDb, Error, Mode};
use url::Url;

use crate::error::ServerError;
use crate::gateway::{self, GatewayState};
use crate::middleware::log_responses;
use crate::proxy::{self, CorsPolicy, EdgeState};

/// Build the router for whichever mode `config` selects.
pub async fn router(config: &AppConfig) -> Result<Router, ServerError> {
    match config.mode {
        Mode::Edge => edge_router(config),
        Mode::Gateway => gateway_router(config).await,
    }
}

/// Edge proxy: `/api/` to the backend, static assets for the rest.
pub fn edge_router(config: &AppConfig) -> Result<Router, ServerError> {
    let backend = parse_url(&config.backend_url)?;
    let fetch_config = FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_body_bytes,
        timeout: config.timeout(),
        ..Default::default()
    };

    let state = EdgeState {
        fetcher: Arc::new(FetchClient::new(fetch_config)?),
        backend,
        assets_dir: config.assets_dir.clone(),
        cors: CorsPolicy::new(&config.allowed_origin)?,
        max_body_bytes: config.max_body_bytes,
    };

    tracing::info!(backend = %state.backend, assets = %state.assets_dir.display(), "edge proxy configured");

    Ok(Router::new()
        .fallback(proxy::proxy)
        .with_state(state)
        .layer(middleware::from_fn(log_responses)))
}

/// Gateway: installs and activates the cache worker, then routes every
/// request through it.
///
/// A failed install leaves the worker redundant; the gateway still starts
/// and passes requests straight to the origin.
pub async fn gateway_router(config: &AppConfig) -> Result<Router, ServerError> {
    let origin = parse_url(&config.origin_url)?;
    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from_app_config(config)?)?);
    let worker = Arc::new(CacheWorker::new(db, fetcher.clone(), WorkerConfig::from_app_config(config)?));

    match worker.install().await {
        Ok(()) => {
            let purged = worker.activate().await?;
            tracing::info!(?purged, "cache worker controlling");
        }
        Err(err) => tracing::warn!(error = %err, "cache worker not installed, passing requests through"),
    }

    let state = GatewayState { worker, fetcher, origin, max_body_bytes: config.max_body_bytes };

    Ok(Router::new()
        .fallback(gateway::handle)
        .with_state(state)
        .layer(middleware::from_fn(log_responses)))
}

fn parse_url(value: &str) -> Result<Url, ServerError> {
    Url::parse(value).map_err(|e| ServerError::Core(Error::InvalidUrl(format!("{value}: {e}"))))
}
