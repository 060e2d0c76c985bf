//! edgecache server entry point.
//!
//! Boots the edge proxy or the cache gateway depending on configuration.
//! Logs go to stderr as JSON.

use anyhow::Result;
use edgecache_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod assets;
mod convert;
mod error;
mod gateway;
mod handler;
mod middleware;
mod proxy;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let app = handler::router(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, mode = ?config.mode, "Starting edgecache server");

    axum::serve(listener, app).await?;

    Ok(())
}
