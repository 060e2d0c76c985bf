//! The cache worker: one method per lifecycle event.
//!
//! The host (the gateway server, or a test) drives the worker:
//!
//! ```text
//! Parsed --install--> Installing --ok--> Installed --activate--> Activating --ok--> Activated
//!                          \--err--> Redundant          ^                  |
//!                                                       \------err---------/
//! ```
//!
//! Until the worker is `Activated` it does not control requests: `fetch`
//! returns `Ok(None)` and the host falls through to the network.

use std::sync::Arc;

use async_trait::async_trait;
use edgecache_core::{AppConfig, CacheDb, Error};
use reqwest::Url;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::fetch::{Fetcher, resolve};
use crate::lifecycle::{CacheNames, LifecycleManager};
use crate::notify::Notification;
use crate::request::Request;
use crate::strategy::{Handled, StrategyEngine};

/// Background sync tag for searches made while offline.
pub const SYNC_SEARCHES: &str = "sync-searches";

/// Where the worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; the worker will never control requests.
    Redundant,
}

/// Result of a background sync callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    Completed,
    /// The tag isn't one this worker registers.
    Ignored,
}

/// Lifecycle events a host delivers to a worker.
#[async_trait]
pub trait LifecycleEvents: Send + Sync {
    /// Once per deployment, before `activate`.
    async fn install(&self) -> Result<(), Error>;

    /// Once per activation; returns the purged store names.
    async fn activate(&self) -> Result<Vec<String>, Error>;

    /// `Ok(None)` means "not handled here": the host should fetch directly.
    async fn fetch(&self, request: &Request) -> Result<Option<Handled>, Error>;

    /// Background sync callback for `tag`.
    async fn sync(&self, tag: &str) -> Result<SyncOutcome, Error>;

    /// Build the notification for a push message.
    fn push(&self, payload: Option<&str>) -> Notification;
}

/// Settings a worker is built from.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub names: CacheNames,
    pub precache: Vec<Url>,
    pub runtime_max_entries: Option<usize>,
    pub notification_title: String,
}

impl WorkerConfig {
    /// Derive worker settings; precache paths resolve against `origin_url`.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let precache = config
            .precache_urls
            .iter()
            .map(|target| resolve(&origin, target).map_err(|e| Error::InvalidUrl(format!("{target}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            names: CacheNames::new(config.cache_prefix.clone(), config.cache_version),
            precache,
            runtime_max_entries: config.runtime_max_entries,
            notification_title: config.notification_title.clone(),
        })
    }
}

/// Strategy engine plus lifecycle manager, gated on the lifecycle phase.
pub struct CacheWorker<F> {
    engine: StrategyEngine<F>,
    lifecycle: LifecycleManager<F>,
    phase: Mutex<Phase>,
    notification_title: String,
}

impl<F: Fetcher> CacheWorker<F> {
    pub fn new(db: CacheDb, fetcher: Arc<F>, config: WorkerConfig) -> Self {
        let engine = StrategyEngine::new(db.clone(), fetcher.clone(), config.names.clone())
            .with_runtime_limit(config.runtime_max_entries);
        let lifecycle = LifecycleManager::new(db, fetcher, config.names, config.precache);
        Self { engine, lifecycle, phase: Mutex::new(Phase::Parsed), notification_title: config.notification_title }
    }

    pub async fn phase(&self) -> Phase {
        *self.phase.lock().await
    }

    pub fn names(&self) -> &CacheNames {
        self.lifecycle.names()
    }

    /// Wait for pending background cache writes.
    pub async fn settle(&self) {
        self.engine.settle().await;
    }

    async fn begin(&self, expected: Phase, next: Phase) -> Result<(), Error> {
        let mut phase = self.phase.lock().await;
        if *phase != expected {
            return Err(Error::Lifecycle(format!("cannot enter {next:?} from {:?}", *phase)));
        }
        *phase = next;
        Ok(())
    }

    async fn finish(&self, next: Phase) {
        *self.phase.lock().await = next;
    }
}

#[async_trait]
impl<F: Fetcher> LifecycleEvents for CacheWorker<F> {
    async fn install(&self) -> Result<(), Error> {
        self.begin(Phase::Parsed, Phase::Installing).await?;
        match self.lifecycle.install().await {
            Ok(_) => {
                self.finish(Phase::Installed).await;
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "install failed");
                self.finish(Phase::Redundant).await;
                Err(err)
            }
        }
    }

    async fn activate(&self) -> Result<Vec<String>, Error> {
        self.begin(Phase::Installed, Phase::Activating).await?;
        match self.lifecycle.activate(&self.names().current()).await {
            Ok(purged) => {
                self.finish(Phase::Activated).await;
                tracing::info!(version = self.names().version(), purged = purged.len(), "worker activated");
                Ok(purged)
            }
            Err(err) => {
                self.finish(Phase::Installed).await;
                Err(err)
            }
        }
    }

    async fn fetch(&self, request: &Request) -> Result<Option<Handled>, Error> {
        let phase = self.phase().await;
        if phase != Phase::Activated {
            tracing::debug!(url = %request.url, ?phase, "worker not controlling, falling through");
            return Ok(None);
        }
        self.engine.handle(request).await.map(Some)
    }

    async fn sync(&self, tag: &str) -> Result<SyncOutcome, Error> {
        if tag != SYNC_SEARCHES {
            tracing::debug!(tag, "ignoring unknown sync tag");
            return Ok(SyncOutcome::Ignored);
        }
        tracing::info!(tag, "syncing offline searches");
        Ok(SyncOutcome::Completed)
    }

    fn push(&self, payload: Option<&str>) -> Notification {
        Notification::from_push(&self.notification_title, payload)
    }
}
