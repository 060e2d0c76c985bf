//! Cache store naming, install-time precache and activation-time purge.

use std::collections::BTreeSet;
use std::sync::Arc;

use edgecache_core::{CacheDb, Error};
use reqwest::Url;

use crate::classify::RequestClass;
use crate::fetch::Fetcher;
use crate::request::{Destination, Request};

/// Versioned store names.
///
/// Every name embeds the version, so bumping the version makes every older
/// store stale at the next activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    prefix: String,
    version: u32,
}

impl CacheNames {
    pub fn new(prefix: impl Into<String>, version: u32) -> Self {
        Self { prefix: prefix.into(), version }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Store filled at install time; documents are cached here too.
    pub fn precache(&self) -> String {
        format!("{}-precache-v{}", self.prefix, self.version)
    }

    /// Store for API responses and static assets.
    pub fn runtime(&self) -> String {
        format!("{}-runtime-v{}", self.prefix, self.version)
    }

    /// Store a request class reads from and writes to.
    pub fn for_class(&self, class: RequestClass) -> String {
        match class {
            RequestClass::Document => self.precache(),
            RequestClass::Api | RequestClass::StaticAsset => self.runtime(),
        }
    }

    /// Names that survive activation.
    pub fn current(&self) -> BTreeSet<String> {
        BTreeSet::from([self.precache(), self.runtime()])
    }
}

/// Runs the install and activate steps against the cache database.
pub struct LifecycleManager<F> {
    db: CacheDb,
    fetcher: Arc<F>,
    names: CacheNames,
    precache: Vec<Url>,
}

impl<F: Fetcher> LifecycleManager<F> {
    pub fn new(db: CacheDb, fetcher: Arc<F>, names: CacheNames, precache: Vec<Url>) -> Self {
        Self { db, fetcher, names, precache }
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    /// Fetch every precache URL and write them all into the precache store.
    ///
    /// All or nothing: if any fetch fails or comes back non-2xx, nothing is
    /// written. Returns the number of entries stored.
    pub async fn install(&self) -> Result<usize, Error> {
        let mut entries = Vec::with_capacity(self.precache.len());
        for url in &self.precache {
            let request = Request::get(url.clone()).with_destination(Destination::Document);
            let response = self
                .fetcher
                .fetch(&request)
                .await
                .map_err(|e| Error::PrecacheFailed(format!("{url}: {e}")))?;
            if !response.is_success() {
                return Err(Error::PrecacheFailed(format!("{url}: status {}", response.status.as_u16())));
            }
            entries.push(response.to_entry(request.cache_key()));
        }

        let store = self.db.open_store(self.names.precache());
        for entry in &entries {
            store.put(entry).await?;
        }

        tracing::info!(store = store.name(), entries = entries.len(), "precached essential resources");
        Ok(entries.len())
    }

    /// Delete every store whose name is not in `current`.
    ///
    /// Returns the purged names in sorted order.
    pub async fn activate(&self, current: &BTreeSet<String>) -> Result<Vec<String>, Error> {
        let existing = self.db.list_store_names().await?;
        let mut purged = Vec::new();
        for name in existing.difference(current) {
            if self.db.delete_store(name).await? {
                tracing::info!(store = %name, "deleted stale cache store");
                purged.push(name.clone());
            }
        }
        Ok(purged)
    }
}
