//! Retrieval strategies and the engine that dispatches to them.
//!
//! | Class       | Strategy                         | Store     | Writes                      |
//! |-------------|----------------------------------|-----------|-----------------------------|
//! | Api         | network-first, cache fallback    | runtime   | 2xx GET, before returning   |
//! | Document    | cache-first, network refresh     | precache  | GET miss, background        |
//! | StaticAsset | cache-first, background update   | runtime   | same-origin 200, background |
//!
//! Only the Api strategy recovers from `Error::NetworkFailure`. The others
//! hand it back to the caller. Nothing is retried.
//!
//! Fetches that fill a store drop the caller's validators and `Range`, and a
//! 304 or 206 is never stored.
//!
//! Background writes run as spawned tasks owned by the engine, so they finish
//! even if the request that started them is dropped. `settle` waits for them.

use std::sync::{Arc, Mutex, PoisonError};

use edgecache_core::{CacheDb, CacheEntry, CacheStore, Error};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::classify::{RequestClass, classify};
use crate::fetch::Fetcher;
use crate::lifecycle::CacheNames;
use crate::request::Request;
use crate::response::Response;

/// How a response was produced. Observability only; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    ServedFromCache,
    ServedFromNetwork,
    /// The network failed and a cached copy was returned instead.
    ServedStaleWithError,
    /// The network failed and nothing was cached; the synthesized offline body.
    Offline,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::ServedFromCache => "served_from_cache",
            Outcome::ServedFromNetwork => "served_from_network",
            Outcome::ServedStaleWithError => "served_stale_with_error",
            Outcome::Offline => "offline",
        }
    }
}

/// A response together with how it was obtained.
#[derive(Debug, Clone)]
pub struct Handled {
    pub class: RequestClass,
    pub outcome: Outcome,
    pub response: Response,
}

/// Classifies requests and runs the matching strategy against the cache stores.
pub struct StrategyEngine<F> {
    db: CacheDb,
    fetcher: Arc<F>,
    names: CacheNames,
    runtime_max_entries: Option<usize>,
    pending: Mutex<JoinSet<()>>,
}

impl<F: Fetcher> StrategyEngine<F> {
    pub fn new(db: CacheDb, fetcher: Arc<F>, names: CacheNames) -> Self {
        Self { db, fetcher, names, runtime_max_entries: None, pending: Mutex::new(JoinSet::new()) }
    }

    /// Cap the runtime store; the oldest entries are evicted after each write into it.
    pub fn with_runtime_limit(mut self, max_entries: Option<usize>) -> Self {
        self.runtime_max_entries = max_entries;
        self
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    /// Serve `request` with the strategy its class selects.
    pub async fn handle(&self, request: &Request) -> Result<Handled, Error> {
        let class = classify(request);
        let (response, outcome) = match class {
            RequestClass::Api => self.network_first(request).await?,
            RequestClass::Document => self.cache_first_refresh(request).await?,
            RequestClass::StaticAsset => self.cache_first_background(request).await?,
        };

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            ?class,
            ?outcome,
            status = response.status.as_u16(),
            "request handled"
        );

        Ok(Handled { class, outcome, response })
    }

    /// Prefer the live response; fall back to the cache only on transport failure.
    ///
    /// A non-2xx response is returned live and left uncached, even when an
    /// older cached copy exists.
    async fn network_first(&self, request: &Request) -> Result<(Response, Outcome), Error> {
        let store = self.db.open_store(self.names.for_class(RequestClass::Api));

        let fetched = if request.is_cacheable() {
            self.fetcher.fetch(&request.unconditional()).await
        } else {
            self.fetcher.fetch(request).await
        };

        let reason = match fetched {
            Ok(response) => {
                if request.is_cacheable() && response.is_success() && response.is_complete() {
                    let entry = response.to_entry(request.cache_key());
                    if let Err(err) = put_and_trim(&store, &entry, self.runtime_max_entries).await {
                        tracing::warn!(url = %request.url, error = %err, "failed to cache API response");
                    }
                }
                return Ok((response, Outcome::ServedFromNetwork));
            }
            Err(Error::NetworkFailure(reason)) => reason,
            Err(other) => return Err(other),
        };

        if request.is_cacheable()
            && let Some(entry) = store.match_entry(&request.cache_key()).await?
        {
            tracing::warn!(url = %request.url, %reason, "network failed, serving cached API response");
            return Ok((Response::from_entry(entry), Outcome::ServedStaleWithError));
        }

        tracing::warn!(url = %request.url, %reason, "network failed with no cached API response");
        Ok((Response::offline(), Outcome::Offline))
    }

    /// Serve from the precache store; on a miss fetch and store in the background.
    async fn cache_first_refresh(&self, request: &Request) -> Result<(Response, Outcome), Error> {
        if !request.is_cacheable() {
            return Ok((self.fetcher.fetch(request).await?, Outcome::ServedFromNetwork));
        }

        let store = self.db.open_store(self.names.for_class(RequestClass::Document));
        let key = request.cache_key();
        if let Some(entry) = store.match_entry(&key).await? {
            return Ok((Response::from_entry(entry), Outcome::ServedFromCache));
        }

        let response = self.fetcher.fetch(&request.unconditional()).await?;
        if response.is_complete() {
            self.store_in_background(store, response.to_entry(key), None);
        } else {
            tracing::debug!(url = %request.url, status = response.status.as_u16(), "not caching partial document");
        }
        Ok((response, Outcome::ServedFromNetwork))
    }

    /// Serve from the runtime store; on a miss fetch, and store same-origin 200s.
    async fn cache_first_background(&self, request: &Request) -> Result<(Response, Outcome), Error> {
        if !request.is_cacheable() {
            return Ok((self.fetcher.fetch(request).await?, Outcome::ServedFromNetwork));
        }

        let store = self.db.open_store(self.names.for_class(RequestClass::StaticAsset));
        let key = request.cache_key();
        if let Some(entry) = store.match_entry(&key).await? {
            return Ok((Response::from_entry(entry), Outcome::ServedFromCache));
        }

        let response = self.fetcher.fetch(&request.unconditional()).await?;
        if response.is_storable_asset() {
            self.store_in_background(store, response.to_entry(key), self.runtime_max_entries);
        } else {
            tracing::debug!(
                url = %request.url,
                status = response.status.as_u16(),
                kind = ?response.kind,
                "not caching asset response"
            );
        }
        Ok((response, Outcome::ServedFromNetwork))
    }

    fn store_in_background(&self, store: CacheStore, entry: CacheEntry, max_entries: Option<usize>) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while pending.try_join_next().is_some() {}

        pending.spawn(async move {
            if let Err(err) = put_and_trim(&store, &entry, max_entries).await {
                tracing::warn!(store = store.name(), key = %entry.key, error = %err, "background cache write failed");
            }
        });
    }

    /// Wait for every background write started so far.
    pub async fn settle(&self) {
        let mut pending = std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        while let Some(result) = pending.join_next().await {
            if let Err(err) = result {
                tracing::warn!(error = %err, "background cache write panicked");
            }
        }
    }
}

/// Write `entry`, then evict the oldest entries beyond `max_entries`.
///
/// A failed trim is logged; only the write itself is an error.
async fn put_and_trim(store: &CacheStore, entry: &CacheEntry, max_entries: Option<usize>) -> Result<(), Error> {
    store.put(entry).await?;
    if let Some(max) = max_entries {
        match store.trim(max).await {
            Ok(0) => {}
            Ok(evicted) => tracing::debug!(store = store.name(), evicted, "trimmed cache store"),
            Err(err) => tracing::warn!(store = store.name(), error = %err, "failed to trim cache store"),
        }
    }
    Ok(())
}
