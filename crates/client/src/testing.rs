//! Scripted `Fetcher` for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use edgecache_core::Error;
use reqwest::StatusCode;
use reqwest::header;

use crate::fetch::Fetcher;
use crate::request::Request;
use crate::response::Response;

/// Answers from a per-URL script and counts every call.
///
/// Unscripted URLs get a 404. While offline every call fails with
/// `NetworkFailure`. With revalidation on, a request carrying
/// `If-None-Match` or `If-Modified-Since` gets an empty 304.
#[derive(Default)]
pub(crate) struct MockFetcher {
    calls: AtomicUsize,
    offline: AtomicBool,
    revalidating: AtomicBool,
    script: Mutex<HashMap<String, Response>>,
    seen: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, url: &str, response: Response) {
        self.script.lock().unwrap().insert(url.to_string(), response);
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn set_revalidating(&self, revalidating: bool) {
        self.revalidating.store(revalidating, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn calls_for(&self, url: &str) -> usize {
        self.seen.lock().unwrap().iter().filter(|seen| *seen == url).count()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.url.to_string());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::NetworkFailure(format!("{}: connection refused", request.url)));
        }

        let conditional = request.headers.contains_key(header::IF_NONE_MATCH)
            || request.headers.contains_key(header::IF_MODIFIED_SINCE);
        if conditional && self.revalidating.load(Ordering::SeqCst) {
            return Ok(Response::new(StatusCode::NOT_MODIFIED, ""));
        }

        let scripted = self.script.lock().unwrap().get(request.url.as_str()).cloned();
        Ok(scripted.unwrap_or_else(|| Response::new(StatusCode::NOT_FOUND, "not found")))
    }
}
