//! Client-side cache manager for edgecache.
//!
//! This crate provides the request classifier, the retrieval strategies,
//! cache lifecycle management and the fetch pipeline shared by the server.

pub mod classify;
pub mod fetch;
pub mod lifecycle;
pub mod notify;
pub mod request;
pub mod response;
pub mod strategy;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{RequestClass, classify};
pub use fetch::{FetchClient, FetchConfig, Fetcher};
pub use lifecycle::{CacheNames, LifecycleManager};
pub use notify::Notification;
pub use request::{Destination, Request};
pub use response::{OFFLINE_ERROR, Response, ResponseKind};
pub use strategy::{Handled, Outcome, StrategyEngine};
pub use worker::{CacheWorker, LifecycleEvents, Phase, SyncOutcome, WorkerConfig};
