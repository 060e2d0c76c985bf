//! SQLite-backed cache stores for request/response pairs.
//!
//! This module provides named cache stores using SQLite with async access
//! via tokio-rusqlite. It supports:
//!
//! - Entries keyed by normalized request identity (method + URL, no fragment)
//! - Lazy store creation on first write, whole-store deletion
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Oldest-first trimming to cap a store's size

pub mod connection;
pub mod key;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use key::CacheKey;
pub use store::{CacheEntry, CacheStore};
