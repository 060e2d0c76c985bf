//! Core types and shared functionality for edgecache.
//!
//! This crate provides:
//! - Named, versioned cache stores with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheEntry, CacheKey, CacheStore};
pub use config::{AppConfig, ConfigError, Mode};
pub use error::Error;
