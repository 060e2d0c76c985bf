//! Unified error types for edgecache.
//!
//! Every message is prefixed with a stable code so logs and error bodies
//! can be matched without parsing the rest of the text.

use tokio_rusqlite::rusqlite;

/// Unified error types for the edgecache workspace.
///
/// A cache miss is not represented here: lookups return `Option` and a miss
/// is a normal outcome. Likewise a non-2xx upstream status is a regular
/// response, never an `Error`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty store name).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Transport-level failure: DNS, connect, reset, TLS.
    #[error("NETWORK_FAILURE: {0}")]
    NetworkFailure(String),

    /// Request or response body exceeded the configured limit.
    #[error("BODY_TOO_LARGE: {0}")]
    BodyTooLarge(String),

    /// One of the precache resources could not be fetched.
    #[error("PRECACHE_FAILED: {0}")]
    PrecacheFailed(String),

    /// A lifecycle event was invoked out of order.
    #[error("LIFECYCLE: {0}")]
    Lifecycle(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored headers could not be encoded or decoded.
    #[error("CACHE_ERROR: serialization failed: {0}")]
    Serialization(String),
}

impl Error {
    /// The stable code that prefixes this error's message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::NetworkFailure(_) => "NETWORK_FAILURE",
            Error::BodyTooLarge(_) => "BODY_TOO_LARGE",
            Error::PrecacheFailed(_) => "PRECACHE_FAILED",
            Error::Lifecycle(_) => "LIFECYCLE",
            Error::Database(_) | Error::MigrationFailed(_) | Error::Serialization(_) => "CACHE_ERROR",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
