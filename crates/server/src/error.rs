//! HTTP error responses for the edge proxy and the gateway.
//!
//! Errors render as `{"error": {"code": ..., "message": ...}}` with a status
//! derived from the error kind.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use edgecache_core::Error;
use serde::Serialize;

/// Structured errors for the edgecache server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] Error),

    /// Configuration that passed validation but can't be used as a header.
    #[error("INVALID_INPUT: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorMessage<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorMessage<'a> {
    code: &'a str,
    message: String,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Core(err) => match err {
                Error::NetworkFailure(_) => StatusCode::BAD_GATEWAY,
                Error::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
                Error::InvalidInput(_) | Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ServerError::Core(err) => err.code(),
            ServerError::InvalidConfig(_) => "INVALID_INPUT",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "request failed");
        }
        let body = ErrorBody { error: ErrorMessage { code: self.code(), message: self.to_string() } };
        (status, Json(body)).into_response()
    }
}
