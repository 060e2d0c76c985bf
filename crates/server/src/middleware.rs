//! Request logging.

use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::warn!(%method, %uri, status = status.as_u16(), elapsed_ms, "request failed");
    } else {
        tracing::info!(%method, %uri, status = status.as_u16(), elapsed_ms, "request completed");
    }

    response
}
