//! Conversions between axum messages and the client crate's model.

use axum::body::{Body, Bytes};
use axum::http::header;
use axum::response::Response;
use edgecache_client::fetch::rebase;
use edgecache_client::{Destination, Request};
use edgecache_core::Error;
use http_body_util::LengthLimitError;
use url::Url;

/// Buffer an inbound body, refusing more than `limit` bytes.
pub async fn read_body(body: Body, limit: usize) -> Result<Bytes, Error> {
    axum::body::to_bytes(body, limit).await.map_err(|err| {
        let inner = err.into_inner();
        if inner.is::<LengthLimitError>() {
            Error::BodyTooLarge(format!("request body exceeds {limit} bytes"))
        } else {
            Error::InvalidInput(format!("failed to read request body: {inner}"))
        }
    })
}

/// Turn an inbound request into a client `Request` aimed at `origin`.
///
/// Path and query are kept; the destination hint comes from `Sec-Fetch-Dest`.
pub async fn into_client_request(origin: &Url, request: axum::extract::Request, limit: usize) -> Result<Request, Error> {
    let (parts, body) = request.into_parts();
    let url = rebase(origin, parts.uri.path(), parts.uri.query()).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let destination = Destination::from_headers(&parts.headers);
    let body = read_body(body, limit).await?;

    Ok(Request::new(parts.method, url).with_headers(parts.headers).with_body(body).with_destination(destination))
}

/// Turn a buffered client response into an axum response.
pub fn into_axum_response(response: edgecache_client::Response) -> Response {
    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = response.headers;
    // Recomputed from the buffered body.
    out.headers_mut().remove(header::CONTENT_LENGTH);
    out
}
