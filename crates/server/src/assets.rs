//! Static asset serving from the configured directory.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use mime_guess::Mime;
use percent_encoding::percent_decode_str;

/// Serve the file `path` maps to under `root`.
///
/// Directory paths serve their `index.html`. Paths that would escape `root`
/// get a 404 like any missing file.
pub async fn serve(root: &Path, path: &str) -> Response {
    let Some(file) = resolve_asset(root, path) else {
        return not_found();
    };

    match tokio::fs::read(&file).await {
        Ok(contents) => build_response(Bytes::from(contents), mime_guess::from_path(&file).first_or_octet_stream()),
        Err(err) if err.kind() == ErrorKind::NotFound || err.kind() == ErrorKind::IsADirectory => not_found(),
        Err(err) => {
            tracing::warn!(path = %file.display(), error = %err, "failed to read static asset");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// Map a request path onto a file under `root`.
///
/// The path is percent-decoded first, so the traversal checks see the
/// decoded segments.
fn resolve_asset(root: &Path, path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    if decoded.contains('\0') {
        return None;
    }
    let relative = decoded.trim_start_matches('/');
    let mut resolved = root.to_path_buf();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            // Avoid directory traversal.
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if relative.is_empty() || relative.ends_with('/') {
        resolved.push("index.html");
    }

    Some(resolved)
}

fn build_response(bytes: Bytes, mime: Mime) -> Response {
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }

    response
}
