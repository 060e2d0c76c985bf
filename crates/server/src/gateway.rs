//! Gateway: the local HTTP front that drives the cache worker.
//!
//! Every inbound request is rebased onto the configured origin and handed to
//! the worker's fetch event. When the worker is not controlling yet (or never
//! installed), the request goes straight to the origin.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use edgecache_client::{CacheWorker, FetchClient, Fetcher, LifecycleEvents};
use url::Url;

use crate::convert::{into_axum_response, into_client_request};
use crate::error::ServerError;

/// Response header naming the strategy outcome.
pub const OUTCOME_HEADER: &str = "x-edgecache-outcome";

#[derive(Clone)]
pub struct GatewayState {
    pub worker: Arc<CacheWorker<FetchClient>>,
    pub fetcher: Arc<FetchClient>,
    pub origin: Url,
    pub max_body_bytes: usize,
}

pub async fn handle(State(state): State<GatewayState>, request: Request) -> Response {
    match dispatch(&state, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn dispatch(state: &GatewayState, request: Request) -> Result<Response, ServerError> {
    let request = into_client_request(&state.origin, request, state.max_body_bytes).await?;

    match state.worker.fetch(&request).await? {
        Some(handled) => {
            tracing::debug!(
                url = %request.url,
                class = ?handled.class,
                outcome = handled.outcome.as_str(),
                "handled by worker"
            );
            let mut response = into_axum_response(handled.response);
            response
                .headers_mut()
                .insert(OUTCOME_HEADER, HeaderValue::from_static(handled.outcome.as_str()));
            Ok(response)
        }
        None => {
            let response = state.fetcher.fetch(&request).await?;
            Ok(into_axum_response(response))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Method, StatusCode};
    use edgecache_client::{CacheNames, FetchConfig, Phase, WorkerConfig};
    use edgecache_core::CacheDb;
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// An origin that counts hits and answers every path with its own name.
    async fn spawn_origin(hits: Arc<AtomicUsize>) -> Url {
        let app = Router::new().fallback(move |request: Request| {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                let path = request.uri().path().to_string();
                if path.starts_with("/api/") {
                    return (StatusCode::OK, [("content-type", "application/json")], r#"{"ok":true}"#.to_string())
                        .into_response();
                }
                format!("page {path}").into_response()
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    async fn gateway(origin: Url) -> (Router, Arc<CacheWorker<FetchClient>>) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(FetchClient::new(FetchConfig { origin: Some(origin.clone()), ..Default::default() }).unwrap());
        let config = WorkerConfig {
            names: CacheNames::new("test", 1),
            precache: vec![origin.join("/").unwrap()],
            runtime_max_entries: None,
            notification_title: "test".to_string(),
        };
        let worker = Arc::new(CacheWorker::new(db, fetcher.clone(), config));
        let state = GatewayState { worker: worker.clone(), fetcher, origin, max_body_bytes: 1024 * 1024 };
        (Router::new().fallback(handle).with_state(state), worker)
    }

    fn navigate(path: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(path)
            .header("sec-fetch-dest", "document")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_passthrough_before_activation() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (app, worker) = gateway(spawn_origin(hits.clone()).await).await;
        assert_eq!(worker.phase().await, Phase::Parsed);

        let response = app.oneshot(navigate("/about")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(OUTCOME_HEADER).is_none());
        assert_eq!(body_string(response).await, "page /about");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_document_cached_after_first_navigation() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (app, worker) = gateway(spawn_origin(hits.clone()).await).await;
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let first = app.clone().oneshot(navigate("/about")).await.unwrap();
        assert_eq!(first.headers()[OUTCOME_HEADER], "served_from_network");
        assert_eq!(body_string(first).await, "page /about");
        worker.settle().await;

        let second = app.clone().oneshot(navigate("/about")).await.unwrap();
        assert_eq!(second.headers()[OUTCOME_HEADER], "served_from_cache");
        assert_eq!(body_string(second).await, "page /about");
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        let home = app.oneshot(navigate("/")).await.unwrap();
        assert_eq!(home.headers()[OUTCOME_HEADER], "served_from_cache");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_api_goes_to_network() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (app, worker) = gateway(spawn_origin(hits.clone()).await).await;
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        for _ in 0..2 {
            let request = axum::http::Request::builder()
                .method(Method::GET)
                .uri("/api/search?q=kitab")
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.headers()[OUTCOME_HEADER], "served_from_network");
            assert_eq!(body_string(response).await, r#"{"ok":true}"#);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
