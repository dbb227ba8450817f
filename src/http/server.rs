//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the `/books` handlers
//! - Wire up middleware (tracing, request ID, timeout, metrics, security
//!   headers, CORS, compression, rate limits, body limit)
//! - Bind server to listener and shut down gracefully

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{header::InvalidHeaderValue, Request},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    compression::CompressionLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::books::handlers;
use crate::config::AppConfig;
use crate::http::request::{MakeRequestUuidV4, X_REQUEST_ID};
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::security::rate_limit::rate_limit_middleware;
use crate::security::{cors_layer, with_security_headers, CounterStore, MemoryCounterStore, RateLimiter};
use crate::store::BookStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookStore>,
    /// Quota charged by `POST /books` once its body has been decoded.
    pub write_limiter: Option<Arc<RateLimiter>>,
}

/// HTTP server for the books service.
pub struct HttpServer {
    router: Router,
    production: bool,
}

impl HttpServer {
    /// Create a server whose limiters count in process memory.
    pub fn new(config: AppConfig, store: Arc<dyn BookStore>) -> Result<Self, InvalidHeaderValue> {
        Self::with_counter_store(config, store, Arc::new(MemoryCounterStore::new()))
    }

    /// Create a server whose limiters count in `counters`.
    pub fn with_counter_store(
        config: AppConfig,
        store: Arc<dyn BookStore>,
        counters: Arc<dyn CounterStore>,
    ) -> Result<Self, InvalidHeaderValue> {
        let router = Self::build_router(&config, store, counters)?;
        Ok(Self {
            router,
            production: config.environment.is_production(),
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(
        config: &AppConfig,
        store: Arc<dyn BookStore>,
        counters: Arc<dyn CounterStore>,
    ) -> Result<Router, InvalidHeaderValue> {
        let limits = &config.rate_limit;
        let global = Arc::new(
            RateLimiter::new("global", limits.global, counters.clone()).trust_proxy(limits.trust_proxy),
        );
        let write_limiter = limits.enabled.then(|| {
            Arc::new(RateLimiter::new("write", limits.write, counters).trust_proxy(limits.trust_proxy))
        });
        let state = AppState { store, write_limiter };

        let mut router = Router::new()
            .route("/books", get(handlers::list_books).post(handlers::add_book))
            .fallback(handlers::not_found)
            .layer(DefaultBodyLimit::max(config.security.max_body_size));

        if limits.enabled {
            router = router.layer(middleware::from_fn_with_state(global, rate_limit_middleware));
        }

        router = router
            .layer(CompressionLayer::new())
            .layer(cors_layer(config.allowed_origin())?);

        if config.security.enable_headers {
            router = with_security_headers(router);
        }

        let timeout = Duration::from_secs(config.timeouts.request_secs);

        Ok(router
            .layer(middleware::from_fn_with_state(timeout, enforce_timeout))
            .layer(middleware::from_fn(metrics::track_requests))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
            .with_state(state))
    }

    /// The fully layered router, for driving the service in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            production = self.production,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Abandon requests that run past `limit` with a 408.
async fn enforce_timeout(State(limit): State<Duration>, request: Request<Body>, next: Next) -> Response {
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(limit_secs = limit.as_secs(), "Request timed out");
            ApiError::Timeout.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::books::{BookRecord, NewBook};
    use crate::store::{MemoryBookStore, StoreError};
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    /// Never answers within any reasonable timeout.
    struct StalledStore;

    #[async_trait]
    impl BookStore for StalledStore {
        async fn list_books(&self) -> Result<Vec<BookRecord>, StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }

        async fn insert_book(&self, _book: &NewBook) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn request(method: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri("/books")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_router_in_process() {
        let store = MemoryBookStore::new();
        let server = HttpServer::new(AppConfig::default(), Arc::new(store.clone())).unwrap();

        let res = server
            .router()
            .oneshot(request("POST", r#"{"author":"Jane Austen","title":"Emma!"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key(X_REQUEST_ID));

        let res = server.router().oneshot(request("GET", "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_counter_store_is_used() {
        let counters = Arc::new(MemoryCounterStore::new());
        let server = HttpServer::with_counter_store(
            AppConfig::default(),
            Arc::new(MemoryBookStore::new()),
            counters.clone(),
        )
        .unwrap();

        // peers without connection info share one key
        for _ in 0..5 {
            let res = server.router().oneshot(request("GET", "")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        let res = server.router().oneshot(request("GET", "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        counters.reset("global:unknown");
        let res = server.router().oneshot(request("GET", "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_slow_request_times_out_as_json() {
        let mut config = AppConfig::default();
        config.timeouts.request_secs = 1;
        let server = HttpServer::new(config, Arc::new(StalledStore)).unwrap();

        let res = server.router().oneshot(request("GET", "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);
        assert!(res.headers().contains_key(X_REQUEST_ID));

        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Request timed out.");
    }
}
