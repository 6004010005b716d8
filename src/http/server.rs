//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all handler
//! - Wire up middleware (request ID, tracing)
//! - Dispatch each request to the route the proxy router picked
//! - Convert every handler error into a response
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::client::build_upstream_client;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::{api, pages, passthrough};
use crate::observability::metrics;
use crate::routing::{RouteMatch, Router as ProxyRouter};
use crate::stats::{CounterStore, UsageTracker};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProxyRouter>,
    pub client: reqwest::Client,
    pub usage: UsageTracker,
    pub public_origin: Option<Arc<str>>,
    pub max_body_size: usize,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and counter store.
    pub fn new(config: ProxyConfig, store: Arc<dyn CounterStore>) -> Result<Self, reqwest::Error> {
        let proxy_router = Arc::new(ProxyRouter::from_config(&config.upstreams));
        let endpoints = proxy_router.registry().prefixes().map(str::to_string).collect();

        let state = AppState {
            router: proxy_router,
            client: build_upstream_client(&config.timeouts)?,
            usage: UsageTracker::new(store, endpoints),
            public_origin: config.listener.public_origin.as_deref().map(Arc::from),
            max_body_size: config.security.max_body_size,
        };

        let router = Self::build_router(state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// There is no inbound deadline; the upstream client's timeout is the
    /// only one, so slow upstreams surface as 502.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state)
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The fully layered router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstreams = self.config.upstreams.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Single entry point: classify the path and hand off to the matching handler.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let path = request.uri().path().to_string();
    let method = request.method().clone();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Dispatching request"
    );

    let (kind, result) = match state.router.resolve(&path) {
        RouteMatch::Page(page) => {
            let response = pages::serve(&state, page, request.headers()).await;
            ("page", Ok(response))
        }
        RouteMatch::Passthrough { target } => (
            "passthrough",
            passthrough::forward(&state, request, target, &request_id).await,
        ),
        RouteMatch::Api { upstream, rest } => (
            "api",
            api::forward(&state, request, upstream, rest, &request_id).await,
        ),
        RouteMatch::NotFound => ("none", Err(ProxyError::NotFound)),
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            match &e {
                ProxyError::NotFound => {
                    tracing::debug!(request_id = %request_id, path = %path, "No route matched");
                }
                ProxyError::InvalidTarget(_) => {
                    tracing::warn!(request_id = %request_id, path = %path, error = %e, "Rejected proxy target");
                }
                ProxyError::Upstream(_) | ProxyError::Decode(_) => {
                    metrics::record_upstream_error(kind);
                    tracing::error!(request_id = %request_id, method = %method, path = %path, error = %e, "Upstream error");
                }
                ProxyError::Adaptation(_) => {
                    tracing::error!(request_id = %request_id, method = %method, path = %path, error = %e, "Request adaptation failed");
                }
            }
            e.into_response()
        }
    };

    metrics::record_request(kind, response.status().as_u16(), start_time);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::MemoryStore;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn server() -> HttpServer {
        HttpServer::new(ProxyConfig::default(), Arc::new(MemoryStore::new())).unwrap()
    }

    async fn send(request: Request<Body>) -> Response {
        server().router().oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_unmatched_path_is_404() {
        let response = send(Request::get("/definitely/not/here").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_bad_proxy_target_is_400() {
        let response = send(Request::get("/proxy/not-a-url").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_api_preflight_is_local() {
        let response = send(
            Request::builder()
                .method("OPTIONS")
                .uri("/openai/v1/chat/completions")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.headers()["x-frame-options"], "DENY");
    }

    #[tokio::test]
    async fn test_robots() {
        let response = send(Request::get("/robots.txt").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"User-agent: *\nDisallow: /");
    }
}
