//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::Request;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;

use multi_proxy::config::{ProviderQuirk, ProxyConfig, StoreBackend, UpstreamConfig};
use multi_proxy::http::HttpServer;
use multi_proxy::lifecycle::Shutdown;
use multi_proxy::stats::{CounterStore, MemoryStore};

/// A request as seen by a mock upstream.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A programmable upstream on an ephemeral port that counts and records
/// every request it receives.
pub struct MockUpstream {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    captured: Arc<Mutex<Vec<Captured>>>,
}

impl MockUpstream {
    /// Start an upstream answering every request with `respond`.
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&Captured) -> Response + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let captured = Arc::new(Mutex::new(Vec::new()));
        let respond = Arc::new(respond);

        let app = {
            let hits = hits.clone();
            let captured = captured.clone();
            axum::Router::new().fallback(move |request: Request| {
                let hits = hits.clone();
                let captured = captured.clone();
                let respond = respond.clone();
                async move {
                    let (parts, body) = request.into_parts();
                    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
                    let seen = Captured {
                        method: parts.method,
                        uri: parts.uri,
                        headers: parts.headers,
                        body,
                    };
                    hits.fetch_add(1, Ordering::SeqCst);
                    let response = respond(&seen);
                    captured.lock().unwrap().push(seen);
                    response
                }
            })
        };

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, hits, captured }
    }

    /// Start an upstream that always answers `200` with `body` and `content_type`.
    pub async fn fixed(content_type: &'static str, body: &'static str) -> Self {
        Self::start(move |_| {
            ([("content-type", content_type)], body).into_response()
        })
        .await
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Captured {
        self.captured
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("upstream received no request")
    }
}

/// An upstream that waits `delay` before answering `200` with `body`.
pub async fn slow_upstream(delay: Duration, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = axum::Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        body
    });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// An address nothing is listening on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A running proxy.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Proxy config with an in-memory store and the given upstreams.
pub fn config_with(upstreams: Vec<UpstreamConfig>) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.store.backend = StoreBackend::Memory;
    config.upstreams = upstreams;
    config
}

/// A small provider table pointed at one mock upstream.
pub fn api_upstreams(base: &str) -> Vec<UpstreamConfig> {
    vec![
        UpstreamConfig::new("/openai", base),
        UpstreamConfig::new("/claude", base).with_quirk(ProviderQuirk::AnthropicVersion),
        UpstreamConfig::new("/gemini", base),
        UpstreamConfig::new("/gemininthk", base).with_quirk(ProviderQuirk::DisableThinking),
    ]
}

pub async fn spawn_proxy(config: ProxyConfig) -> TestProxy {
    spawn_proxy_with_store(config, Arc::new(MemoryStore::new())).await
}

pub async fn spawn_proxy_with_store(config: ProxyConfig, store: Arc<dyn CounterStore>) -> TestProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, store).unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    TestProxy { addr, shutdown }
}

/// Client that, like a browser under test, never follows redirects itself.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}
