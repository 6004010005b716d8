//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by route kind and status
//! - `proxy_request_duration_seconds` (histogram): latency by route kind
//! - `proxy_upstream_errors_total` (counter): upstreams that could not be reached
//! - `proxy_rewrites_total` (counter): rewritten bodies by content kind
//! - `proxy_store_failures_total` (counter): counter store operations that failed
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exporter is optional and bound to its own address

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(kind: &'static str, status: u16, started: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "kind" => kind,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "kind" => kind)
        .record(started.elapsed().as_secs_f64());
}

/// Record an upstream that could not be reached.
pub fn record_upstream_error(kind: &'static str) {
    metrics::counter!("proxy_upstream_errors_total", "kind" => kind).increment(1);
}

/// Record a rewritten response body.
pub fn record_rewrite(content_kind: &'static str) {
    metrics::counter!("proxy_rewrites_total", "content" => content_kind).increment(1);
}

/// Record a failed counter store operation.
pub fn record_store_failure(op: &'static str) {
    metrics::counter!("proxy_store_failures_total", "op" => op).increment(1);
}
