//! Response construction helpers.
//!
//! # Responsibilities
//! - Relay upstream response headers to the client
//! - Build header-only responses (preflight, redirects)
//!
//! # Design Decisions
//! - Hop-by-hop headers are stripped on the way back too
//! - Callers that rewrite a body drop `content-length`; the server recomputes it

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;

use crate::security::headers::strip_hop_by_hop;

/// Copy of the upstream headers that may be relayed to the client.
pub fn relay_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    strip_hop_by_hop(&mut headers);
    headers
}

/// A response with the given status, headers and body.
pub fn build(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// A response with no body.
pub fn empty(status: StatusCode, headers: HeaderMap) -> Response {
    build(status, headers, Body::empty())
}
