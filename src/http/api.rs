//! The named API proxy (`/<prefix>/<rest>`).
//!
//! # Responsibilities
//! - Record one usage event per forwarded request
//! - Forward with the API-mode header policy
//! - Apply provider quirks (version header, disabled thinking budget)
//! - Relay status, headers and body unchanged, plus the fixed CORS set
//!
//! # Design Decisions
//! - Usage recording never fails the request
//! - Only the disable-thinking quirk buffers the request body

use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderMap};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Map, Value};

use crate::config::ProviderQuirk;
use crate::error::ProxyError;
use crate::http::response;
use crate::http::server::AppState;
use crate::routing::Upstream;
use crate::security::headers::{apply_api_cors, filter_api_headers};

/// Handle one request matched to `upstream`; `rest` is the path after the prefix.
pub async fn forward(
    state: &AppState,
    request: Request<Body>,
    upstream: &Upstream,
    rest: &str,
    request_id: &str,
) -> Result<Response, ProxyError> {
    if request.method() == Method::OPTIONS {
        let mut headers = HeaderMap::new();
        apply_api_cors(&mut headers);
        return Ok(response::empty(StatusCode::NO_CONTENT, headers));
    }

    state.usage.record(upstream.prefix()).await;

    let url = upstream.target_url(rest, request.uri().query());
    tracing::debug!(
        request_id = %request_id,
        prefix = %upstream.prefix(),
        method = %request.method(),
        target = %url,
        "Forwarding API request"
    );

    let headers = filter_api_headers(request.headers(), upstream.quirk);
    let rewrite_body = upstream.quirk == ProviderQuirk::DisableThinking
        && request.method() == Method::POST
        && is_json(request.headers());

    let (parts, body) = request.into_parts();
    let mut outbound = state.client.request(parts.method.clone(), &url).headers(headers);

    if rewrite_body {
        let bytes = axum::body::to_bytes(body, state.max_body_size)
            .await
            .map_err(|e| ProxyError::Adaptation(format!("failed to read request body: {e}")))?;
        // An empty body has nothing to adapt and is forwarded without one.
        if !bytes.is_empty() {
            outbound = outbound.body(disable_thinking(bytes)?);
        }
    } else if parts.method != Method::GET && parts.method != Method::HEAD {
        outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let upstream_response = outbound.send().await?;
    let status = upstream_response.status();
    let mut headers = response::relay_headers(upstream_response.headers());
    apply_api_cors(&mut headers);

    Ok(response::build(
        status,
        headers,
        Body::from_stream(upstream_response.bytes_stream()),
    ))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("application/json"))
}

/// Force `generationConfig.thinkingConfig` to `{"thinkingBudget": 0}`.
///
/// Every other field is preserved. A JSON body that is not an object is
/// forwarded as is.
pub fn disable_thinking(body: Bytes) -> Result<Bytes, ProxyError> {
    let mut value: Value = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::Adaptation(format!("invalid JSON body: {e}")))?;

    let Value::Object(fields) = &mut value else {
        return Ok(body);
    };

    let generation = fields
        .entry("generationConfig")
        .or_insert_with(|| Value::Object(Map::new()));
    if !generation.is_object() {
        *generation = Value::Object(Map::new());
    }
    if let Value::Object(generation) = generation {
        generation.insert("thinkingConfig".to_string(), json!({ "thinkingBudget": 0 }));
    }

    serde_json::to_vec(&value)
        .map(Bytes::from)
        .map_err(|e| ProxyError::Adaptation(format!("failed to encode JSON body: {e}")))
}
