//! The open `/proxy/<absolute-url>` passthrough.
//!
//! # Responsibilities
//! - Validate and decode the caller-supplied target
//! - Forward with the proxy-mode header policy, streaming the request body
//! - Re-enter redirects into the proxy instead of following them
//! - Rewrite HTML/CSS bodies so links keep going through the proxy
//! - Relay everything else as an opaque stream
//!
//! # Design Decisions
//! - Preflight is answered locally, before the target is even parsed
//! - Only one hop is ever fetched per request; the caller's client drives
//!   redirect chains, so the proxy cannot loop

use std::borrow::Cow;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use url::Url;

use crate::error::ProxyError;
use crate::http::request::proxy_origin;
use crate::http::response;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::rewrite::{is_root_relative, rewrite_text, ContentKind, RewriteContext};
use crate::routing::PROXY_PREFIX;
use crate::security::headers::{apply_passthrough_cors, filter_proxy_headers, has_http_scheme};

/// Handle one `/proxy/...` request. `raw_target` is the path after `/proxy/`.
pub async fn forward(
    state: &AppState,
    request: Request<Body>,
    raw_target: &str,
    request_id: &str,
) -> Result<Response, ProxyError> {
    let caller_origin = request.headers().get(header::ORIGIN).cloned();

    if request.method() == Method::OPTIONS {
        return Ok(preflight(caller_origin.as_ref()));
    }

    let target = parse_target(raw_target, request.uri().query())?;
    let origin = proxy_origin(request.headers(), state.public_origin.as_deref());

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        target = %target,
        "Forwarding passthrough request"
    );

    let mut headers = filter_proxy_headers(request.headers(), &origin, &target);
    // The client negotiates only encodings it can decode for the rewriter.
    headers.remove(header::ACCEPT_ENCODING);

    let (parts, body) = request.into_parts();
    let mut outbound = state
        .client
        .request(parts.method.clone(), target.clone())
        .headers(headers);
    if parts.method != Method::GET && parts.method != Method::HEAD {
        outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let upstream = outbound.send().await?;
    let status = upstream.status();

    if status.is_redirection() {
        if let Some(location) = upstream.headers().get(header::LOCATION) {
            let location = location
                .to_str()
                .map_err(|e| ProxyError::Upstream(format!("invalid redirect location: {e}")))?;
            return redirect(
                status,
                upstream.headers(),
                &origin,
                &target,
                location,
                caller_origin.as_ref(),
            );
        }
    }

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let kind = ContentKind::classify(content_type);

    let mut headers = response::relay_headers(upstream.headers());
    apply_passthrough_cors(&mut headers, caller_origin.as_ref());

    match kind {
        ContentKind::Opaque => Ok(response::build(
            status,
            headers,
            Body::from_stream(upstream.bytes_stream()),
        )),
        ContentKind::Html | ContentKind::Css => {
            let bytes = upstream.bytes().await?;
            let text = String::from_utf8(bytes.to_vec())
                .map_err(|e| ProxyError::Decode(e.utf8_error().to_string()))?;

            let ctx = RewriteContext::new(&origin, target);
            let rewritten = rewrite_text(kind, &ctx, &text);
            metrics::record_rewrite(kind.as_str());

            headers.remove(header::CONTENT_LENGTH);
            Ok(response::build(status, headers, Body::from(rewritten)))
        }
    }
}

/// Turn the residual path (plus query) into the absolute target URL.
///
/// A residual without an `http(s)://` prefix is percent-decoded once before
/// it is rejected.
pub fn parse_target(raw: &str, query: Option<&str>) -> Result<Url, ProxyError> {
    let decoded: Cow<'_, str> = if has_http_scheme(raw) {
        Cow::Borrowed(raw)
    } else {
        urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
    };

    if !has_http_scheme(&decoded) {
        return Err(ProxyError::InvalidTarget(raw.to_string()));
    }

    let mut target = decoded.into_owned();
    if let Some(query) = query {
        target.push('?');
        target.push_str(query);
    }

    Url::parse(&target).map_err(|e| ProxyError::Upstream(format!("invalid target URL '{target}': {e}")))
}

/// Resolve a `Location` against the target and point it back into the proxy.
pub fn proxied_location(proxy_origin: &str, target: &Url, location: &str) -> String {
    let resolved = if is_root_relative(location) {
        format!("{}{}", target.origin().ascii_serialization(), location)
    } else {
        target
            .join(location)
            .map(String::from)
            .unwrap_or_else(|_| location.to_string())
    };
    format!("{}{}{}", proxy_origin, PROXY_PREFIX, resolved)
}

/// Relay a redirect with every upstream header except `Location`, which is
/// pointed back into the proxy. The body is dropped.
fn redirect(
    status: StatusCode,
    upstream: &HeaderMap,
    proxy_origin: &str,
    target: &Url,
    location: &str,
    caller_origin: Option<&HeaderValue>,
) -> Result<Response, ProxyError> {
    let rewritten = proxied_location(proxy_origin, target, location);
    let mut headers = response::relay_headers(upstream);
    headers.remove(header::CONTENT_LENGTH);
    apply_passthrough_cors(&mut headers, caller_origin);
    headers.insert(
        header::LOCATION,
        HeaderValue::from_str(&rewritten)
            .map_err(|e| ProxyError::Upstream(format!("invalid redirect location: {e}")))?,
    );
    Ok(response::empty(status, headers))
}

fn preflight(caller_origin: Option<&HeaderValue>) -> Response {
    let mut headers = HeaderMap::new();
    apply_passthrough_cors(&mut headers, caller_origin);
    response::empty(StatusCode::NO_CONTENT, headers)
}
