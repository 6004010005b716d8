//! Header filtering and response security headers.
//!
//! # Responsibilities
//! - Select which inbound headers may be forwarded (proxy and API policies)
//! - Rewrite the Referer so upstreams never see the proxy's own origin
//! - Inject provider defaults (protocol version, user agent)
//! - Strip hop-by-hop headers in both directions
//! - Apply the fixed CORS and security response header sets
//!
//! # Design Decisions
//! - Allow-list, never deny-list: unknown headers are dropped
//! - Hop-by-hop headers are excluded even when a prefix rule would allow them
//! - All filters are pure functions over `HeaderMap`

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::config::ProviderQuirk;

/// Hop-by-hop headers that must NOT be forwarded by proxies.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Request headers forwarded by the open passthrough proxy.
pub const PROXY_ALLOWED_HEADERS: &[&str] = &[
    "accept",
    "content-type",
    "authorization",
    "user-agent",
    "accept-encoding",
    "accept-language",
    "cache-control",
    "pragma",
    "x-requested-with",
];

/// Request headers forwarded to registered upstream APIs.
pub const API_ALLOWED_HEADERS: &[&str] = &["content-type", "authorization", "accept", "anthropic-version"];

pub const ANTHROPIC_VERSION_HEADER: &str = "anthropic-version";

/// Sent when a caller of the Anthropic upstream omits the version header.
pub const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_USER_AGENT: &str = concat!("multi-proxy/", env!("CARGO_PKG_VERSION"));

pub const CORS_ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS, HEAD, PATCH";

const API_CORS_ALLOW_HEADERS: &str = "Content-Type, Authorization, Accept, anthropic-version";

/// Preflight cache lifetime for the passthrough proxy (one day).
const CORS_MAX_AGE: &str = "86400";

/// Which allow-list applies to a forwarded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPolicy {
    Proxy,
    Api,
}

impl HeaderPolicy {
    /// Returns true if a header with this name may be forwarded.
    pub fn allows(self, name: &HeaderName) -> bool {
        let name = name.as_str();
        if is_hop_by_hop(name) {
            return false;
        }
        match self {
            HeaderPolicy::Proxy => {
                PROXY_ALLOWED_HEADERS.contains(&name)
                    || name.starts_with("sec-")
                    || name.starts_with("x-")
            }
            HeaderPolicy::Api => API_ALLOWED_HEADERS.contains(&name) || name.starts_with("x-"),
        }
    }

    /// Copy the allowed subset of `inbound`, preserving repeated values.
    pub fn filter(self, inbound: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::new();
        for (name, value) in inbound {
            if self.allows(name) {
                out.append(name.clone(), value.clone());
            }
        }
        out
    }
}

/// Check if a header is a hop-by-hop header.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Headers for the passthrough proxy.
///
/// `proxy_origin` is the proxy's own origin (no trailing slash); a Referer
/// pointing into the proxy is rewritten so that it points at the target.
pub fn filter_proxy_headers(inbound: &HeaderMap, proxy_origin: &str, target: &Url) -> HeaderMap {
    let mut headers = HeaderPolicy::Proxy.filter(inbound);

    if let Some(referer) = inbound.get(header::REFERER).and_then(|v| v.to_str().ok()) {
        let rewritten = rewrite_referer(referer, proxy_origin, target);
        match HeaderValue::from_str(&rewritten) {
            Ok(value) => {
                headers.insert(header::REFERER, value);
            }
            Err(e) => tracing::debug!(error = %e, "Dropping unrepresentable referer"),
        }
    }

    headers
}

/// Map a Referer seen by the proxy to the one the upstream should see.
pub fn rewrite_referer(referer: &str, proxy_origin: &str, target: &Url) -> String {
    let proxied_space = format!("{}/proxy/", proxy_origin);
    if let Some(embedded) = referer.strip_prefix(&proxied_space) {
        if has_http_scheme(embedded) {
            return embedded.to_string();
        }
    }
    match referer.strip_prefix(proxy_origin) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{}", target.origin().ascii_serialization(), rest)
        }
        _ => referer.to_string(),
    }
}

/// Headers for a registered upstream API.
pub fn filter_api_headers(inbound: &HeaderMap, quirk: ProviderQuirk) -> HeaderMap {
    let mut headers = HeaderPolicy::Api.filter(inbound);

    if quirk == ProviderQuirk::AnthropicVersion && !headers.contains_key(ANTHROPIC_VERSION_HEADER) {
        headers.insert(
            HeaderName::from_static(ANTHROPIC_VERSION_HEADER),
            HeaderValue::from_static(DEFAULT_ANTHROPIC_VERSION),
        );
    }
    if !headers.contains_key(header::USER_AGENT) {
        headers.insert(header::USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    }

    headers
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// CORS and security headers for the passthrough proxy.
///
/// An inbound `Origin` is echoed with credentials allowed; otherwise any
/// origin is allowed.
pub fn apply_passthrough_cors(headers: &mut HeaderMap, origin: Option<&HeaderValue>) {
    match origin {
        Some(origin) => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
        None => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        }
    }

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_ALLOW_METHODS),
    );
    let allow_headers = format!(
        "Content-Type, Authorization, X-Requested-With, {}",
        PROXY_ALLOWED_HEADERS.join(", ")
    );
    if let Ok(value) = HeaderValue::from_str(&allow_headers) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
    }
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(CORS_MAX_AGE));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer-when-downgrade"),
    );
}

/// Fixed CORS and security headers for registered upstream APIs.
pub fn apply_api_cors(headers: &mut HeaderMap) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(API_CORS_ALLOW_HEADERS),
    );
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
}

/// Case-insensitive check for an `http://` or `https://` prefix.
pub fn has_http_scheme(value: &str) -> bool {
    let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("text/html"));
        headers.insert("authorization", HeaderValue::from_static("Bearer sk-test"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8.0"));
        headers.insert("cookie", HeaderValue::from_static("session=1"));
        headers.insert("host", HeaderValue::from_static("relay.example.com"));
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
        headers.insert("x-api-key", HeaderValue::from_static("k"));
        headers.insert("anthropic-version", HeaderValue::from_static("2024-01-01"));
        headers
    }

    #[test]
    fn test_proxy_policy() {
        let target = Url::parse("https://site.example/page").unwrap();
        let headers = filter_proxy_headers(&inbound(), "https://relay.example.com", &target);

        assert!(headers.contains_key("accept"));
        assert!(headers.contains_key("authorization"));
        assert!(headers.contains_key("user-agent"));
        assert!(headers.contains_key("sec-fetch-mode"));
        assert!(headers.contains_key("x-api-key"));
        assert!(!headers.contains_key("cookie"));
        assert!(!headers.contains_key("host"));
        assert!(!headers.contains_key("connection"));
        assert!(!headers.contains_key("transfer-encoding"));
        assert!(!headers.contains_key("anthropic-version"));
    }

    #[test]
    fn test_api_policy() {
        let headers = filter_api_headers(&inbound(), ProviderQuirk::None);

        assert!(headers.contains_key("authorization"));
        assert!(headers.contains_key("accept"));
        assert!(headers.contains_key("x-api-key"));
        assert_eq!(headers["anthropic-version"], "2024-01-01");
        assert!(!headers.contains_key("sec-fetch-mode"));
        assert!(!headers.contains_key("cookie"));
        assert!(!headers.contains_key("connection"));
        // The caller's user agent is not on the API allow-list.
        assert_eq!(headers["user-agent"], DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_api_policy_injects_anthropic_version() {
        let mut inbound = inbound();
        inbound.remove("anthropic-version");

        let claude = filter_api_headers(&inbound, ProviderQuirk::AnthropicVersion);
        assert_eq!(claude["anthropic-version"], DEFAULT_ANTHROPIC_VERSION);

        let other = filter_api_headers(&inbound, ProviderQuirk::None);
        assert!(!other.contains_key("anthropic-version"));
    }

    #[test]
    fn test_caller_anthropic_version_wins() {
        let claude = filter_api_headers(&inbound(), ProviderQuirk::AnthropicVersion);
        assert_eq!(claude["anthropic-version"], "2024-01-01");
    }

    #[test]
    fn test_referer_rewrite() {
        let target = Url::parse("https://site.example:8443/deep/page").unwrap();
        let proxy = "https://relay.example.com";

        assert_eq!(
            rewrite_referer("https://relay.example.com/proxy/https://site.example:8443/x", proxy, &target),
            "https://site.example:8443/x"
        );
        assert_eq!(
            rewrite_referer("https://relay.example.com/other", proxy, &target),
            "https://site.example:8443/other"
        );
        assert_eq!(
            rewrite_referer("https://elsewhere.example/", proxy, &target),
            "https://elsewhere.example/"
        );
        assert_eq!(
            rewrite_referer("https://relay.example.com.evil/", proxy, &target),
            "https://relay.example.com.evil/"
        );
    }

    #[test]
    fn test_referer_forwarded_in_proxy_policy() {
        let mut inbound = HeaderMap::new();
        inbound.insert(
            "referer",
            HeaderValue::from_static("http://localhost:8080/proxy/https://site.example/a"),
        );
        let target = Url::parse("https://site.example/b").unwrap();
        let headers = filter_proxy_headers(&inbound, "http://localhost:8080", &target);
        assert_eq!(headers["referer"], "https://site.example/a");
    }

    #[test]
    fn test_strip_hop_by_hop_honours_connection_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("close, x-internal"));
        headers.insert("x-internal", HeaderValue::from_static("1"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("content-type"));
    }

    #[test]
    fn test_passthrough_cors_echoes_origin() {
        let mut headers = HeaderMap::new();
        let origin = HeaderValue::from_static("https://app.example");
        apply_passthrough_cors(&mut headers, Some(&origin));

        assert_eq!(headers["access-control-allow-origin"], "https://app.example");
        assert_eq!(headers["access-control-allow-credentials"], "true");
        assert_eq!(headers["access-control-max-age"], "86400");
        assert_eq!(headers["x-content-type-options"], "nosniff");

        let mut headers = HeaderMap::new();
        apply_passthrough_cors(&mut headers, None);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert!(!headers.contains_key("access-control-allow-credentials"));
    }

    #[test]
    fn test_api_cors() {
        let mut headers = HeaderMap::new();
        apply_api_cors(&mut headers);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], CORS_ALLOW_METHODS);
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["referrer-policy"], "no-referrer");
    }

    #[test]
    fn test_has_http_scheme() {
        assert!(has_http_scheme("http://a"));
        assert!(has_http_scheme("HTTPS://a"));
        assert!(!has_http_scheme("ftp://a"));
        assert!(!has_http_scheme("http:/a"));
        assert!(!has_http_scheme(""));
    }
}
