//! Content rewriting for proxied HTML and CSS.
//!
//! # Data Flow
//! ```text
//! upstream response (content-type)
//!     → classify() → Html | Css | Opaque
//!     → html.rs / css.rs (text → text, links re-pointed through the proxy)
//!     → Opaque bodies bypass this module and are streamed unchanged
//! ```
//!
//! # Design Decisions
//! - Textual, regex-based rewriting rather than a markup parser. Malformed or
//!   nested attribute quoting is not guaranteed to round-trip; that is an
//!   accepted approximation.
//! - Pure functions: output depends only on (RewriteContext, input text)
//! - A link already pointing into the proxy is never prefixed twice

pub mod css;
pub mod html;

use url::Url;

use crate::security::headers::has_http_scheme;

/// How an upstream body must be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Css,
    Opaque,
}

impl ContentKind {
    /// Classify a `Content-Type` header value.
    pub fn classify(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return ContentKind::Opaque;
        };
        let lower = content_type.to_ascii_lowercase();
        if lower.contains("text/html") {
            ContentKind::Html
        } else if lower.contains("text/css") {
            ContentKind::Css
        } else {
            ContentKind::Opaque
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Html => "html",
            ContentKind::Css => "css",
            ContentKind::Opaque => "opaque",
        }
    }
}

/// The two URLs needed to rewrite a link: where the proxy lives and where
/// the current content came from.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    /// `<proxyOrigin>/proxy/`
    proxy_base: String,
    /// Full URL of the document being rewritten.
    target: Url,
    /// `scheme://host[:port]` of `target`.
    target_origin: String,
}

impl RewriteContext {
    /// `proxy_origin` is the proxy's own origin without a trailing slash.
    pub fn new(proxy_origin: &str, target: Url) -> Self {
        let target_origin = target.origin().ascii_serialization();
        Self {
            proxy_base: format!("{}/proxy/", proxy_origin.trim_end_matches('/')),
            target,
            target_origin,
        }
    }

    pub fn proxy_base(&self) -> &str {
        &self.proxy_base
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn target_origin(&self) -> &str {
        &self.target_origin
    }

    /// Wrap an absolute URL so that it is fetched through the proxy.
    pub fn proxied(&self, absolute: &str) -> String {
        format!("{}{}", self.proxy_base, absolute)
    }

    fn is_proxied(&self, value: &str) -> bool {
        value.starts_with(&self.proxy_base)
    }

    /// Markup link rule: root-relative and absolute http(s) links are
    /// re-pointed; anything else is left alone (returns `None`).
    pub fn rewrite_link(&self, value: &str) -> Option<String> {
        if self.is_proxied(value) {
            return None;
        }
        if is_root_relative(value) {
            Some(format!("{}{}{}", self.proxy_base, self.target_origin, value))
        } else if has_http_scheme(value) {
            Some(self.proxied(value))
        } else {
            None
        }
    }

    /// Resolve any reference against the target document and return the
    /// absolute http(s) URL, or `None` if it does not lead to one.
    pub fn resolve(&self, value: &str) -> Option<String> {
        if is_root_relative(value) {
            return Some(format!("{}{}", self.target_origin, value));
        }
        if has_http_scheme(value) {
            return Some(value.to_string());
        }
        let joined = self.target.join(value).ok()?;
        matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
    }
}

/// A URL beginning with `/` but not `//`.
pub fn is_root_relative(value: &str) -> bool {
    value.starts_with('/') && !value.starts_with("//")
}

/// Rewrite a text body of the given kind. Opaque content is returned as is.
pub fn rewrite_text(kind: ContentKind, ctx: &RewriteContext, text: &str) -> String {
    match kind {
        ContentKind::Html => html::rewrite_html(ctx, text),
        ContentKind::Css => css::rewrite_css(ctx, text),
        ContentKind::Opaque => text.to_string(),
    }
}
