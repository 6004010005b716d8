//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Classify a request path into exactly one route kind
//! - Return the residual target/path for proxy routes
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Fixed priority: literal routes, then `/proxy/`, then the upstream registry
//! - Explicit NotFound rather than silent default

use crate::config::UpstreamConfig;
use crate::routing::matcher::{ExactMatcher, Matcher};
use crate::routing::registry::{Upstream, UpstreamRegistry};

/// Path prefix of the open passthrough proxy.
pub const PROXY_PREFIX: &str = "/proxy/";

/// Built-in pages served by the proxy itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Robots,
    Stats,
}

const PAGES: &[(ExactMatcher, Page)] = &[
    (ExactMatcher::new("/"), Page::Dashboard),
    (ExactMatcher::new("/index.html"), Page::Dashboard),
    (ExactMatcher::new("/robots.txt"), Page::Robots),
    (ExactMatcher::new("/stats"), Page::Stats),
];

/// Result of classifying a request path.
#[derive(Debug, Clone, Copy)]
pub enum RouteMatch<'a> {
    Page(Page),
    /// `/proxy/<target>`; `target` is the raw residual path.
    Passthrough { target: &'a str },
    /// `/<prefix><rest>`.
    Api { upstream: &'a Upstream, rest: &'a str },
    NotFound,
}

/// The request router.
#[derive(Debug, Clone)]
pub struct Router {
    registry: UpstreamRegistry,
}

impl Router {
    pub fn new(registry: UpstreamRegistry) -> Self {
        Self { registry }
    }

    /// Build a router from the upstream table.
    pub fn from_config(upstreams: &[UpstreamConfig]) -> Self {
        Self::new(UpstreamRegistry::from_config(upstreams))
    }

    pub fn registry(&self) -> &UpstreamRegistry {
        &self.registry
    }

    /// Classify a request path.
    pub fn resolve<'a>(&'a self, path: &'a str) -> RouteMatch<'a> {
        if let Some((_, page)) = PAGES.iter().find(|(m, _)| m.matches(path)) {
            return RouteMatch::Page(*page);
        }

        if let Some(target) = path.strip_prefix(PROXY_PREFIX) {
            return RouteMatch::Passthrough { target };
        }

        match self.registry.lookup(path) {
            Some((upstream, rest)) => RouteMatch::Api { upstream, rest },
            None => RouteMatch::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::default_upstreams;

    fn router() -> Router {
        Router::from_config(&default_upstreams())
    }

    #[test]
    fn test_pages_take_priority() {
        let router = router();
        assert!(matches!(router.resolve("/"), RouteMatch::Page(Page::Dashboard)));
        assert!(matches!(router.resolve("/index.html"), RouteMatch::Page(Page::Dashboard)));
        assert!(matches!(router.resolve("/robots.txt"), RouteMatch::Page(Page::Robots)));
        assert!(matches!(router.resolve("/stats"), RouteMatch::Page(Page::Stats)));
    }

    #[test]
    fn test_passthrough_residual() {
        let router = router();
        match router.resolve("/proxy/https://example.com/a/b") {
            RouteMatch::Passthrough { target } => assert_eq!(target, "https://example.com/a/b"),
            other => panic!("unexpected match: {:?}", other),
        }
        match router.resolve("/proxy/") {
            RouteMatch::Passthrough { target } => assert_eq!(target, ""),
            other => panic!("unexpected match: {:?}", other),
        }
    }

    #[test]
    fn test_api_route() {
        let router = router();
        match router.resolve("/claude/v1/messages") {
            RouteMatch::Api { upstream, rest } => {
                assert_eq!(upstream.prefix(), "/claude");
                assert_eq!(rest, "/v1/messages");
            }
            other => panic!("unexpected match: {:?}", other),
        }
    }

    #[test]
    fn test_not_found() {
        let router = router();
        assert!(matches!(router.resolve("/nothing/here"), RouteMatch::NotFound));
        assert!(matches!(router.resolve("/proxy"), RouteMatch::NotFound));
        assert!(matches!(router.resolve("/stats/extra"), RouteMatch::NotFound));
        assert!(matches!(router.resolve("/openaiX/v1"), RouteMatch::NotFound));
    }
}
