//! Upstream registry: the fixed table of path prefixes and their base URLs.

use crate::config::{ProviderQuirk, UpstreamConfig};
use crate::routing::matcher::PathPrefixMatcher;

/// A registered upstream API.
#[derive(Debug, Clone)]
pub struct Upstream {
    matcher: PathPrefixMatcher,
    /// Base URL with no trailing slash; the residual path is appended verbatim.
    pub base: String,
    pub quirk: ProviderQuirk,
}

impl Upstream {
    pub fn new(prefix: impl Into<String>, base: impl Into<String>, quirk: ProviderQuirk) -> Self {
        let base: String = base.into();
        Self {
            matcher: PathPrefixMatcher::new(prefix),
            base: base.trim_end_matches('/').to_string(),
            quirk,
        }
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    /// Full upstream URL for a residual path and optional query string.
    pub fn target_url(&self, rest: &str, query: Option<&str>) -> String {
        match query {
            Some(q) => format!("{}{}?{}", self.base, rest, q),
            None => format!("{}{}", self.base, rest),
        }
    }
}

/// Immutable, ordered prefix table.
///
/// Lookup is segment-aware and the longest matching prefix wins, so the
/// result does not depend on declaration order. Declaration order is kept
/// for presentation (dashboard, stats).
#[derive(Debug, Clone, Default)]
pub struct UpstreamRegistry {
    entries: Vec<Upstream>,
}

impl UpstreamRegistry {
    pub fn new(entries: Vec<Upstream>) -> Self {
        Self { entries }
    }

    pub fn from_config(configs: &[UpstreamConfig]) -> Self {
        Self::new(
            configs
                .iter()
                .map(|c| Upstream::new(c.prefix.clone(), c.upstream.clone(), c.quirk))
                .collect(),
        )
    }

    pub fn entries(&self) -> &[Upstream] {
        &self.entries
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Upstream::prefix)
    }

    pub fn get(&self, prefix: &str) -> Option<&Upstream> {
        self.entries.iter().find(|e| e.prefix() == prefix)
    }

    /// Resolve a path to its upstream and the residual path.
    pub fn lookup<'a>(&self, path: &'a str) -> Option<(&Upstream, &'a str)> {
        self.entries
            .iter()
            .filter_map(|e| e.matcher.strip(path).map(|rest| (e, rest)))
            .max_by_key(|(e, _)| e.prefix().len())
    }
}
