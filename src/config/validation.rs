//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate upstream URLs and prefix shapes
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect duplicate or reserved prefixes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// Paths owned by the router itself; upstream prefixes may not shadow them.
pub const RESERVED_PREFIXES: &[&str] = &["/proxy", "/stats", "/robots.txt", "/index.html"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("invalid public origin '{0}'")]
    PublicOrigin(String),

    #[error("prefix '{0}' must start with '/' and must not end with '/'")]
    PrefixShape(String),

    #[error("prefix '{0}' is declared more than once")]
    DuplicatePrefix(String),

    #[error("prefix '{0}' collides with a built-in route")]
    ReservedPrefix(String),

    #[error("upstream '{upstream}' for prefix '{prefix}' is not an absolute http(s) URL without query")]
    UpstreamUrl { prefix: String, upstream: String },

    #[error("timeout '{0}' must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("max_body_size must be greater than zero")]
    ZeroBodyLimit,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if let Some(origin) = &config.listener.public_origin {
        let valid = Url::parse(origin)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
            .unwrap_or(false);
        if !valid || origin.ends_with('/') {
            errors.push(ValidationError::PublicOrigin(origin.clone()));
        }
    }

    let mut seen = HashSet::new();
    for entry in &config.upstreams {
        let prefix = entry.prefix.as_str();
        if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
            errors.push(ValidationError::PrefixShape(prefix.to_string()));
        }
        if !seen.insert(prefix) {
            errors.push(ValidationError::DuplicatePrefix(prefix.to_string()));
        }
        if RESERVED_PREFIXES.contains(&prefix) {
            errors.push(ValidationError::ReservedPrefix(prefix.to_string()));
        }

        let valid_url = Url::parse(&entry.upstream)
            .map(|u| {
                matches!(u.scheme(), "http" | "https")
                    && u.host().is_some()
                    && u.query().is_none()
                    && u.fragment().is_none()
            })
            .unwrap_or(false);
        if !valid_url {
            errors.push(ValidationError::UpstreamUrl {
                prefix: prefix.to_string(),
                upstream: entry.upstream.clone(),
            });
        }
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("connect_secs", timeouts.connect_secs),
        ("upstream_secs", timeouts.upstream_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
