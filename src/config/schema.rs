//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, public origin).
    pub listener: ListenerConfig,

    /// Registered upstream APIs, matched by path prefix.
    pub upstreams: Vec<UpstreamConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Usage counter store settings.
    pub store: StoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request size limits.
    pub security: SecurityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            upstreams: default_upstreams(),
            timeouts: TimeoutConfig::default(),
            store: StoreConfig::default(),
            observability: ObservabilityConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Externally visible origin (e.g., "https://relay.example.com").
    ///
    /// When unset, the origin is derived per request from `X-Forwarded-Proto`
    /// and the `Host` header.
    pub public_origin: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            public_origin: None,
        }
    }
}

/// A registered upstream API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Path prefix, e.g. "/openai".
    pub prefix: String,

    /// Base URL the residual path is appended to.
    pub upstream: String,

    /// Provider-specific request adaptation.
    #[serde(default)]
    pub quirk: ProviderQuirk,
}

impl UpstreamConfig {
    pub fn new(prefix: impl Into<String>, upstream: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            upstream: upstream.into(),
            quirk: ProviderQuirk::None,
        }
    }

    pub fn with_quirk(mut self, quirk: ProviderQuirk) -> Self {
        self.quirk = quirk;
        self
    }
}

/// Per-provider request adaptations applied by the named API proxy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderQuirk {
    #[default]
    None,
    /// Inject `anthropic-version` when the caller omitted it.
    AnthropicVersion,
    /// Force `generationConfig.thinkingConfig.thinkingBudget = 0` on JSON POSTs.
    DisableThinking,
}

/// The built-in provider table.
pub fn default_upstreams() -> Vec<UpstreamConfig> {
    vec![
        UpstreamConfig::new("/discord", "https://discord.com/api"),
        UpstreamConfig::new("/telegram", "https://api.telegram.org"),
        UpstreamConfig::new("/openai", "https://api.openai.com"),
        UpstreamConfig::new("/claude", "https://api.anthropic.com")
            .with_quirk(ProviderQuirk::AnthropicVersion),
        UpstreamConfig::new("/gemini", "https://generativelanguage.googleapis.com"),
        UpstreamConfig::new("/gemininthk", "https://generativelanguage.googleapis.com")
            .with_quirk(ProviderQuirk::DisableThinking),
        UpstreamConfig::new("/meta", "https://www.meta.ai/api"),
        UpstreamConfig::new("/groq", "https://api.groq.com/openai"),
        UpstreamConfig::new("/xai", "https://api.x.ai"),
        UpstreamConfig::new("/cohere", "https://api.cohere.ai"),
        UpstreamConfig::new("/huggingface", "https://api-inference.huggingface.co"),
        UpstreamConfig::new("/together", "https://api.together.xyz"),
        UpstreamConfig::new("/novita", "https://api.novita.ai"),
        UpstreamConfig::new("/portkey", "https://api.portkey.ai"),
        UpstreamConfig::new("/fireworks", "https://api.fireworks.ai"),
        UpstreamConfig::new("/openrouter", "https://openrouter.ai/api"),
    ]
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Total upstream call deadline in seconds, body included.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 60,
        }
    }
}

/// Which counter store backs the usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
}

/// Usage counter store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// JSON file used by the file backend.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            path: "multi-proxy-stats.json".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum size in bytes of a request body that has to be buffered.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_upstream_table() {
        let config = ProxyConfig::default();
        assert_eq!(config.upstreams.len(), 16);

        let parsed: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(parsed.upstreams.len(), 16);
        let claude = parsed.upstreams.iter().find(|u| u.prefix == "/claude").unwrap();
        assert_eq!(claude.quirk, ProviderQuirk::AnthropicVersion);
    }

    #[test]
    fn test_parse_custom_upstreams() {
        let parsed: ProxyConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"
            public_origin = "https://relay.example.com"

            [store]
            backend = "memory"

            [[upstreams]]
            prefix = "/thinkless"
            upstream = "https://generativelanguage.googleapis.com"
            quirk = "disable-thinking"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(parsed.store.backend, StoreBackend::Memory);
        assert_eq!(parsed.upstreams.len(), 1);
        assert_eq!(parsed.upstreams[0].quirk, ProviderQuirk::DisableThinking);
        assert_eq!(parsed.timeouts.upstream_secs, 60);
    }
}
