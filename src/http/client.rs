//! Shared upstream HTTP client.

use std::time::Duration;

use reqwest::redirect::Policy;

use crate::config::TimeoutConfig;

/// Build the client used for every upstream call.
///
/// Redirects are never followed here: the passthrough proxy rewrites them
/// and hands them back to the caller. Compressed bodies are decoded so the
/// rewriter always sees plain text.
pub fn build_upstream_client(timeouts: &TimeoutConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .no_proxy()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.upstream_secs))
        .build()
}
