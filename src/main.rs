//! Multi-provider API proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌────────────────────────────────────────────────────┐
//!                          │                    MULTI PROXY                     │
//!                          │                                                    │
//!   Client Request         │  ┌──────────┐    ┌──────────┐                      │
//!   ───────────────────────┼─▶│   http   │───▶│ routing  │                      │
//!                          │  │  server  │    │  router  │                      │
//!                          │  └──────────┘    └────┬─────┘                      │
//!                          │        ┌──────────────┼───────────────┐            │
//!                          │        ▼              ▼               ▼            │
//!                          │  ┌──────────┐  ┌─────────────┐  ┌───────────┐      │
//!                          │  │  pages   │  │ passthrough │  │    api    │      │
//!                          │  │dashboard │  │  /proxy/..  │  │ /prefix/..│      │
//!                          │  └────┬─────┘  └──────┬──────┘  └─────┬─────┘      │
//!                          │       │               │               │            │
//!                          │       ▼               ▼               ▼            │
//!                          │  ┌──────────┐  ┌─────────────┐  ┌───────────┐      │     Upstream
//!                          │  │  stats   │  │  rewrite    │  │ security  │──────┼───▶ origins
//!                          │  │  store   │◀─┤  html/css   │  │  headers  │      │
//!                          │  └──────────┘  └─────────────┘  └───────────┘      │
//!                          └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use multi_proxy::config::{load_config, ProxyConfig};
use multi_proxy::lifecycle;
use multi_proxy::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "multi-proxy")]
#[command(about = "API and passthrough proxy", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        bind_address = %config.listener.bind_address,
        upstreams = config.upstreams.len(),
        upstream_timeout_secs = config.timeouts.upstream_secs,
        "multi-proxy starting"
    );

    lifecycle::run(config).await?;
    Ok(())
}
