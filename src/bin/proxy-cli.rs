use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use multi_proxy::config::load_config;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for the multi-proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the aggregate usage statistics
    Stats,
    /// Print the counters of one endpoint prefix
    Endpoint {
        /// Registered prefix, e.g. /openai
        prefix: String,
    },
    /// Load and validate a configuration file
    Validate {
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Stats => {
            let stats = fetch_stats(&cli.url).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Endpoint { prefix } => {
            let stats = fetch_stats(&cli.url).await?;
            match stats.get("endpoints").and_then(|e| e.get(&prefix)) {
                Some(counters) => println!("{}", serde_json::to_string_pretty(counters)?),
                None => {
                    eprintln!("Error: unknown endpoint {}", prefix);
                    std::process::exit(1);
                }
            }
        }
        Commands::Validate { config } => match load_config(&config) {
            Ok(config) => {
                println!("OK: {} upstreams", config.upstreams.len());
                for upstream in &config.upstreams {
                    println!("  {} -> {}", upstream.prefix, upstream.upstream);
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

async fn fetch_stats(base: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let res = reqwest::get(format!("{}/stats", base.trim_end_matches('/'))).await?;
    let status = res.status();
    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        return Err(format!("proxy returned status {}: {}", status, text).into());
    }
    Ok(res.json().await?)
}
