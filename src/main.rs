//! Ring Proxy
//!
//! An HTTP load balancer built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                 LOAD BALANCER                │
//!     Client Request    │  ┌─────────┐    ┌──────────────────────┐     │
//!     ──────────────────┼─▶│  http   │───▶│ pool: strategy picks │     │
//!                       │  │ server  │    │ backend, checks      │     │
//!                       │  └─────────┘    │ liveness             │     │
//!                       │       ▲         └──────────┬───────────┘     │
//!                       │       │                    ▼                 │
//!     Client Response   │  ┌─────────┐    ┌──────────────────────┐     │
//!     ◀─────────────────┼──│ relay   │◀───│ upstream client      │◀────┼──── Backend
//!                       │  └─────────┘    └──────────────────────┘     │
//!                       │                                              │
//!                       │  health monitor ──probes──▶ backend liveness │
//!                       │  admin routes / config watcher ──▶ pool      │
//!                       └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use ring_proxy::config::{load_config, DEFAULT_CONFIG_PATH};
use ring_proxy::lifecycle;
use ring_proxy::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "ring-proxy", version, about = "HTTP load balancer", long_about = None)]
struct Args {
    /// Path to the TOML or JSON configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            tracing::error!(path = ?args.config, error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    init_logging(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        path = ?args.config,
        servers = config.servers.len(),
        "ring-proxy starting"
    );

    if let Err(e) = lifecycle::run(config, &args.config).await {
        tracing::error!(error = %e, "Load balancer failed");
        return Err(e.into());
    }
    Ok(())
}
