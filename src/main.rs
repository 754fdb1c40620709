//! Rewriting reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request          ┌──────────────────────────────────────────────┐
//!     ────────────────────────┼─▶ axum router ──▶ proxy_handler ─────────────┼──▶ Upstream
//!                             │                                              │
//!     Client Response         │   ModifyResponseLayer                        │
//!     ◀───────────────────────┼── ChannelSink ◀── ModifiedResponse ◀─────────┼─── (coded JSON)
//!                             │                   decode → transform → encode│
//!                             └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use response_rewrite::config::{load_config, validate_config, ConfigError, ProxyConfig};
use response_rewrite::observability::{logging, metrics};
use response_rewrite::{HttpServer, Shutdown};

/// Reverse proxy that rewrites JSON response bodies, preserving their content-coding.
#[derive(Debug, Parser)]
#[command(name = "response-rewrite", version)]
struct Args {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Override the upstream address.
    #[arg(long)]
    upstream: Option<String>,
}

fn resolve_config(args: &Args) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = &args.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(upstream) = &args.upstream {
        config.upstream.address = upstream.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    logging::init_logging(&config.observability)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        request_timeout_secs = config.timeouts.request_secs,
        rules = config.rules.set.len() + config.rules.remove.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
