//! vidproxy
//!
//! A sanitizing reverse proxy for video embed pages, built with Tokio and
//! Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                     VIDPROXY                     │
//!                         │                                                  │
//!   GET /vidproxy/<id>    │  ┌────────┐   ┌──────────┐   ┌──────────────┐    │
//!   ──────────────────────┼─▶│  http  │──▶│ routing  │──▶│  upstream    │────┼──▶ <origin>/embed/<id>
//!                         │  │ server │   │identifier│   │   fetcher    │◀───┼───
//!                         │  └────────┘   └──────────┘   └──────┬───────┘    │
//!                         │                                     ▼            │
//!                         │                              ┌──────────────┐    │
//!                         │                              │   content    │    │
//!                         │                              │   dispatch   │    │
//!                         │                              └──┬────────┬──┘    │
//!                         │                         text/html│        │other │
//!                         │                                  ▼        │      │
//!                         │                          ┌────────────┐   │      │
//!                         │                          │  rewrite   │   │      │
//!                         │                          │  pipeline  │   │      │
//!                         │                          └─────┬──────┘   │      │
//!   sanitized response    │  ┌──────────┐    ┌─────────┐   │          │      │
//!   ◀─────────────────────┼──│ response │◀───│security │◀──┘          │      │
//!                         │  │ envelope │◀───┼─────────┼──────────────┘      │
//!                         │  └──────────┘    └─────────┘                     │
//!                         │                                                  │
//!                         │  config · observability · lifecycle · rate limit │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use vidproxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use vidproxy::lifecycle::{shutdown_signal, Shutdown};
use vidproxy::net::load_tls_config;
use vidproxy::observability::{logging, metrics};
use vidproxy::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "vidproxy", version, about = "Sanitizing reverse proxy for video embed pages")]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init(&config.observability)?;

    tracing::info!("vidproxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.origin(),
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        rate_limit = config.rate_limit.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        trigger.trigger();
    });

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(&tls).await?;
            server.run_tls(rustls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
