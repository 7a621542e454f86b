//! API gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                      GATEWAY                          │
//!   gRPC call ────────────┼─▶ GrpcIngress ─┐                                      │
//!   (method, metadata)    │                 │   ┌──────────┐   ┌──────────────┐   │
//!                         │                 ├──▶│ routing  │──▶│    auth      │   │
//!   HTTP request ─────────┼─▶ axum Router ─┘   │ table +  │   │ JwtValidator │   │
//!   (method, path, query) │   (request id,      │ matcher  │   └──────┬───────┘   │
//!                         │    trace, timeout)  └──────────┘          │           │
//!                         │                                           ▼           │
//!   Status / JSON ◀───────┼──── rendering (grpc.rs / http.rs) ◀── Dispatcher ◀───┼── Bookstore
//!                         │                                                       │
//!                         │   config (TOML, --watch reload) · observability       │
//!                         │   (tracing, Prometheus) · lifecycle (signals)         │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use api_gateway::config::watcher::ConfigWatcher;
use api_gateway::config::{load_config, parse_config, GatewayConfig};
use api_gateway::lifecycle::signals::spawn_signal_handler;
use api_gateway::observability::{logging, metrics};
use api_gateway::{Bookstore, GatewayServer, Shutdown};

const BUNDLED_CONFIG: &str = include_str!("../config/bookstore.toml");

/// gRPC + HTTP/JSON gateway with per-route JWT authorization.
#[derive(Debug, Parser)]
#[command(name = "api-gateway", version, about)]
struct Cli {
    /// Path to the TOML configuration. Defaults to the bundled bookstore table.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration when the file changes.
    #[arg(long, requires = "config")]
    watch: bool,

    /// Override `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config: GatewayConfig = match &cli.config {
        Some(path) => load_config(path)?,
        None => parse_config(BUNDLED_CONFIG)?,
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        backend_timeout_secs = config.timeouts.backend_secs,
        operations = config.operations.len(),
        issuers = config.issuers.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => (None, mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    spawn_signal_handler(shutdown);

    let server = GatewayServer::new(config, Arc::new(Bookstore::new()))?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
