//! Tenant edge proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                 TENANT EDGE                  │
//!                      │                                              │
//!   Client Request     │  ┌─────────┐    ┌───────────────────────┐    │
//!   ───────────────────┼─▶│  http   │───▶│ proxy::TenantProxy    │────┼──▶ Backend
//!                      │  │ server  │    │ (+ X-Tenant-Domain)   │    │    (base_url)
//!                      │  └────┬────┘    └───────────────────────┘    │
//!                      │       │         ┌───────────────────────┐    │
//!                      │       ├────────▶│ proxy::prefix_proxy   │────┼──▶ Third party
//!                      │       │         └───────────────────────┘    │
//!                      │       │         ┌───────────────────────┐    │
//!                      │       └────────▶│ http::refresh         │────┼──▶ Backend refresh
//!                      │                 └───────────────────────┘    │
//!                      │                                              │
//!                      │  config · observability · lifecycle          │
//!                      └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use tenant_edge::config::loader::{load_config, load_from_env};
use tenant_edge::config::ObservabilityConfig;
use tenant_edge::lifecycle::{signals, Shutdown};
use tenant_edge::observability::{logging, metrics};
use tenant_edge::HttpServer;

#[derive(Parser)]
#[command(name = "tenant-edge")]
#[command(about = "Tenant-aware edge proxy", long_about = None)]
struct Args {
    /// TOML configuration file. Without one, defaults plus environment are used.
    #[arg(short, long, env = "EDGE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = match &args.config {
        Some(path) => load_config(path),
        None => load_from_env(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(err) => {
            let _ = logging::init_logging(&ObservabilityConfig::default());
            tracing::error!(error = %err, "Configuration rejected");
            return Err(err.into());
        }
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tenant-edge starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        tenant = %config.tenant.domain,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Built before binding so a missing tenant never serves a request.
    let server = match HttpServer::new(config.clone()) {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(error = %err, "Refusing to start");
            return Err(err.into());
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(signals::forward_signals(shutdown));

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
