//! Edge gateway binary: parse flags, load config, serve until shutdown.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_gateway::config::{load_config, GatewayConfig};
use edge_gateway::observability::{logging, metrics};
use edge_gateway::{GatewayServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "edge-gateway", about = "Edge-side traffic gateway")]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream_servers = ?config.upstream.servers,
        max_requests_in_flight = config.admission.max_requests_in_flight,
        node_labels = config.node_labels.len(),
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = std::sync::Arc::new(Shutdown::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_shutdown.trigger();
        }
    });

    let server = GatewayServer::new(config);
    server.run(listener, &shutdown).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
