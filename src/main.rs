//! Streamgate binary entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamgate::catalog::MemoryCatalog;
use streamgate::config::{load_config, EdgeConfig};
use streamgate::http::HttpServer;
use streamgate::lifecycle::Shutdown;
use streamgate::observability::metrics;

#[derive(Parser, Debug)]
#[command(name = "streamgate", about = "Content-access protection edge")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration (defaults when no file is given).
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EdgeConfig::default(),
    };

    // Initialize tracing subscriber; RUST_LOG wins over the config level.
    let fallback = format!("streamgate={}", config.observability.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&fallback)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("streamgate v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        default_ttl_secs = config.token.default_ttl_secs,
        rate_limit_enabled = config.rate_limit.enabled,
        api_keys = config.api_keys.len(),
        "Configuration loaded"
    );

    // Metrics exporter on its own listener.
    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // Bind TCP listener.
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    // The catalog collaborator populates tracks out of band; the edge
    // starts empty and denies unknown tracks.
    let catalog = Arc::new(MemoryCatalog::new());

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let server = HttpServer::new(config, catalog)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
