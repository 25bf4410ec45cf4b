//! HTTP server entry point for urlhawk.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use urlhawk_api::create_router;
use urlhawk_engine::Orchestrator;

#[derive(Parser)]
#[command(name = "urlhawk-api")]
#[command(about = "HTTP API for on-demand urlhawk scans")]
struct Cli {
    /// Listen address, overriding `api.bind`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Config file prefix (default: urlhawk).
    #[arg(short, long, default_value = "urlhawk")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let config = urlhawk_core::config::load(&cli.config)?;
    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    tracing::info!(probes = orchestrator.registry().len(), "Probe registry loaded");

    let bind = cli.bind.unwrap_or(config.api.bind);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, "API listening");

    axum::serve(listener, create_router(orchestrator))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
