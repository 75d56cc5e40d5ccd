//! Main entry point for the steam-market-client CLI

use clap::Parser;
use steam_market_client::cli::{Cli, Commands};
use steam_market_client::metrics;
use steam_market_client::shutdown::{self, ShutdownCoordinator};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("steam_market_client=info"));

    // Logs go to stderr; stdout carries command output
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = metrics::init_metrics(addr).await {
            error!("Failed to start metrics exporter: {}", e);
            std::process::exit(1);
        }
    }

    // Install global shutdown coordinator and Ctrl+C handler
    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - finishing current page...");
                shutdown.request_shutdown();
            }
        }
    });

    let result = match cli.command {
        Commands::Listings(ref args) => args
            .execute(&cli, shutdown.clone())
            .await
            .map_err(|e| anyhow::anyhow!(e)),
        Commands::Sell(ref args) => args.execute(&cli).await.map_err(|e| anyhow::anyhow!(e)),
        Commands::Session(ref args) => args.execute(&cli).map_err(|e| anyhow::anyhow!(e)),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
