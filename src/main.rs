//! blockhash-relayer
//!
//! # Architecture Overview
//!
//! ```text
//!   source chain (ws newHeads)                     destination chain (http rpc)
//!          │                                                   ▲
//!          ▼                                                   │ receiveBlockHash(hash)
//!   ┌──────────────┐   ┌─────────────────┐   ┌─────────┐   ┌───────────┐
//!   │ ChainWatcher │──▶│ IntervalCounter │──▶│ Builder │──▶│ Submitter │
//!   └──────────────┘   │  (per target)   │   └─────────┘   └───────────┘
//!                      └─────────────────┘
//!                              │
//!                              ▼
//!                     publish-cursors.json
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use blockhash_relayer::config::load_config;
use blockhash_relayer::lifecycle::{build_orchestrator, wait_for_shutdown_signal};
use blockhash_relayer::observability::{init_logging, init_metrics};

#[derive(Parser, Debug)]
#[command(
    name = "blockhash-relayer",
    version,
    about = "Publishes source chain block hashes to destination chains"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long)]
    config_file: PathBuf,

    /// Overrides the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config_file) {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"));
            tracing::error!(
                path = %cli.config_file.display(),
                error = %e,
                "Failed to load configuration"
            );
            return ExitCode::FAILURE;
        }
    };

    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        sources = config.source_subnets.len(),
        destinations = config.destination_subnets.len(),
        storage = %config.storage_location.display(),
        "blockhash-relayer starting"
    );

    if config.metrics.enabled {
        match config.metrics.bind_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr),
            Err(e) => tracing::error!(
                bind_address = %config.metrics.bind_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let orchestrator = match build_orchestrator(&config).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let mut handle = orchestrator.start();
    tokio::select! {
        _ = wait_for_shutdown_signal() => {}
        _ = handle.wait() => tracing::warn!("All relayer tasks ended"),
    }

    handle.stop().await;
    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
