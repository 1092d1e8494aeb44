//! One-shot media sync: a single download or pull cycle, then exit.

use anyhow::Context;
use clap::Parser;
use core_runtime::config::MediaSyncConfig;
use core_service::cli::Cli;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.init("media-sync").context("Failed to initialize logging")?;

    let config = match MediaSyncConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e @ core_runtime::Error::Io(_)) => return Err(e.into()),
        Err(e) => {
            error!("Error: {}", e);
            return Ok(());
        }
    };

    match core_service::run_once(config).await {
        Ok(report) => info!(
            migrated = report.migrations.len(),
            skipped = report.skipped,
            failed = report.failed,
            "Sync finished"
        ),
        Err(e) => error!("Error: {}", e),
    }
    Ok(())
}
