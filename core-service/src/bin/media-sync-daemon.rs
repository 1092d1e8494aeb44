//! Media sync daemon: bootstrap the working copy, then pull and sync on a
//! fixed interval until interrupted.

use anyhow::Context;
use clap::Parser;
use core_runtime::config::MediaSyncConfig;
use core_service::cli::Cli;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.init("media-sync-daemon")
        .context("Failed to initialize logging")?;

    let config = match MediaSyncConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e @ core_runtime::Error::Io(_)) => return Err(e.into()),
        Err(e) => {
            error!("Error: {}", e);
            return Ok(());
        }
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current cycle");
            on_signal.cancel();
        }
    });

    if let Err(e) = core_service::start_daemon(config, cancel).await {
        error!("Error: {}", e);
    }
    Ok(())
}
