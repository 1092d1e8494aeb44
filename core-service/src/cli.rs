//! Command-line arguments shared by the `media-sync` binaries

use clap::Parser;
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Sync media files from a Mergin Maps project to external storage")]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(default_value = "config.yaml")]
    pub config: PathBuf,

    /// Log output format: pretty, json or compact
    #[arg(long, default_value = "compact", env = "MEDIA_SYNC_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Enable debug logging with span timings
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn logging_config(&self) -> LoggingConfig {
        let level = if self.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };
        LoggingConfig::default()
            .with_format(self.log_format)
            .with_level(level)
            .with_spans(self.verbose)
    }

    /// Initialize logging and log the start banner.
    pub fn init(&self, program: &str) -> core_runtime::Result<()> {
        init_logging(self.logging_config())?;
        info!(
            config = %self.config.display(),
            "== starting {} version {} ==",
            program,
            env!("CARGO_PKG_VERSION")
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["media-sync"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert!(!cli.verbose);
        assert_eq!(cli.logging_config().level, LogLevel::Info);
        assert!(!cli.logging_config().enable_spans);
    }

    #[test]
    fn test_explicit_arguments() {
        let cli = Cli::try_parse_from([
            "media-sync-daemon",
            "/etc/media-sync/config.yaml",
            "--log-format",
            "json",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/media-sync/config.yaml"));
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.logging_config().level, LogLevel::Debug);
        assert!(cli.logging_config().enable_spans);
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        assert!(Cli::try_parse_from(["media-sync", "--log-format", "xml"]).is_err());
    }
}
