//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the media sync crates:
//! - Configuration loading and validation ([`config`])
//! - Logging and tracing setup ([`logging`])
//!
//! Configuration is read once at startup and handed to each component as a
//! typed value; nothing in the workspace reads settings globally.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    DaemonSettings, DriverSettings, GoogleDriveSettings, LocalSettings, MediaSyncConfig,
    MerginSettings, MinioSettings, OperationMode, ReferenceSpec,
};
pub use error::{Error, Result};
