//! Workspace facade crate.
//!
//! Re-exports the `core-service` entry points so that host binaries and
//! integration harnesses can depend on `media-sync-workspace` alone instead
//! of wiring each workspace crate individually.

pub use core_service::{run_once, start_daemon, CoreError};
