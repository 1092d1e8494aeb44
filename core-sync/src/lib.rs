//! # Media Sync Engine
//!
//! Moves media files out of a Mergin project into external storage and keeps
//! the project's reference tables pointing at them.
//!
//! ## Components
//!
//! - **Selector** (`selector`): Picks the changed files eligible for sync
//! - **Cycle** (`cycle`): State machine and report of one sync pass
//! - **Reference Rewriter** (`references`): Transactional updates of GeoPackage reference rows
//! - **Sync Coordinator** (`coordinator`): Runs fetch, transfer, rewrite and push for one cycle
//! - **Daemon** (`daemon`): Repeats cycles on an interval and renews the Mergin session

pub mod coordinator;
pub mod cycle;
pub mod daemon;
pub mod error;
pub mod references;
pub mod selector;

pub use coordinator::{SyncConfig, SyncCoordinator};
pub use cycle::{CycleReport, CycleState, MigrationMap, SyncCycle};
pub use daemon::{session_needs_renewal, SyncDaemon};
pub use error::{Result, SyncError};
pub use references::{is_safe_reference_value, ReferenceRewriter};
pub use selector::{select, ChangeSelector};
