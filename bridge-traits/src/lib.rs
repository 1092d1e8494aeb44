//! # Bridge Traits
//!
//! Capability traits the sync engine depends on, implemented by the
//! provider crates and by `bridge-desktop`.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP with retry policy
//! - [`StorageBackend`](storage::StorageBackend) - Upload of one media file to an external destination
//! - [`VersionControl`](vcs::VersionControl) - Download, pull, push and local change inspection of a project
//! - [`VcsConnector`](vcs::VcsConnector) - Creates authenticated `VersionControl` sessions
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Provider
//! crates convert their own error enums into it at the trait boundary and
//! should keep the original message intact so it can be surfaced to users.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so implementations can be
//! shared behind `Arc` across async tasks.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;
pub mod vcs;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::{BackendKind, StorageBackend};
pub use time::{Clock, FixedClock, SystemClock};
pub use vcs::{ChangeSet, FileChangeRecord, ProjectInfo, VcsConnector, VersionControl};
