//! # Mergin Provider
//!
//! Version-control client for Mergin projects: session login, project
//! download, pull and chunked push, plus inspection of the local working
//! copy stored next to the project files.

pub mod client;
pub mod error;
pub mod project;
pub mod types;

pub use client::{parse_expiry, split_project_name, MerginClient, MerginConnector};
pub use error::{MerginError, Result};
pub use project::{compare, file_checksum, WorkingCopy, METADATA_DIR};
pub use types::{ProjectFile, ProjectMetadata};
