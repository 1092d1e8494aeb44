//! # Google Drive Provider
//!
//! Storage backend uploading media files into a Google Drive folder with a
//! service account.
//!
//! ## Overview
//!
//! - Finds the configured folder by name, or creates it
//! - Shares the folder with the configured addresses (writer role)
//! - Uploads files in chunks through a resumable session and returns their
//!   `webViewLink`

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{GoogleDriveBackend, DRIVE_FILE_SCOPE};
pub use error::{GoogleDriveError, Result};
