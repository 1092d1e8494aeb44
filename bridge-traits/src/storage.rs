//! Storage Backend Abstraction
//!
//! Uniform upload capability over the destinations media files can be
//! externalized to (local directory, S3-compatible object store, cloud drive).

use async_trait::async_trait;
use std::fmt;
use std::path::Path;

use crate::error::Result;

/// Kind of destination a backend writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Local,
    ObjectStore,
    CloudDrive,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Local => "local",
            BackendKind::ObjectStore => "object-store",
            BackendKind::CloudDrive => "cloud-drive",
        };
        f.write_str(name)
    }
}

/// Upload capability implemented by every storage backend.
///
/// Backends perform their connection setup (bucket verification, folder
/// lookup, destination creation) when they are constructed, so a value of
/// this trait is always ready to accept uploads.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::StorageBackend;
///
/// async fn externalize(backend: &dyn StorageBackend, root: &Path) -> Result<String> {
///     backend.upload(&root.join("images/img2.jpg"), "images/img2.jpg").await
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Destination kind, used for logging.
    fn kind(&self) -> BackendKind;

    /// Upload one file and return the locator under which it can be reached.
    ///
    /// `local_path` is the absolute path of the file in the working copy and
    /// `logical_path` its `/`-separated path relative to the project root.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Backend`](crate::error::BridgeError::Backend)
    /// (or `Io`) when the transfer cannot complete. Each call is independent;
    /// a failed call leaves no partial state the caller has to clean up.
    async fn upload(&self, local_path: &Path, logical_path: &str) -> Result<String>;
}
