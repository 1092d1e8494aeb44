//! Local directory storage backend using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{BackendKind, StorageBackend},
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

/// Storage backend that copies media files into a local directory tree.
///
/// The logical path of a file is kept below the destination root, so
/// `images/img2.jpg` ends up at `<dest>/images/img2.jpg`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    dest: PathBuf,
}

impl LocalBackend {
    /// Create the backend, creating the destination directory if needed.
    ///
    /// A relative `dest` is resolved against the current directory so that
    /// returned locators are always absolute.
    pub async fn new(dest: impl AsRef<Path>) -> Result<Self> {
        let dest = dest.as_ref();
        let dest = if dest.is_absolute() {
            dest.to_path_buf()
        } else {
            std::env::current_dir()?.join(dest)
        };

        fs::create_dir_all(&dest).await.map_err(|e| {
            BridgeError::Backend(format!(
                "Cannot create destination {}: {}",
                dest.display(),
                e
            ))
        })?;

        Ok(Self { dest })
    }

    pub fn destination(&self) -> &Path {
        &self.dest
    }

    fn target_path(&self, logical_path: &str) -> PathBuf {
        logical_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.dest.clone(), |path, segment| path.join(segment))
    }

    async fn is_same_file(source: &Path, target: &Path) -> bool {
        match (fs::canonicalize(source).await, fs::canonicalize(target).await) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    #[instrument(skip(self), fields(dest = %self.dest.display()))]
    async fn upload(&self, local_path: &Path, logical_path: &str) -> Result<String> {
        let target = self.target_path(logical_path);

        if Self::is_same_file(local_path, &target).await {
            return Err(BridgeError::Backend(format!(
                "{} and {} are the same file",
                local_path.display(),
                target.display()
            )));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                BridgeError::Backend(format!("Cannot create {}: {}", parent.display(), e))
            })?;
        }

        let copied = fs::copy(local_path, &target).await.map_err(|e| {
            BridgeError::Backend(format!(
                "Copy of {} to {} failed: {}",
                local_path.display(),
                target.display(),
                e
            ))
        })?;

        debug!(bytes = copied, target = %target.display(), "File copied");
        Ok(target.to_string_lossy().into_owned())
    }
}
