//! Version-Control Abstraction
//!
//! Interface to the version-controlled project that tracks the media files:
//! downloading a working copy, pulling and pushing changes, and inspecting
//! local modifications.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// One file entry from a project listing or a change summary.
///
/// Identity is `path`, relative to the project root and `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeRecord {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl FileChangeRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            checksum: None,
            size: None,
        }
    }
}

/// Server-side state of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub version: String,
    pub files: Vec<FileChangeRecord>,
}

/// Added, updated and removed files between two states of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<FileChangeRecord>,
    pub updated: Vec<FileChangeRecord>,
    pub removed: Vec<FileChangeRecord>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Number of changed entries across all three categories.
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    /// Files whose content has to be fetched: `added ∪ updated`, in that order.
    pub fn incoming(&self) -> Vec<FileChangeRecord> {
        self.added
            .iter()
            .chain(self.updated.iter())
            .cloned()
            .collect()
    }
}

/// Authenticated client for a version-controlled project.
///
/// A value of this trait represents one login session. Sessions are not
/// refreshed in place; a [`VcsConnector`] creates a replacement.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Download `project` into the (not yet existing) directory `dir`.
    async fn download(&self, project: &str, dir: &Path) -> Result<ProjectInfo>;

    /// Fetch the current server-side state of `project`.
    async fn project_info(&self, project: &str) -> Result<ProjectInfo>;

    /// Whether `dir` holds a working copy of a project.
    fn has_working_copy(&self, dir: &Path) -> bool;

    /// Version the working copy in `dir` was last synchronized to.
    async fn local_version(&self, dir: &Path) -> Result<String>;

    /// Local modifications in `dir` relative to its last synchronized version.
    async fn pending_changes(&self, dir: &Path) -> Result<ChangeSet>;

    /// Changes between the working copy in `dir` and the server state `server`.
    async fn pull_changes(&self, dir: &Path, server: &ProjectInfo) -> Result<ChangeSet>;

    /// Bring the working copy in `dir` to the latest server version.
    ///
    /// Returns the version the working copy is at afterwards.
    async fn pull(&self, dir: &Path) -> Result<String>;

    /// Upload local modifications in `dir` as a new project version.
    ///
    /// Returns the version the working copy is at afterwards.
    async fn push(&self, dir: &Path) -> Result<String>;

    /// Expiry of the authenticated session, if the server reported one.
    fn session_expires_at(&self) -> Option<DateTime<Utc>>;
}

/// Factory for authenticated [`VersionControl`] sessions.
#[async_trait]
pub trait VcsConnector: Send + Sync {
    /// Authenticate and return a fresh session.
    async fn connect(&self) -> Result<Arc<dyn VersionControl>>;
}
