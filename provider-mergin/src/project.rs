//! Local working copy of a Mergin project
//!
//! A working copy is a directory with a `.mergin/mergin.json` metadata file
//! describing the project version it was last synchronized to. Local
//! modifications are found by scanning the directory and comparing
//! checksums with that metadata.

use bridge_traits::vcs::{ChangeSet, FileChangeRecord};
use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{MerginError, Result};
use crate::types::{ProjectFile, ProjectMetadata};

/// Directory holding working copy metadata
pub const METADATA_DIR: &str = ".mergin";
const METADATA_FILE: &str = "mergin.json";

/// Transient files never tracked by the project (SQLite journals, editor leftovers).
const IGNORED_SUFFIXES: &[&str] = &["-wal", "-shm", "-journal", "~", ".swap"];
const IGNORED_NAMES: &[&str] = &[".DS_Store", ".directory"];

/// Local working copy rooted at a directory
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    root: PathBuf,
}

impl WorkingCopy {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the directory contains working copy metadata
    pub fn is_initialized(&self) -> bool {
        self.root.join(METADATA_DIR).is_dir()
    }

    /// Absolute path of a `/`-separated project path
    pub fn file_path(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_DIR).join(METADATA_FILE)
    }

    pub async fn read_metadata(&self) -> Result<ProjectMetadata> {
        let path = self.metadata_path();
        let content = tokio::fs::read(&path).await.map_err(|e| {
            MerginError::WorkingCopy(format!(
                "{} does not seem to contain Mergin project metadata: {}",
                self.root.display(),
                e
            ))
        })?;
        serde_json::from_slice(&content).map_err(|e| {
            MerginError::WorkingCopy(format!("Corrupt metadata {}: {}", path.display(), e))
        })
    }

    pub async fn write_metadata(&self, metadata: &ProjectMetadata) -> Result<()> {
        let dir = self.root.join(METADATA_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let content = serde_json::to_vec_pretty(metadata)
            .map_err(|e| MerginError::ParseError(e.to_string()))?;
        let tmp = dir.join(format!("{}.tmp", METADATA_FILE));
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, self.metadata_path()).await?;
        Ok(())
    }

    /// Current files on disk with checksums
    pub async fn scan(&self) -> Result<Vec<ProjectFile>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || scan_directory(&root))
            .await
            .map_err(|e| MerginError::WorkingCopy(format!("Scan task failed: {}", e)))?
    }

    /// Local modifications relative to the last synchronized version
    pub async fn pending_changes(&self) -> Result<ChangeSet> {
        let metadata = self.read_metadata().await?;
        let current = self.scan().await?;
        let changes = compare(&metadata.files, &current);
        debug!(
            added = changes.added.len(),
            updated = changes.updated.len(),
            removed = changes.removed.len(),
            "Computed local changes"
        );
        Ok(changes)
    }
}

fn is_ignored(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if entry.file_type().is_dir() {
        return entry.depth() == 1 && name == METADATA_DIR;
    }
    IGNORED_NAMES.contains(&name.as_ref())
        || IGNORED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

fn scan_directory(root: &Path) -> Result<Vec<ProjectFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored(e))
    {
        let entry = entry.map_err(|e| MerginError::WorkingCopy(format!("Scan failed: {}", e)))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| MerginError::WorkingCopy(e.to_string()))?;
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let metadata = entry.metadata().map_err(|e| MerginError::WorkingCopy(e.to_string()))?;
        let mtime = metadata
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

        files.push(ProjectFile {
            path,
            checksum: file_checksum(entry.path())?,
            size: metadata.len(),
            mtime,
        });
    }

    Ok(files)
}

/// Hex SHA-1 of a file's content
pub fn file_checksum(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Changes turning file list `old` into `new`.
///
/// `added` and `updated` follow the order of `new`, `removed` the order of `old`.
pub fn compare(old: &[ProjectFile], new: &[ProjectFile]) -> ChangeSet {
    let old_by_path: HashMap<&str, &ProjectFile> =
        old.iter().map(|f| (f.path.as_str(), f)).collect();
    let new_by_path: HashMap<&str, &ProjectFile> =
        new.iter().map(|f| (f.path.as_str(), f)).collect();

    let mut changes = ChangeSet::default();

    for file in new {
        match old_by_path.get(file.path.as_str()) {
            None => changes.added.push(FileChangeRecord::from(file)),
            Some(previous) if previous.checksum != file.checksum => {
                changes.updated.push(FileChangeRecord::from(file))
            }
            Some(_) => {}
        }
    }

    for file in old {
        if !new_by_path.contains_key(file.path.as_str()) {
            changes.removed.push(FileChangeRecord::from(file));
        }
    }

    changes
}
