//! # Sync Coordinator
//!
//! Runs one synchronization cycle between the Mergin project, the storage
//! backend and the reference databases.
//!
//! ## Workflow
//!
//! 1. Fetch: download the project when the working directory is missing,
//!    otherwise pull the latest version (refusing when local changes exist)
//! 2. Select the added and updated files eligible for sync
//! 3. Upload them one by one through the `StorageBackend`
//! 4. Rewrite reference rows for the uploaded files
//! 5. Delete uploaded files in move mode
//! 6. Push reference updates and removals back to the project
//!
//! A failed upload only skips that file. Every other error fails the cycle
//! and is returned to the caller.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncConfig, SyncCoordinator};
//!
//! let coordinator = SyncCoordinator::new(SyncConfig::from_config(&config), backend);
//! let report = coordinator.run_cycle(vcs.as_ref()).await?;
//! println!("Migrated {} files", report.migrations.len());
//! ```

use bridge_traits::storage::StorageBackend;
use bridge_traits::vcs::{ChangeSet, FileChangeRecord, VersionControl};
use core_runtime::config::{MediaSyncConfig, OperationMode, ReferenceSpec};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::cycle::{CycleReport, CycleState, MigrationMap, SyncCycle};
use crate::references::{is_safe_reference_value, ReferenceRewriter};
use crate::selector::ChangeSelector;
use crate::{Result, SyncError};

/// Settings the coordinator needs from the full configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// `<namespace>/<name>` of the Mergin project.
    pub project_name: String,
    pub working_dir: PathBuf,
    pub operation_mode: OperationMode,
    pub allowed_extensions: Vec<String>,
    /// Plain string prefix selected paths must start with.
    pub base_path: Option<String>,
    pub references: Vec<ReferenceSpec>,
    pub spatial_extension: Option<String>,
}

impl SyncConfig {
    pub fn from_config(config: &MediaSyncConfig) -> Self {
        Self {
            project_name: config.mergin.project_name.clone(),
            working_dir: config.project_working_dir.clone(),
            operation_mode: config.operation_mode,
            allowed_extensions: config.allowed_extensions.clone(),
            base_path: config.base_path.clone(),
            references: config.references.clone(),
            spatial_extension: config.spatial_extension.clone(),
        }
    }
}

/// Orchestrates sync cycles against one working directory
pub struct SyncCoordinator {
    config: SyncConfig,
    backend: Arc<dyn StorageBackend>,
    selector: ChangeSelector,
    rewriter: ReferenceRewriter,
}

impl SyncCoordinator {
    pub fn new(config: SyncConfig, backend: Arc<dyn StorageBackend>) -> Self {
        let selector =
            ChangeSelector::new(config.allowed_extensions.clone(), config.base_path.clone());
        let rewriter = ReferenceRewriter::new(
            &config.working_dir,
            config.references.clone(),
            config.spatial_extension.clone(),
        );
        Self {
            config,
            backend,
            selector,
            rewriter,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether the working directory still has to be downloaded.
    pub fn needs_bootstrap(&self) -> bool {
        !self.config.working_dir.exists()
    }

    /// Run one full cycle.
    #[instrument(skip(self, vcs), fields(project = %self.config.project_name, backend = %self.backend.kind()))]
    pub async fn run_cycle(&self, vcs: &dyn VersionControl) -> Result<CycleReport> {
        let mut cycle = SyncCycle::new();
        match self.drive(&mut cycle, vcs).await {
            Ok(()) => {
                let report = cycle.finish();
                info!(
                    migrated = report.migrations.len(),
                    skipped = report.skipped,
                    failed = report.failed,
                    pushed = report.pushed_version.as_deref().unwrap_or("-"),
                    "Sync cycle finished"
                );
                Ok(report)
            }
            Err(e) => {
                let state = cycle.state();
                cycle.fail();
                error!(%state, error = %e, "Sync cycle failed");
                Err(e)
            }
        }
    }

    async fn drive(&self, cycle: &mut SyncCycle, vcs: &dyn VersionControl) -> Result<()> {
        cycle.advance(CycleState::Fetching)?;
        let candidates = match self.fetch(vcs).await? {
            Some(candidates) => candidates,
            None => return cycle.advance(CycleState::Done),
        };

        cycle.advance(CycleState::Selecting)?;
        let selected = self.selector.select(&candidates);
        cycle.report_mut().selected = selected.len();
        if selected.is_empty() {
            info!("No files to sync");
            return cycle.advance(CycleState::Done);
        }

        cycle.advance(CycleState::Transferring)?;
        self.check_working_dir(vcs)?;
        self.transfer(&selected, cycle.report_mut()).await?;

        cycle.advance(CycleState::Rewriting)?;
        let migrations = &cycle.report().migrations;
        self.rewriter
            .rewrite(migrations, self.config.operation_mode)
            .await?;
        if self.config.operation_mode == OperationMode::Move {
            self.remove_migrated(migrations).await?;
        }

        cycle.advance(CycleState::PushingBack)?;
        cycle.report_mut().pushed_version = self.push_back(vcs).await?;

        cycle.advance(CycleState::Done)
    }

    /// Candidate records, or `None` when the server has nothing new.
    async fn fetch(&self, vcs: &dyn VersionControl) -> Result<Option<Vec<FileChangeRecord>>> {
        let dir = &self.config.working_dir;

        if !dir.exists() {
            info!("Downloading project from Mergin server ...");
            let project = vcs.download(&self.config.project_name, dir).await?;
            info!(version = %project.version, "Downloaded project from Mergin");
            return Ok(Some(project.files));
        }

        info!("Pulling from Mergin server ...");
        self.check_working_dir(vcs)?;
        self.ensure_no_pending_changes(vcs).await?;

        let local_version = vcs.local_version(dir).await?;
        let server = vcs.project_info(&self.config.project_name).await?;
        if server.version == local_version {
            info!(version = %local_version, "No changes on Mergin");
            return Ok(None);
        }

        let incoming = vcs.pull_changes(dir, &server).await?;
        self.ensure_no_pending_changes(vcs).await?;
        let version = vcs.pull(dir).await?;
        info!(%version, "Pulled new version from Mergin");

        Ok(Some(incoming.incoming()))
    }

    fn check_working_dir(&self, vcs: &dyn VersionControl) -> Result<()> {
        let dir = &self.config.working_dir;
        if !dir.exists() {
            return Err(SyncError::MissingWorkingDir(dir.display().to_string()));
        }
        if !vcs.has_working_copy(dir) {
            return Err(SyncError::NotAProject(dir.display().to_string()));
        }
        Ok(())
    }

    async fn ensure_no_pending_changes(&self, vcs: &dyn VersionControl) -> Result<()> {
        let changes = vcs.pending_changes(&self.config.working_dir).await?;
        if !changes.is_empty() {
            return Err(SyncError::PendingChanges(describe(&changes)));
        }
        Ok(())
    }

    async fn transfer(&self, selected: &[FileChangeRecord], report: &mut CycleReport) -> Result<()> {
        info!(files = selected.len(), "Synchronizing files with external drive...");

        let check_references = self.rewriter.is_configured();

        for record in selected {
            if check_references && !is_safe_reference_value(&record.path) {
                warn!(path = %record.path, "Skipping file with a quote in its path");
                report.skipped += 1;
                continue;
            }

            let source = local_path(&self.config.working_dir, &record.path);
            let metadata = match tokio::fs::metadata(&source).await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => {
                    warn!(path = %record.path, "Missing local file");
                    report.skipped += 1;
                    continue;
                }
            };

            info!(
                path = %record.path,
                "Uploading {} of size {:.2} MB",
                record.path,
                metadata.len() as f64 / 1024.0 / 1024.0
            );
            match self.backend.upload(&source, &record.path).await {
                Ok(locator) if check_references && !is_safe_reference_value(&locator) => {
                    warn!(path = %record.path, %locator, "Uploaded location contains a quote, reference left unchanged");
                    report.skipped += 1;
                }
                Ok(locator) => {
                    debug!(path = %record.path, %locator, "Uploaded");
                    report.migrations.insert(record.path.clone(), locator);
                }
                Err(e) => {
                    warn!(path = %record.path, error = %e, "Failed to upload {}", record.path);
                    report.failed += 1;
                }
            }
        }

        Ok(())
    }

    async fn remove_migrated(&self, migrations: &MigrationMap) -> Result<()> {
        for path in migrations.paths() {
            tokio::fs::remove_file(local_path(&self.config.working_dir, path)).await?;
            debug!(%path, "Removed local file");
        }
        Ok(())
    }

    /// Push updated references and removed files; returns the new version.
    async fn push_back(&self, vcs: &dyn VersionControl) -> Result<Option<String>> {
        let dir = &self.config.working_dir;
        let changes = vcs.pending_changes(dir).await?;

        if !changes.added.is_empty() {
            return Err(SyncError::UnexpectedAdditions(
                changes.added.iter().map(|r| r.path.clone()).collect(),
            ));
        }
        if changes.updated.is_empty() && changes.removed.is_empty() {
            debug!("Nothing to push");
            return Ok(None);
        }

        let version = vcs.push(dir).await?;
        info!(%version, "Pushed new version to Mergin");
        Ok(Some(version))
    }
}

/// Absolute path of a `/`-separated project path
fn local_path(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

fn describe(changes: &ChangeSet) -> String {
    let list = |records: &[FileChangeRecord]| {
        records
            .iter()
            .map(|r| r.path.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "added: [{}], updated: [{}], removed: [{}]",
        list(&changes.added),
        list(&changes.updated),
        list(&changes.removed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path_joins_segments() {
        assert_eq!(
            local_path(Path::new("/work"), "images/img2.jpg"),
            PathBuf::from("/work/images/img2.jpg")
        );
    }

    #[test]
    fn test_describe_changes() {
        let changes = ChangeSet {
            added: vec![FileChangeRecord::new("new.png")],
            updated: vec![FileChangeRecord::new("a.gpkg"), FileChangeRecord::new("b.gpkg")],
            removed: vec![],
        };
        assert_eq!(
            describe(&changes),
            "added: [new.png], updated: [a.gpkg, b.gpkg], removed: []"
        );
    }
}
