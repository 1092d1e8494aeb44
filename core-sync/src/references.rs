//! # Reference Rewriter
//!
//! Points reference rows inside the project's GeoPackage files at the
//! external locators of migrated media files.
//!
//! Every database file is updated inside one transaction: all rows of a
//! cycle are committed together, or none are. Table and column names come
//! from configuration and are quoted; paths and locators are bound as
//! parameters.

use core_runtime::config::{OperationMode, ReferenceSpec};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::Connection;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

use crate::cycle::MigrationMap;
use crate::Result;

/// SQL string delimiter; values containing it are never written.
const STRING_DELIMITER: char = '\'';

/// Whether `value` may be stored in a reference column.
pub fn is_safe_reference_value(value: &str) -> bool {
    !value.contains(STRING_DELIMITER)
}

/// Quote an SQL identifier, doubling embedded quotes.
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// `UPDATE` statement for one reference spec; binds `(locator, path)`.
pub fn update_statement(spec: &ReferenceSpec, mode: OperationMode) -> String {
    let table = quote_identifier(&spec.table);
    let external = quote_identifier(&spec.driver_path_column);
    let local = quote_identifier(&spec.local_path_column);

    match mode {
        OperationMode::Copy => format!(
            "UPDATE {} SET {} = ? WHERE {} = ?",
            table, external, local
        ),
        OperationMode::Move => format!(
            "UPDATE {} SET {} = ?, {} = NULL WHERE {} = ?",
            table, external, local, local
        ),
    }
}

/// Specs grouped by database file, in configuration order.
fn group_by_file(references: &[ReferenceSpec]) -> Vec<(&str, Vec<&ReferenceSpec>)> {
    let mut groups: Vec<(&str, Vec<&ReferenceSpec>)> = Vec::new();
    for spec in references {
        match groups.iter_mut().find(|(file, _)| *file == spec.file) {
            Some((_, specs)) => specs.push(spec),
            None => groups.push((spec.file.as_str(), vec![spec])),
        }
    }
    groups
}

pub struct ReferenceRewriter {
    root: PathBuf,
    references: Vec<ReferenceSpec>,
    spatial_extension: Option<String>,
}

impl ReferenceRewriter {
    /// `root` is the project working directory reference database paths are relative to.
    pub fn new(
        root: impl Into<PathBuf>,
        references: Vec<ReferenceSpec>,
        spatial_extension: Option<String>,
    ) -> Self {
        Self {
            root: root.into(),
            references,
            spatial_extension,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.references.is_empty()
    }

    /// Apply `migrations` to every configured reference table.
    ///
    /// Returns the number of updated rows. Stops at the first failing
    /// database file; files already processed stay committed.
    #[instrument(skip(self, migrations), fields(files = migrations.len()))]
    pub async fn rewrite(&self, migrations: &MigrationMap, mode: OperationMode) -> Result<u64> {
        if !self.is_configured() || migrations.is_empty() {
            debug!("No references to update");
            return Ok(0);
        }

        info!("Updating references ...");
        let mut total = 0;
        for (file, specs) in group_by_file(&self.references) {
            total += self.rewrite_file(file, &specs, migrations, mode).await?;
        }
        Ok(total)
    }

    async fn rewrite_file(
        &self,
        file: &str,
        specs: &[&ReferenceSpec],
        migrations: &MigrationMap,
        mode: OperationMode,
    ) -> Result<u64> {
        let path = self.root.join(file);
        let mut options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(false)
            .journal_mode(SqliteJournalMode::Delete);
        if let Some(extension) = &self.spatial_extension {
            options = options.extension(extension.clone());
        }

        let mut conn = SqliteConnection::connect_with(&options).await?;
        let statements: Vec<String> = specs.iter().map(|spec| update_statement(spec, mode)).collect();

        // Dropping the transaction on error rolls it back.
        let mut tx = conn.begin().await?;
        let mut updated = 0;
        for (original, locator) in migrations.iter() {
            for statement in &statements {
                let result = sqlx::query(statement)
                    .bind(locator)
                    .bind(original)
                    .execute(&mut *tx)
                    .await?;
                updated += result.rows_affected();
            }
        }
        tx.commit().await?;
        conn.close().await?;

        info!(database = %file, rows = updated, "References updated");
        Ok(updated)
    }
}
