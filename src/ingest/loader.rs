//! Bulk loading of discovered source files
//!
//! Groups are loaded one table at a time and files within a group in path
//! order. Each file is read whole, reconciled against the table's columns,
//! coerced, and inserted as one atomic batch. A failing file is recorded and
//! skipped; it never aborts its group.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::discovery::DiscoveryReport;
use super::reader::read_file;
use super::IngestError;
use crate::config::LoaderConfig;
use crate::database::DatabaseBackend;
use crate::mapping::{CoercionRules, ColumnReconciler, TypeCoercer};
use crate::models::{SchemaDefinition, TableSchema};

/// Warnings kept per table; further ones are only counted
const MAX_WARNINGS: usize = 100;

/// Outcome of loading one file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub rows_read: u64,
    pub rows_committed: u64,
    /// Values that could not be coerced and were loaded as NULL
    pub coercion_failures: usize,
    /// Reconciled headers that are not columns of the table
    pub unknown_columns: Vec<String>,
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-table load summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadResult {
    pub table: String,
    /// Rows committed across every file of the table
    pub rows_loaded: u64,
    pub files_attempted: usize,
    pub files_failed: usize,
    /// The table was truncated before loading
    pub cleared: bool,
    pub files: Vec<FileOutcome>,
    pub warnings: Vec<String>,
    pub warnings_count: usize,
    /// Set when the whole group was skipped
    pub error: Option<String>,
    #[serde(skip)]
    pub duration: Duration,
}

impl LoadResult {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Add a warning (limited to 100)
    pub fn add_warning(&mut self, warning: String) {
        self.warnings_count += 1;
        if self.warnings.len() < MAX_WARNINGS {
            self.warnings.push(warning);
        }
    }

    fn record(&mut self, outcome: FileOutcome) {
        self.files_attempted += 1;
        if outcome.succeeded() {
            self.rows_loaded += outcome.rows_committed;
        } else {
            self.files_failed += 1;
        }
        self.files.push(outcome);
    }

    /// No file failed and the group was not skipped
    pub fn is_clean(&self) -> bool {
        self.files_failed == 0 && self.error.is_none()
    }

    /// Rows per second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.rows_loaded as f64 / secs
        }
    }

    /// Format duration as human-readable string
    pub fn duration_string(&self) -> String {
        let secs = self.duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}

/// Loads source file groups into the destination
#[derive(Debug, Clone)]
pub struct BulkLoader {
    reconciler: ColumnReconciler,
    coercer: TypeCoercer,
    delimiter: u8,
    clear_existing: bool,
}

impl BulkLoader {
    pub fn new(reconciler: ColumnReconciler, coercer: TypeCoercer) -> Self {
        Self {
            reconciler,
            coercer,
            delimiter: b',',
            clear_existing: false,
        }
    }

    /// Build the reconciler, coercer and run mode from configuration
    pub fn from_config(config: &LoaderConfig) -> Self {
        let coercer = TypeCoercer::new(
            CoercionRules::from_section(&config.coercion),
            config.strict_mode(),
        );
        Self::new(ColumnReconciler::from_config(config), coercer)
            .with_delimiter(config.source.delimiter_byte().unwrap_or(b','))
            .with_clear_existing(config.load.clear_existing)
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Truncate each table before loading it instead of appending
    pub fn with_clear_existing(mut self, clear_existing: bool) -> Self {
        self.clear_existing = clear_existing;
        self
    }

    pub fn clear_existing(&self) -> bool {
        self.clear_existing
    }

    /// Load every table of a schema from a discovery report
    ///
    /// Tables with no files still get a result (and are still truncated in
    /// clear-existing mode).
    pub async fn load_all<B: DatabaseBackend + ?Sized>(
        &self,
        backend: &B,
        schema: &SchemaDefinition,
        discovery: &DiscoveryReport,
    ) -> Vec<LoadResult> {
        let mut results = Vec::with_capacity(schema.tables.len());
        for table in &schema.tables {
            results.push(
                self.load_group(backend, table, discovery.files_for(&table.name))
                    .await,
            );
        }
        results
    }

    /// Load one table's files in the given order
    pub async fn load_group<B: DatabaseBackend + ?Sized>(
        &self,
        backend: &B,
        table: &TableSchema,
        files: &[PathBuf],
    ) -> LoadResult {
        let start = Instant::now();
        let mut result = LoadResult::new(&table.name);

        if self.clear_existing {
            match backend.truncate_table(&table.name).await {
                Ok(()) => {
                    info!("Cleared existing rows from {}", table.name);
                    result.cleared = true;
                }
                Err(e) => {
                    error!(
                        "Could not clear {}; skipping its {} file(s): {}",
                        table.name,
                        files.len(),
                        e
                    );
                    result.error = Some(format!("Truncate failed: {}", e));
                    result.duration = start.elapsed();
                    return result;
                }
            }
        }

        if files.is_empty() {
            warn!("No source files for {}", table.name);
            result.add_warning(format!("No source files found for table {}", table.name));
        }

        for path in files {
            let outcome = self.load_file(backend, table, path).await;
            if let Some(e) = &outcome.error {
                error!("Skipping {}: {}", path.display(), e);
            } else if outcome.coercion_failures > 0 {
                let warning = format!(
                    "{}: {} value(s) could not be coerced and were loaded as NULL",
                    path.display(),
                    outcome.coercion_failures
                );
                warn!("{}", warning);
                result.add_warning(warning);
            }
            if !outcome.unknown_columns.is_empty() {
                result.add_warning(format!(
                    "{}: columns {:?} are not part of {} and were added as text",
                    path.display(),
                    outcome.unknown_columns,
                    table.name
                ));
            }
            result.record(outcome);
        }

        result.duration = start.elapsed();
        info!(
            "Loaded {} rows into {} from {}/{} file(s) in {}",
            result.rows_loaded,
            table.name,
            result.files_attempted - result.files_failed,
            result.files_attempted,
            result.duration_string()
        );
        result
    }

    /// Load one file; failures are recorded on the outcome
    pub async fn load_file<B: DatabaseBackend + ?Sized>(
        &self,
        backend: &B,
        table: &TableSchema,
        path: &Path,
    ) -> FileOutcome {
        let mut outcome = FileOutcome::new(path);
        if let Err(e) = self.try_load_file(backend, table, path, &mut outcome).await {
            outcome.rows_committed = 0;
            outcome.error = Some(e.to_string());
        }
        outcome
    }

    async fn try_load_file<B: DatabaseBackend + ?Sized>(
        &self,
        backend: &B,
        table: &TableSchema,
        path: &Path,
        outcome: &mut FileOutcome,
    ) -> Result<(), IngestError> {
        let source = read_file(path, self.delimiter)?;
        outcome.rows_read = source.len() as u64;
        debug!(
            "Read {} rows from {} for {}",
            outcome.rows_read,
            path.display(),
            table.name
        );

        let headers = self.reconciler.reconcile(&source.headers, table);
        outcome.unknown_columns = headers.unknown.clone();
        let rows = source.project(&headers.selected);

        let (batch, report) = self.coercer.coerce_batch(table, headers.columns, rows)?;
        outcome.coercion_failures = report.failures;

        if !headers.unknown.is_empty() {
            warn!(
                "Adding columns {:?} from {} to {}",
                headers.unknown,
                path.display(),
                table.name
            );
            backend
                .add_columns(&table.name, &headers.unknown)
                .await
                .map_err(|source| IngestError::Insert {
                    table: table.name.clone(),
                    source,
                })?;
        }

        outcome.rows_committed = backend
            .bulk_insert(&table.name, &batch)
            .await
            .map_err(|source| IngestError::Insert {
                table: table.name.clone(),
                source,
            })?;
        Ok(())
    }
}
