//! Post-load integrity verification
//!
//! Local row totals are recounted from the source files every time, never
//! taken from the loader's results. Destination row and duplicate counts are
//! queried per table. Verification only reads; it can be re-run at will.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::LoaderConfig;
use crate::database::{DatabaseBackend, OutputFormat, QueryResult, format_query_result};
use crate::ingest::reader::count_records;
use crate::ingest::{DiscoveryReport, IngestError, LoadResult};
use crate::models::{SchemaDefinition, TableSchema};

mod status;

pub use status::{IntegrityStatus, classify};

/// Verification of one table
#[derive(Debug, Clone, Serialize)]
pub struct TableVerification {
    pub table: String,
    /// Records in the source files currently on disk
    pub local_count: Option<u64>,
    pub destination_count: Option<u64>,
    /// Rows minus distinct key tuples
    pub duplicate_count: Option<u64>,
    pub key_columns: Vec<String>,
    /// False when the whole row served as the key
    pub key_declared: bool,
    pub status: IntegrityStatus,
    /// Rows the loader reported committing, when a load ran
    pub loaded_rows: Option<u64>,
    /// The loader's total differs from the destination count
    pub load_undercount: bool,
    pub sample: Option<QueryResult>,
    pub errors: Vec<String>,
}

/// Totals across tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationSummary {
    pub total_tables: usize,
    pub perfect: usize,
    pub duplicates_found: usize,
    pub count_mismatch: usize,
    pub unknown: usize,
    pub local_rows: u64,
    pub destination_rows: u64,
    pub duplicate_rows: u64,
}

impl VerificationSummary {
    fn from_tables(tables: &[TableVerification]) -> Self {
        let mut summary = Self {
            total_tables: tables.len(),
            ..Default::default()
        };
        for table in tables {
            match table.status {
                IntegrityStatus::Perfect => summary.perfect += 1,
                IntegrityStatus::DuplicatesFound => summary.duplicates_found += 1,
                IntegrityStatus::CountMismatch => summary.count_mismatch += 1,
                IntegrityStatus::Unknown => summary.unknown += 1,
            }
            summary.local_rows += table.local_count.unwrap_or(0);
            summary.destination_rows += table.destination_count.unwrap_or(0);
            summary.duplicate_rows += table.duplicate_count.unwrap_or(0);
        }
        summary
    }
}

/// Integrity of every table of a schema
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub verified_at: DateTime<Utc>,
    pub tables: Vec<TableVerification>,
    pub summary: VerificationSummary,
}

impl VerificationReport {
    pub fn new(tables: Vec<TableVerification>) -> Self {
        Self {
            verified_at: Utc::now(),
            summary: VerificationSummary::from_tables(&tables),
            tables,
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableVerification> {
        self.tables
            .iter()
            .find(|t| t.table.eq_ignore_ascii_case(name))
    }

    pub fn all_perfect(&self) -> bool {
        self.tables.iter().all(|t| t.status.is_perfect())
    }

    /// One row per table, for display
    pub fn to_query_result(&self) -> QueryResult {
        let count = |c: Option<u64>| c.map(serde_json::Value::from).unwrap_or(serde_json::Value::Null);
        QueryResult::new(
            ["table", "local", "destination", "duplicates", "status"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            self.tables
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "table": t.table,
                        "local": count(t.local_count),
                        "destination": count(t.destination_count),
                        "duplicates": count(t.duplicate_count),
                        "status": t.status.as_str(),
                    })
                })
                .collect(),
        )
    }

    pub fn render_text(&self) -> String {
        let mut out = format_query_result(&self.to_query_result(), OutputFormat::Table);
        for table in &self.tables {
            for e in &table.errors {
                out.push_str(&format!("\n{}: {}", table.table, e));
            }
            if table.load_undercount {
                out.push_str(&format!(
                    "\n{}: loader committed {} rows but the destination holds {}",
                    table.table,
                    table.loaded_rows.unwrap_or(0),
                    table.destination_count.unwrap_or(0)
                ));
            }
        }
        out.push_str(&format!(
            "\n{}/{} tables PERFECT",
            self.summary.perfect, self.summary.total_tables
        ));
        out
    }
}

/// Recounts sources and checks the destination
#[derive(Debug, Clone)]
pub struct IntegrityVerifier {
    delimiter: u8,
    sample_rows: usize,
}

impl Default for IntegrityVerifier {
    fn default() -> Self {
        Self {
            delimiter: b',',
            sample_rows: 0,
        }
    }
}

impl IntegrityVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LoaderConfig) -> Self {
        Self::new()
            .with_delimiter(config.source.delimiter_byte().unwrap_or(b','))
            .with_sample_rows(config.load.sample_rows)
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Rows sampled per table; 0 disables sampling
    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows;
        self
    }

    /// Total records across files, or `None` if any file cannot be opened
    ///
    /// Files that open but do not parse are counted as far as they can be
    /// framed.
    pub fn local_count(&self, files: &[PathBuf]) -> (Option<u64>, Vec<String>) {
        let mut total = Some(0u64);
        let mut errors = Vec::new();
        for path in files {
            match count_records(path, self.delimiter) {
                Ok(count) => total = total.map(|t| t + count),
                Err(e @ IngestError::Io { .. }) => {
                    error!("Cannot count {}: {}", path.display(), e);
                    errors.push(format!("Local count failed: {}", e));
                    total = None;
                }
                Err(e) => {
                    warn!("Partial count for {}: {}", path.display(), e);
                    errors.push(format!("Local count incomplete: {}", e));
                }
            }
        }
        (total, errors)
    }

    /// Verify one table
    pub async fn verify_table<B: DatabaseBackend + ?Sized>(
        &self,
        backend: &B,
        table: &TableSchema,
        files: &[PathBuf],
        load: Option<&LoadResult>,
    ) -> TableVerification {
        let (local_count, mut errors) = self.local_count(files);
        let key_columns = table.duplicate_key_columns();

        let destination_count = match backend.count_rows(&table.name).await {
            Ok(count) => Some(count),
            Err(e) => {
                error!("Row count for {} failed: {}", table.name, e);
                errors.push(format!("Destination count failed: {}", e));
                None
            }
        };

        let duplicate_count = match backend.count_duplicates(&table.name, &key_columns).await {
            Ok(count) => Some(count),
            Err(e) => {
                error!("Duplicate check for {} failed: {}", table.name, e);
                errors.push(format!("Duplicate check failed: {}", e));
                None
            }
        };

        let sample = if self.sample_rows > 0 && destination_count.is_some() {
            match backend.sample_rows(&table.name, self.sample_rows).await {
                Ok(rows) => Some(rows),
                Err(e) => {
                    warn!("Sampling {} failed: {}", table.name, e);
                    None
                }
            }
        } else {
            None
        };

        let loaded_rows = load.map(|l| l.rows_loaded);
        let load_undercount = matches!(
            (loaded_rows, destination_count),
            (Some(loaded), Some(destination)) if loaded != destination
        );

        let status = classify(local_count, destination_count, duplicate_count);
        info!(
            "{}: local={:?} destination={:?} duplicates={:?} -> {}",
            table.name, local_count, destination_count, duplicate_count, status
        );

        TableVerification {
            table: table.name.clone(),
            local_count,
            destination_count,
            duplicate_count,
            key_columns,
            key_declared: table.has_key(),
            status,
            loaded_rows,
            load_undercount,
            sample,
            errors,
        }
    }

    /// Verify every table of a schema
    ///
    /// `loads` may be empty when no load ran in this process.
    pub async fn verify<B: DatabaseBackend + ?Sized>(
        &self,
        backend: &B,
        schema: &SchemaDefinition,
        discovery: &DiscoveryReport,
        loads: &[LoadResult],
    ) -> VerificationReport {
        let mut tables = Vec::with_capacity(schema.tables.len());
        for table in &schema.tables {
            let load = loads
                .iter()
                .find(|l| l.table.eq_ignore_ascii_case(&table.name));
            tables.push(
                self.verify_table(backend, table, discovery.files_for(&table.name), load)
                    .await,
            );
        }
        VerificationReport::new(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn verification(table: &str, status: IntegrityStatus) -> TableVerification {
        TableVerification {
            table: table.to_string(),
            local_count: Some(2),
            destination_count: Some(2),
            duplicate_count: Some(0),
            key_columns: vec!["ID".to_string()],
            key_declared: true,
            status,
            loaded_rows: None,
            load_undercount: false,
            sample: None,
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_local_count_sums_files() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        fs::write(&a, "id\n1\n2\n").unwrap();
        fs::write(&b, "id,x\n3\n4,5,6\n").unwrap();

        let verifier = IntegrityVerifier::new();
        assert_eq!(verifier.local_count(&[a.clone(), b]).0, Some(4));
        assert_eq!(verifier.local_count(&[]).0, Some(0));

        let (total, errors) = verifier.local_count(&[a, dir.path().join("gone.csv")]);
        assert_eq!(total, None);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_report_summary() {
        let report = VerificationReport::new(vec![
            verification("A", IntegrityStatus::Perfect),
            verification("B", IntegrityStatus::DuplicatesFound),
        ]);
        assert!(!report.all_perfect());
        assert_eq!(report.summary.perfect, 1);
        assert_eq!(report.summary.duplicates_found, 1);
        assert_eq!(report.summary.local_rows, 4);
        assert!(report.table("b").is_some());
        assert!(report.render_text().ends_with("1/2 tables PERFECT"));
    }
}
