//! Source file inventory
//!
//! Read-only survey of a discovered source directory: per-file size,
//! SHA-256 fingerprint, header columns and record count, with per-table
//! totals. Nothing is loaded.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use super::discovery::{DiscoveryConflict, DiscoveryReport};
use super::reader::{count_records, read_headers};
use super::IngestError;

/// One surveyed file
#[derive(Debug, Clone, Default, Serialize)]
pub struct InventoryEntry {
    pub path: PathBuf,
    pub size: u64,
    pub sha256: Option<String>,
    pub columns: Vec<String>,
    pub rows: Option<u64>,
    pub error: Option<String>,
}

impl InventoryEntry {
    /// Survey a single file; failures are recorded on the entry
    pub fn survey(path: &Path, delimiter: u8) -> Self {
        let mut entry = Self {
            path: path.to_path_buf(),
            ..Default::default()
        };

        match fs::read(path) {
            Ok(content) => {
                entry.size = content.len() as u64;
                entry.sha256 = Some(format!("{:x}", Sha256::digest(&content)));
            }
            Err(e) => {
                entry.error = Some(IngestError::Io { path: path.to_path_buf(), source: e }.to_string());
                return entry;
            }
        }

        let counted = read_headers(path, delimiter).and_then(|columns| {
            entry.columns = columns;
            count_records(path, delimiter)
        });
        match counted {
            Ok(rows) => entry.rows = Some(rows),
            Err(e) => {
                warn!("Could not survey {}: {}", path.display(), e);
                entry.error = Some(e.to_string());
            }
        }
        entry
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Surveyed files of one table
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableInventory {
    pub table: String,
    pub files: Vec<InventoryEntry>,
    pub total_rows: u64,
    pub total_bytes: u64,
}

/// Survey of a whole source directory
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    pub source_dir: PathBuf,
    pub tables: Vec<TableInventory>,
    pub unmatched: Vec<PathBuf>,
    pub conflicts: Vec<DiscoveryConflict>,
    /// Every table has at least one readable file and no file is contested
    pub ready: bool,
}

impl Inventory {
    /// Survey every file of a discovery report
    pub fn build(discovery: &DiscoveryReport, delimiter: u8) -> Self {
        let tables: Vec<TableInventory> = discovery
            .groups
            .iter()
            .map(|group| {
                let files: Vec<InventoryEntry> = group
                    .files
                    .iter()
                    .map(|path| InventoryEntry::survey(path, delimiter))
                    .collect();
                TableInventory {
                    table: group.table.clone(),
                    total_rows: files.iter().filter_map(|f| f.rows).sum(),
                    total_bytes: files.iter().map(|f| f.size).sum(),
                    files,
                }
            })
            .collect();

        let ready = !tables.is_empty()
            && discovery.conflicts.is_empty()
            && tables
                .iter()
                .all(|t| !t.files.is_empty() && t.files.iter().all(|f| f.error.is_none()));

        Self {
            source_dir: discovery.source_dir.clone(),
            tables,
            unmatched: discovery.unmatched.clone(),
            conflicts: discovery.conflicts.clone(),
            ready,
        }
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.total_rows).sum()
    }

    pub fn total_files(&self) -> usize {
        self.tables.iter().map(|t| t.files.len()).sum()
    }

    /// Human-readable summary
    pub fn render_text(&self) -> String {
        let mut out = format!("Source directory: {}\n", self.source_dir.display());
        for table in &self.tables {
            out.push_str(&format!(
                "\n{} ({} file(s), {} rows, {:.2} MB)\n",
                table.table,
                table.files.len(),
                table.total_rows,
                table.total_bytes as f64 / (1024.0 * 1024.0)
            ));
            if table.files.is_empty() {
                out.push_str("  no files\n");
            }
            for file in &table.files {
                match (&file.rows, &file.error) {
                    (Some(rows), _) => out.push_str(&format!(
                        "  {}  {} rows  {} bytes  [{}]\n",
                        file.file_name(),
                        rows,
                        file.size,
                        file.columns.join(", ")
                    )),
                    (None, Some(e)) => {
                        out.push_str(&format!("  {}  unreadable: {}\n", file.file_name(), e))
                    }
                    (None, None) => out.push_str(&format!("  {}\n", file.file_name())),
                }
            }
        }
        for path in &self.unmatched {
            out.push_str(&format!("\nUnmatched: {}", path.display()));
        }
        for conflict in &self.conflicts {
            out.push_str(&format!(
                "\nConflict: {} matches {}",
                conflict.file.display(),
                conflict.tables.join(", ")
            ));
        }
        out.push_str(&format!(
            "\n\nTotal: {} file(s), {} rows. {}\n",
            self.total_files(),
            self.total_rows(),
            if self.ready {
                "Ready to load."
            } else {
                "Not ready to load."
            }
        ));
        out
    }
}
