//! Source file ingestion
//!
//! - [`discovery`]: finds source files and buckets them by table
//! - [`reader`]: reads delimited and JSON files into text cells
//! - [`loader`]: reconciles, coerces and bulk-inserts each file
//! - [`inventory`]: read-only survey of the source directory

use std::path::PathBuf;

use crate::database::DatabaseError;
use crate::mapping::CoercionFailure;

pub mod discovery;
pub mod inventory;
pub mod loader;
pub mod reader;

pub use discovery::{
    DiscoveryConflict, DiscoveryReport, FileDiscovery, FileMatch, FileRule, RuleSource, RuleTable,
    SourceFileGroup,
};
pub use inventory::{Inventory, InventoryEntry, TableInventory};
pub use loader::{BulkLoader, FileOutcome, LoadResult};
pub use reader::{SourceFormat, SourceTable};

/// Errors reading or loading a single source file
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error in {} at record {record}: {message}", .path.display())]
    Json {
        path: PathBuf,
        record: usize,
        message: String,
    },

    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid file pattern: {0}")]
    InvalidPattern(String),

    /// Only raised in strict mode
    #[error("Coercion failed: {0}")]
    Coercion(#[from] CoercionFailure),

    #[error("Insert into {table} failed: {source}")]
    Insert {
        table: String,
        #[source]
        source: DatabaseError,
    },
}
