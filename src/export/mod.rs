//! Export functionality
//!
//! Renders the schema model as dialect-specific DDL.

pub mod ddl;

/// Error during export
#[derive(Debug, Clone, PartialEq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum ExportError {
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

pub use ddl::{DdlExporter, TableDdl};
