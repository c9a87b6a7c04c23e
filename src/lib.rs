//! Semantic Loader - schema-driven bulk loading with integrity verification
//!
//! Provides:
//! - Parsing of semantic schema documents into table definitions
//! - Create-or-replace DDL rendering per SQL dialect
//! - Matching of split source files to tables
//! - Column reconciliation and type coercion of source records
//! - Bulk loading into a destination store
//! - Post-load row count and duplicate verification
//! - A pipeline that runs all of the above and reports on it

pub mod config;
pub mod database;
pub mod export;
pub mod import;
pub mod ingest;
pub mod mapping;
pub mod models;
pub mod pipeline;
pub mod provision;
pub mod validation;
pub mod verify;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export commonly used types
pub use config::{ConfigError, LoaderConfig};
#[cfg(feature = "duckdb-backend")]
pub use database::DuckDBBackend;
pub use database::{DatabaseBackend, DatabaseError, DatabaseResult, QueryResult};
pub use export::{DdlExporter, ExportError, ExportResult, TableDdl};
pub use import::{SchemaDefinitionParser, SchemaParseError};
pub use ingest::{BulkLoader, DiscoveryReport, FileDiscovery, IngestError, Inventory, LoadResult};
pub use mapping::{ColumnReconciler, TypeCoercer};
pub use pipeline::{PipelineError, PipelineOrchestrator, PipelineReport, PipelineState};
#[cfg(feature = "duckdb-backend")]
pub use pipeline::run_pipeline;
pub use provision::{ProvisionOutcome, ProvisionStatus, TableProvisioner};
pub use verify::{IntegrityStatus, IntegrityVerifier, VerificationReport};

// Re-export models
pub use models::enums::*;
pub use models::{CellValue, ColumnDefinition, RowBatch, SchemaDefinition, TableSchema};
