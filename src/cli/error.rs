//! CLI-specific error types

use crate::config::ConfigError;
use crate::export::ExportError;
use crate::import::SchemaParseError;
use crate::ingest::IngestError;
use crate::pipeline::PipelineError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to write file {0}: {1}")]
    FileWriteError(PathBuf, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Schema error: {0}")]
    SchemaError(#[from] SchemaParseError),

    #[error("Export error: {0}")]
    ExportError(#[from] ExportError),

    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),

    #[error("Pipeline failed: {0}")]
    PipelineError(#[from] PipelineError),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("{0} table(s) did not verify as PERFECT")]
    IssuesFound(usize),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::IssuesFound(_) => 2,
            _ => 1,
        }
    }
}
