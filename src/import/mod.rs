//! Import functionality
//!
//! Parses declarative schema documents into the in-memory
//! [`SchemaDefinition`](crate::models::SchemaDefinition) model. Two table
//! shapes are accepted, flat `columns` and role-based
//! `dimensions`/`time_dimensions`/`facts`; see [`semantic`] for how each
//! table entry's shape is resolved.

pub mod semantic;

pub use semantic::SchemaDefinitionParser;

/// Error raised when a schema document cannot be turned into a model
///
/// Any of these aborts a pipeline run before DDL or load work starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum SchemaParseError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Malformed schema document: {0}")]
    Malformed(String),
    #[error("Schema document declares no tables")]
    MissingTables,
    #[error("Table entry #{index} has no name")]
    MissingTableName { index: usize },
    #[error("Table '{table}' declares no columns")]
    EmptyTable { table: String },
    #[error("Column #{index} of table '{table}' has no name")]
    MissingColumnName { table: String, index: usize },
    #[error("Table '{table}' is declared more than once")]
    DuplicateTable { table: String },
    #[error("Column '{column}' is declared more than once in table '{table}'")]
    DuplicateColumn { table: String, column: String },
    #[error("Key column '{column}' is not a column of table '{table}'")]
    UnknownKeyColumn { table: String, column: String },
    #[error("Unrecognized data type '{data_type}' for column '{table}.{column}'")]
    UnknownDataType {
        table: String,
        column: String,
        data_type: String,
    },
}

/// Result type for schema parsing
pub type SchemaParseResult<T> = Result<T, SchemaParseError>;
