//! Root of the schema model

use super::table::TableSchema;
use serde::{Deserialize, Serialize};

/// Named, versioned collection of tables
///
/// Table names are unique within a definition; the parser rejects documents
/// that declare the same table twice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaDefinition {
    /// Model name
    pub name: String,
    /// Model version, as written in the document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Model description
    #[serde(default)]
    pub description: String,
    /// Tables in declaration order
    pub tables: Vec<TableSchema>,
}

impl SchemaDefinition {
    pub fn new(name: impl Into<String>, tables: Vec<TableSchema>) -> Self {
        Self {
            name: name.into(),
            version: None,
            description: String::new(),
            tables,
        }
    }

    /// Find a table by name, case-insensitively
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Total number of columns across all tables
    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }
}
