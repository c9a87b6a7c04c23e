//! Table model for the schema

use super::column::ColumnDefinition;
use super::enums::SemanticRole;
use serde::{Deserialize, Serialize};

/// Shape a table entry was declared in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableShape {
    /// Plain `columns` list without roles
    #[default]
    Flat,
    /// Separate `dimensions`, `time_dimensions` and `facts` collections
    Semantic,
}

/// Physical table derived from the schema document
///
/// Built once at parse time and not mutated afterwards; key overrides from
/// configuration are applied before the schema is handed to other components.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableSchema {
    /// Canonical (uppercased) table name
    pub name: String,
    /// Table description
    #[serde(default)]
    pub description: String,
    /// Ordered columns
    pub columns: Vec<ColumnDefinition>,
    /// Declared primary/unique key, in order
    #[serde(default)]
    pub key: Vec<String>,
    /// Extra filename patterns declared in the schema document
    #[serde(default)]
    pub file_patterns: Vec<String>,
    /// Shape the table was declared in
    #[serde(default)]
    pub shape: TableShape,
}

impl TableSchema {
    /// Create a new, empty table
    ///
    /// # Example
    ///
    /// ```rust
    /// use semantic_loader::models::TableSchema;
    ///
    /// let table = TableSchema::new("anon_views");
    /// assert_eq!(table.name, "ANON_VIEWS");
    /// ```
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().trim().to_uppercase(),
            description: String::new(),
            columns: Vec::new(),
            key: Vec::new(),
            file_patterns: Vec::new(),
            shape: TableShape::Flat,
        }
    }

    /// Builder-style column append
    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Builder-style key
    pub fn with_key<S: AsRef<str>>(mut self, key: &[S]) -> Self {
        self.key = key.iter().map(|k| k.as_ref().trim().to_uppercase()).collect();
        self
    }

    /// Find a column by name, case-insensitively
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_key(&self) -> bool {
        !self.key.is_empty()
    }

    /// Columns used to detect duplicate rows
    ///
    /// The declared key, or every column when no key is declared.
    pub fn duplicate_key_columns(&self) -> Vec<String> {
        if self.has_key() {
            self.key.clone()
        } else {
            self.columns.iter().map(|c| c.name.clone()).collect()
        }
    }

    pub fn columns_with_role(&self, role: SemanticRole) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(move |c| c.role == Some(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataType;

    fn views_table() -> TableSchema {
        TableSchema::new("anon_views")
            .with_column(ColumnDefinition::new("app_id", DataType::Varchar(None)))
            .with_column(ColumnDefinition::new("user_id", DataType::Varchar(None)))
            .with_column(ColumnDefinition::with_role(
                "view_time",
                SemanticRole::TimeDimension,
            ))
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        let table = views_table();
        assert!(table.column("User_Id").is_some());
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn test_duplicate_key_falls_back_to_all_columns() {
        let table = views_table();
        assert!(!table.has_key());
        assert_eq!(
            table.duplicate_key_columns(),
            vec!["APP_ID", "USER_ID", "VIEW_TIME"]
        );

        let keyed = views_table().with_key(&["app_id", "user_id"]);
        assert_eq!(keyed.duplicate_key_columns(), vec!["APP_ID", "USER_ID"]);
    }

    #[test]
    fn test_columns_with_role() {
        let table = views_table();
        let times: Vec<_> = table
            .columns_with_role(SemanticRole::TimeDimension)
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(times, vec!["VIEW_TIME"]);
    }
}
