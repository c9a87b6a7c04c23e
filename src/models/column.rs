//! Column model for the schema

use super::enums::{Aggregation, DataType, SemanticRole};
use serde::{Deserialize, Serialize};

/// Column definition inside a [`TableSchema`](super::TableSchema)
///
/// Columns of flat tables carry no semantic role. Columns of semantic tables
/// carry the role of the collection they were declared in.
///
/// # Example
///
/// ```rust
/// use semantic_loader::models::{ColumnDefinition, DataType, SemanticRole};
///
/// let column = ColumnDefinition::with_role("view_count", SemanticRole::Fact);
/// assert_eq!(column.name, "VIEW_COUNT");
/// assert_eq!(column.data_type, DataType::Float);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDefinition {
    /// Canonical (uppercased) column name
    pub name: String,
    /// Semantic role, `None` for columns of flat tables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<SemanticRole>,
    /// Resolved column type
    pub data_type: DataType,
    /// Type spelling as written in the schema document, when one was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
    /// Whether the column allows NULL values (default: true)
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Column description
    #[serde(default)]
    pub description: String,
    /// Default aggregation, only set for facts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_aggregation: Option<Aggregation>,
    /// Natural-language synonyms
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Source expression for derived columns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ColumnDefinition {
    /// Create a role-less column with the given type
    pub fn new(name: impl AsRef<str>, data_type: DataType) -> Self {
        Self {
            name: name.as_ref().trim().to_uppercase(),
            role: None,
            data_type,
            declared_type: None,
            nullable: true,
            description: String::new(),
            default_aggregation: None,
            synonyms: Vec::new(),
            expr: None,
        }
    }

    /// Create a column of a semantic role, typed by the role's default
    pub fn with_role(name: impl AsRef<str>, role: SemanticRole) -> Self {
        let mut column = Self::new(name, role.default_data_type());
        column.role = Some(role);
        if role == SemanticRole::Fact {
            column.default_aggregation = Some(Aggregation::default());
        }
        column
    }

    pub fn is_fact(&self) -> bool {
        self.role == Some(SemanticRole::Fact)
    }
}
