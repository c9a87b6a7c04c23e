//! Semantic schema document parser.
//!
//! # Document shapes
//!
//! The root is a mapping with `name`, `version`, `description` and a
//! `tables` list. Two fallbacks are accepted: a `models` list (dbt style,
//! every model is a flat table) and a root that is itself a single table
//! (it carries `columns` or role collections directly).
//!
//! Each table entry's shape is resolved on its own, never from its
//! neighbours:
//!
//! - an entry with any of `dimensions`, `time_dimensions`, `facts` or
//!   `measures` is [`TableShape::Semantic`]; a `columns` list on such an
//!   entry is kept, its columns becoming dimensions
//! - any other entry is [`TableShape::Flat`] and reads `columns`
//!
//! # Types
//!
//! Type spellings go through [`DataType::parse`]. An unknown spelling is an
//! unbounded string plus a warning under [`StrictMode::Lenient`], and
//! [`SchemaParseError::UnknownDataType`] under [`StrictMode::Strict`].

use super::{SchemaParseError, SchemaParseResult};
use crate::models::{
    Aggregation, ColumnDefinition, DataType, SchemaDefinition, SemanticRole, StrictMode,
    TableSchema, TableShape,
};
use crate::validation::input::{
    validate_column_name, validate_description, validate_file_pattern, validate_table_name,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Model name used when the document does not declare one
pub const DEFAULT_MODEL_NAME: &str = "unnamed_model";

const ROLE_KEYS: &[&str] = &["dimensions", "time_dimensions", "facts", "measures"];

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<serde_yaml::Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tables: Option<Vec<RawTable>>,
    #[serde(default)]
    models: Option<Vec<RawTable>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTable {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    columns: Option<Vec<RawColumnEntry>>,
    #[serde(default)]
    dimensions: Option<Vec<RawColumnEntry>>,
    #[serde(default)]
    time_dimensions: Option<Vec<RawColumnEntry>>,
    #[serde(default)]
    facts: Option<Vec<RawColumnEntry>>,
    #[serde(default)]
    measures: Option<Vec<RawColumnEntry>>,
    #[serde(default)]
    primary_key: Option<RawKey>,
    #[serde(default)]
    unique_key: Option<RawKey>,
    #[serde(default)]
    file_patterns: Vec<String>,
}

/// A column entry: either a bare name or a full mapping
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawColumnEntry {
    Name(String),
    Full(RawColumn),
}

impl RawColumnEntry {
    fn into_column(self) -> RawColumn {
        match self {
            RawColumnEntry::Name(name) => RawColumn {
                name: Some(name),
                ..Default::default()
            },
            RawColumnEntry::Full(column) => column,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawColumn {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    data_type: Option<String>,
    #[serde(default, rename = "type")]
    type_name: Option<String>,
    #[serde(default)]
    synonyms: Vec<String>,
    #[serde(default)]
    default_aggregation: Option<String>,
    #[serde(default)]
    expr: Option<String>,
    #[serde(default)]
    nullable: Option<bool>,
    #[serde(default)]
    not_null: Option<bool>,
    #[serde(default)]
    primary_key: Option<bool>,
    #[serde(default)]
    tests: Vec<serde_yaml::Value>,
}

impl RawColumn {
    fn is_not_null(&self) -> bool {
        self.not_null == Some(true)
            || self.nullable == Some(false)
            || self
                .tests
                .iter()
                .any(|t| t.as_str().is_some_and(|s| s.eq_ignore_ascii_case("not_null")))
    }
}

/// Key declared as a list, a single name, or `{columns: [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawKey {
    List(Vec<String>),
    Single(String),
    Columns { columns: Vec<String> },
}

impl RawKey {
    fn into_columns(self) -> Vec<String> {
        match self {
            RawKey::List(columns) | RawKey::Columns { columns } => columns,
            RawKey::Single(column) => vec![column],
        }
    }
}

/// Table body resolved once from the raw entry
enum RawShape {
    Flat(Vec<RawColumnEntry>),
    Semantic {
        dimensions: Vec<RawColumnEntry>,
        time_dimensions: Vec<RawColumnEntry>,
        facts: Vec<RawColumnEntry>,
        untyped: Vec<RawColumnEntry>,
    },
}

impl RawTable {
    fn is_semantic(&self) -> bool {
        self.dimensions.is_some()
            || self.time_dimensions.is_some()
            || self.facts.is_some()
            || self.measures.is_some()
    }

    fn take_shape(&mut self) -> RawShape {
        if self.is_semantic() {
            let mut facts = self.facts.take().unwrap_or_default();
            facts.extend(self.measures.take().unwrap_or_default());
            RawShape::Semantic {
                dimensions: self.dimensions.take().unwrap_or_default(),
                time_dimensions: self.time_dimensions.take().unwrap_or_default(),
                facts,
                untyped: self.columns.take().unwrap_or_default(),
            }
        } else {
            RawShape::Flat(self.columns.take().unwrap_or_default())
        }
    }
}

/// Parser for semantic schema documents.
///
/// # Example
///
/// ```rust
/// use semantic_loader::import::SchemaDefinitionParser;
///
/// let yaml = r#"
/// name: demo
/// tables:
///   - name: events
///     primary_key: [id]
///     columns:
///       - name: id
///         data_type: integer
///       - name: label
/// "#;
/// let schema = SchemaDefinitionParser::new().parse_str(yaml).unwrap();
/// assert_eq!(schema.tables[0].name, "EVENTS");
/// assert_eq!(schema.tables[0].key, vec!["ID"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaDefinitionParser {
    strict: StrictMode,
    key_overrides: HashMap<String, Vec<String>>,
}

impl SchemaDefinitionParser {
    /// Create a lenient parser without key overrides
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict_mode(mut self, strict: StrictMode) -> Self {
        self.strict = strict;
        self
    }

    /// Replace the declared key of the named tables
    ///
    /// Table names are matched case-insensitively. An override replaces
    /// whatever key the document declares.
    pub fn with_key_overrides(mut self, overrides: HashMap<String, Vec<String>>) -> Self {
        self.key_overrides = overrides
            .into_iter()
            .map(|(table, key)| (table.trim().to_uppercase(), key))
            .collect();
        self
    }

    /// Read and parse a schema document from disk
    pub fn parse_file(&self, path: &Path) -> SchemaParseResult<SchemaDefinition> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SchemaParseError::Io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        self.parse_str(&content)
    }

    /// Parse a schema document from a YAML (or JSON) string
    pub fn parse_str(&self, content: &str) -> SchemaParseResult<SchemaDefinition> {
        let root: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| SchemaParseError::Malformed(e.to_string()))?;

        let serde_yaml::Value::Mapping(mapping) = &root else {
            return Err(SchemaParseError::Malformed(
                "document root must be a mapping".to_string(),
            ));
        };

        let is_single_table = !mapping.contains_key("tables")
            && !mapping.contains_key("models")
            && std::iter::once("columns")
                .chain(ROLE_KEYS.iter().copied())
                .any(|key| mapping.contains_key(key));

        let document: RawDocument = serde_yaml::from_value(root.clone())
            .map_err(|e| SchemaParseError::Malformed(e.to_string()))?;

        let entries = if let Some(tables) = document.tables {
            tables
        } else if let Some(models) = document.models {
            debug!("Reading 'models' list as flat tables");
            models
        } else if is_single_table {
            debug!("Reading document root as a single table");
            let table: RawTable = serde_yaml::from_value(root)
                .map_err(|e| SchemaParseError::Malformed(e.to_string()))?;
            vec![table]
        } else {
            return Err(SchemaParseError::MissingTables);
        };

        if entries.is_empty() {
            return Err(SchemaParseError::MissingTables);
        }

        let mut tables = Vec::with_capacity(entries.len());
        let mut seen = HashSet::new();
        for (index, entry) in entries.into_iter().enumerate() {
            let table = self.build_table(index, entry)?;
            if !seen.insert(table.name.clone()) {
                return Err(SchemaParseError::DuplicateTable { table: table.name });
            }
            tables.push(table);
        }

        for table in self.key_overrides.keys() {
            if !seen.contains(table) {
                warn!("Key override for unknown table '{}' ignored", table);
            }
        }

        let schema = SchemaDefinition {
            name: document
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            version: document.version.and_then(version_string),
            description: document.description.unwrap_or_default().trim().to_string(),
            tables,
        };

        info!(
            "Parsed schema '{}' with {} tables ({} columns)",
            schema.name,
            schema.tables.len(),
            schema.column_count()
        );

        Ok(schema)
    }

    fn build_table(&self, index: usize, mut raw: RawTable) -> SchemaParseResult<TableSchema> {
        let name = raw
            .name
            .take()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or(SchemaParseError::MissingTableName { index })?;

        let mut table = TableSchema::new(&name);
        if let Err(e) = validate_table_name(&table.name) {
            warn!("Table name '{}' will be quoted: {}", table.name, e);
        }
        table.description = raw.description.take().unwrap_or_default().trim().to_string();
        if let Err(e) = validate_description(&table.description) {
            warn!("Description of table '{}': {}", table.name, e);
        }

        let mut flagged_key = Vec::new();
        let mut push = |table: &mut TableSchema,
                        entries: Vec<RawColumnEntry>,
                        role: Option<SemanticRole>|
         -> SchemaParseResult<()> {
            for entry in entries {
                let position = table.columns.len();
                let (column, in_key) = self.build_column(&table.name, position, entry, role)?;
                if table.column(&column.name).is_some() {
                    return Err(SchemaParseError::DuplicateColumn {
                        table: table.name.clone(),
                        column: column.name,
                    });
                }
                if in_key {
                    flagged_key.push(column.name.clone());
                }
                table.columns.push(column);
            }
            Ok(())
        };

        match raw.take_shape() {
            RawShape::Flat(columns) => {
                table.shape = TableShape::Flat;
                push(&mut table, columns, None)?;
            }
            RawShape::Semantic {
                dimensions,
                time_dimensions,
                facts,
                untyped,
            } => {
                table.shape = TableShape::Semantic;
                push(&mut table, dimensions, Some(SemanticRole::Dimension))?;
                push(&mut table, time_dimensions, Some(SemanticRole::TimeDimension))?;
                push(&mut table, facts, Some(SemanticRole::Fact))?;
                if !untyped.is_empty() {
                    warn!(
                        "Table '{}' mixes 'columns' with role collections; {} columns treated as dimensions",
                        table.name,
                        untyped.len()
                    );
                    push(&mut table, untyped, Some(SemanticRole::Dimension))?;
                }
            }
        }

        if table.columns.is_empty() {
            return Err(SchemaParseError::EmptyTable { table: table.name });
        }

        let declared_key = match self.key_overrides.get(&table.name) {
            Some(key) => key.clone(),
            None => raw
                .primary_key
                .take()
                .or_else(|| raw.unique_key.take())
                .map(RawKey::into_columns)
                .unwrap_or(flagged_key),
        };
        let mut key = Vec::with_capacity(declared_key.len());
        for column in declared_key {
            let Some(found) = table.column(&column) else {
                return Err(SchemaParseError::UnknownKeyColumn {
                    table: table.name.clone(),
                    column,
                });
            };
            key.push(found.name.clone());
        }
        table.key = key;

        for pattern in raw.file_patterns {
            match validate_file_pattern(&pattern) {
                Ok(()) => table.file_patterns.push(pattern.trim().to_lowercase()),
                Err(e) => warn!("Ignoring file pattern for table '{}': {}", table.name, e),
            }
        }

        debug!(
            "Table '{}' ({:?}): {} columns, key {:?}",
            table.name,
            table.shape,
            table.columns.len(),
            table.key
        );

        Ok(table)
    }

    fn build_column(
        &self,
        table: &str,
        index: usize,
        entry: RawColumnEntry,
        role: Option<SemanticRole>,
    ) -> SchemaParseResult<(ColumnDefinition, bool)> {
        let raw = entry.into_column();
        let not_null = raw.is_not_null();
        let name = raw
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| SchemaParseError::MissingColumnName {
                table: table.to_string(),
                index,
            })?;

        let mut column = match role {
            Some(role) => ColumnDefinition::with_role(name, role),
            None => ColumnDefinition::new(name, DataType::Varchar(None)),
        };
        if let Err(e) = validate_column_name(&column.name) {
            warn!("Column name '{}.{}' will be quoted: {}", table, column.name, e);
        }

        let declared = raw
            .data_type
            .or(raw.type_name)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if let Some(declared) = declared {
            column.data_type = self.resolve_type(table, &column.name, &declared)?;
            column.declared_type = Some(declared);
        }

        column.description = raw.description.unwrap_or_default().trim().to_string();
        column.nullable = !not_null;
        column.synonyms = raw
            .synonyms
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        column.expr = raw.expr.filter(|e| !e.trim().is_empty());

        match (role, raw.default_aggregation) {
            (Some(SemanticRole::Fact), Some(aggregation)) => {
                column.default_aggregation = Some(aggregation.parse().unwrap_or_else(|e| {
                    warn!("{} on '{}.{}', using sum", e, table, column.name);
                    Aggregation::Sum
                }));
            }
            (_, Some(aggregation)) => {
                debug!(
                    "Ignoring default_aggregation '{}' on non-fact column '{}.{}'",
                    aggregation, table, column.name
                );
            }
            _ => {}
        }

        Ok((column, raw.primary_key == Some(true)))
    }

    fn resolve_type(&self, table: &str, column: &str, declared: &str) -> SchemaParseResult<DataType> {
        if let Some(data_type) = DataType::parse(declared) {
            return Ok(data_type);
        }
        if self.strict.is_strict() {
            return Err(SchemaParseError::UnknownDataType {
                table: table.to_string(),
                column: column.to_string(),
                data_type: declared.to_string(),
            });
        }
        warn!(
            "Unrecognized data type '{}' for '{}.{}', using unbounded string",
            declared, table, column
        );
        Ok(DataType::Varchar(None))
    }
}

fn version_string(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEMANTIC_DOC: &str = r#"
name: anon_analytics
version: 1.0
description: Anonymized app usage
tables:
  - name: anon_views
    description: Individual app views
    primary_key:
      columns: [app_id, user_id, view_time]
    dimensions:
      - name: app_id
        data_type: VARCHAR
        synonyms: [application]
      - name: user_id
    time_dimensions:
      - name: view_time
        data_type: timestamp
      - name: view_date
        data_type: date
    facts:
      - name: total_view_time_sec
        data_type: NUMBER(38,0)
        default_aggregation: sum
      - name: total_amount_spent
"#;

    #[test]
    fn test_parse_semantic_shape() {
        let schema = SchemaDefinitionParser::new().parse_str(SEMANTIC_DOC).unwrap();
        assert_eq!(schema.name, "anon_analytics");
        assert_eq!(schema.version.as_deref(), Some("1.0"));

        let table = &schema.tables[0];
        assert_eq!(table.shape, TableShape::Semantic);
        assert_eq!(table.key, vec!["APP_ID", "USER_ID", "VIEW_TIME"]);
        assert_eq!(
            table.column_names(),
            vec![
                "APP_ID",
                "USER_ID",
                "VIEW_TIME",
                "VIEW_DATE",
                "TOTAL_VIEW_TIME_SEC",
                "TOTAL_AMOUNT_SPENT"
            ]
        );

        let user = table.column("user_id").unwrap();
        assert_eq!(user.role, Some(SemanticRole::Dimension));
        assert_eq!(user.data_type, DataType::Varchar(None));

        let spent = table.column("total_amount_spent").unwrap();
        assert_eq!(spent.data_type, DataType::Float);
        assert_eq!(spent.default_aggregation, Some(Aggregation::Sum));

        assert_eq!(
            table.column("total_view_time_sec").unwrap().data_type,
            DataType::Integer
        );
        assert_eq!(table.column("app_id").unwrap().synonyms, vec!["application"]);
    }

    #[test]
    fn test_shape_is_resolved_per_table() {
        let yaml = r#"
tables:
  - name: flat_one
    columns:
      - name: id
        type: integer
      - label
  - name: semantic_two
    facts:
      - name: amount
"#;
        let schema = SchemaDefinitionParser::new().parse_str(yaml).unwrap();
        assert_eq!(schema.name, DEFAULT_MODEL_NAME);
        assert_eq!(schema.tables[0].shape, TableShape::Flat);
        assert_eq!(schema.tables[0].columns[0].data_type, DataType::Integer);
        assert_eq!(schema.tables[0].columns[1].name, "LABEL");
        assert!(schema.tables[0].columns[1].role.is_none());
        assert_eq!(schema.tables[1].shape, TableShape::Semantic);
        assert_eq!(
            schema.tables[1].columns[0].role,
            Some(SemanticRole::Fact)
        );
    }

    #[test]
    fn test_unknown_type_lenient_and_strict() {
        let yaml = r#"
tables:
  - name: t
    columns:
      - name: shape
        data_type: geography
"#;
        let schema = SchemaDefinitionParser::new().parse_str(yaml).unwrap();
        let column = &schema.tables[0].columns[0];
        assert_eq!(column.data_type, DataType::Varchar(None));
        assert_eq!(column.declared_type.as_deref(), Some("geography"));

        let err = SchemaDefinitionParser::new()
            .with_strict_mode(StrictMode::Strict)
            .parse_str(yaml)
            .unwrap_err();
        assert!(matches!(err, SchemaParseError::UnknownDataType { .. }));
    }

    #[test]
    fn test_missing_table_name_is_error() {
        let yaml = "tables:\n  - columns: [a]\n";
        let err = SchemaDefinitionParser::new().parse_str(yaml).unwrap_err();
        assert_eq!(err, SchemaParseError::MissingTableName { index: 0 });
    }

    #[test]
    fn test_malformed_documents() {
        let parser = SchemaDefinitionParser::new();
        assert!(matches!(
            parser.parse_str("tables: [unclosed"),
            Err(SchemaParseError::Malformed(_))
        ));
        assert!(matches!(
            parser.parse_str("- just\n- a list\n"),
            Err(SchemaParseError::Malformed(_))
        ));
        assert_eq!(
            parser.parse_str("name: nothing\n"),
            Err(SchemaParseError::MissingTables)
        );
        assert_eq!(
            parser.parse_str("tables: []\n"),
            Err(SchemaParseError::MissingTables)
        );
    }

    #[test]
    fn test_duplicates_rejected() {
        let parser = SchemaDefinitionParser::new();
        let dup_table = "tables:\n  - name: a\n    columns: [x]\n  - name: A\n    columns: [y]\n";
        assert!(matches!(
            parser.parse_str(dup_table),
            Err(SchemaParseError::DuplicateTable { .. })
        ));
        let dup_column = "tables:\n  - name: a\n    columns: [x, X]\n";
        assert!(matches!(
            parser.parse_str(dup_column),
            Err(SchemaParseError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn test_key_variants_and_overrides() {
        let yaml = r#"
tables:
  - name: user_day
    unique_key: user_id
    columns: [user_id, view_date]
  - name: flagged
    columns:
      - name: id
        primary_key: true
      - name: value
"#;
        let schema = SchemaDefinitionParser::new().parse_str(yaml).unwrap();
        assert_eq!(schema.tables[0].key, vec!["USER_ID"]);
        assert_eq!(schema.tables[1].key, vec!["ID"]);

        let mut overrides = HashMap::new();
        overrides.insert(
            "user_day".to_string(),
            vec!["user_id".to_string(), "view_date".to_string()],
        );
        let schema = SchemaDefinitionParser::new()
            .with_key_overrides(overrides)
            .parse_str(yaml)
            .unwrap();
        assert_eq!(schema.tables[0].key, vec!["USER_ID", "VIEW_DATE"]);

        let bad = "tables:\n  - name: t\n    primary_key: [nope]\n    columns: [a]\n";
        assert!(matches!(
            SchemaDefinitionParser::new().parse_str(bad),
            Err(SchemaParseError::UnknownKeyColumn { .. })
        ));
    }

    #[test]
    fn test_single_table_and_models_documents() {
        let single = "name: solo\ncolumns:\n  - name: id\n    not_null: true\n";
        let schema = SchemaDefinitionParser::new().parse_str(single).unwrap();
        assert_eq!(schema.tables.len(), 1);
        assert_eq!(schema.tables[0].name, "SOLO");
        assert!(!schema.tables[0].columns[0].nullable);

        let dbt = r#"
models:
  - name: stg_users
    columns:
      - name: user_id
        data_type: varchar
        tests: [not_null, unique]
      - name: signup_date
        data_type: date
"#;
        let schema = SchemaDefinitionParser::new().parse_str(dbt).unwrap();
        let table = &schema.tables[0];
        assert_eq!(table.name, "STG_USERS");
        assert!(!table.columns[0].nullable);
        assert_eq!(table.columns[1].data_type, DataType::Date);
    }

    #[test]
    fn test_file_patterns_are_normalized() {
        let yaml = "tables:\n  - name: t\n    file_patterns: [User_Day_Fact, '', 'a/b']\n    columns: [a]\n";
        let schema = SchemaDefinitionParser::new().parse_str(yaml).unwrap();
        assert_eq!(schema.tables[0].file_patterns, vec!["user_day_fact"]);
    }
}
