//! Create-or-replace DDL for schema tables.
//!
//! Rendering is pure: the same [`TableSchema`] and dialect always produce the
//! same statements, and every statement replaces rather than alters, so
//! issuing them twice yields the same table structure.

use super::{ExportError, ExportResult};
use crate::models::{SchemaDefinition, SqlDialect, TableSchema};
use crate::validation::input::{quote_identifier, quote_literal};
use serde::{Deserialize, Serialize};

/// Statements that provision one table, in execution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDdl {
    pub table: String,
    pub statements: Vec<String>,
}

impl TableDdl {
    /// Statements joined into a script
    pub fn to_sql(&self) -> String {
        let mut sql = self.statements.join(";\n");
        sql.push(';');
        sql
    }
}

/// DDL renderer for a single dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct DdlExporter {
    dialect: SqlDialect,
}

impl DdlExporter {
    /// Create a renderer for a dialect.
    ///
    /// # Example
    ///
    /// ```rust
    /// use semantic_loader::export::DdlExporter;
    /// use semantic_loader::models::{ColumnDefinition, DataType, SqlDialect, TableSchema};
    ///
    /// let table = TableSchema::new("t")
    ///     .with_column(ColumnDefinition::new("id", DataType::Integer))
    ///     .with_key(&["id"]);
    /// let ddl = DdlExporter::new(SqlDialect::Snowflake).export_table(&table).unwrap();
    /// assert!(ddl.to_sql().contains("PRIMARY KEY (\"ID\")"));
    /// ```
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Render the statements for every table of a schema
    pub fn export_schema(&self, schema: &SchemaDefinition) -> ExportResult<Vec<TableDdl>> {
        schema.tables.iter().map(|t| self.export_table(t)).collect()
    }

    /// Render the statements for one table
    pub fn export_table(&self, table: &TableSchema) -> ExportResult<TableDdl> {
        if table.columns.is_empty() {
            return Err(ExportError::ValidationError(format!(
                "Table '{}' has no columns",
                table.name
            )));
        }

        let statements = match self.dialect {
            SqlDialect::Snowflake => vec![self.snowflake_create(table)],
            SqlDialect::DuckDb => self.duckdb_statements(table),
        };

        Ok(TableDdl {
            table: table.name.clone(),
            statements,
        })
    }

    fn column_clause(&self, table: &TableSchema, inline_comments: bool) -> Vec<String> {
        table
            .columns
            .iter()
            .map(|column| {
                let mut clause = format!(
                    "  {} {}",
                    quote_identifier(&column.name),
                    column.data_type.storage_type(self.dialect)
                );
                if !column.nullable {
                    clause.push_str(" NOT NULL");
                }
                if inline_comments && !column.description.is_empty() {
                    clause.push_str(&format!(" COMMENT {}", quote_literal(&column.description)));
                }
                clause
            })
            .collect()
    }

    fn snowflake_create(&self, table: &TableSchema) -> String {
        let mut clauses = self.column_clause(table, true);
        if table.has_key() {
            clauses.push(format!("  PRIMARY KEY ({})", quoted_list(&table.key)));
        }

        let mut sql = format!(
            "CREATE OR REPLACE TABLE {} (\n{}\n)",
            quote_identifier(&table.name),
            clauses.join(",\n")
        );
        if !table.description.is_empty() {
            sql.push_str(&format!(" COMMENT = {}", quote_literal(&table.description)));
        }
        sql
    }

    // The key is not declared here: DuckDB enforces PRIMARY KEY, which would
    // reject the duplicate rows the verifier is meant to count.
    fn duckdb_statements(&self, table: &TableSchema) -> Vec<String> {
        let name = quote_identifier(&table.name);
        let mut statements = vec![format!(
            "CREATE OR REPLACE TABLE {} (\n{}\n)",
            name,
            self.column_clause(table, false).join(",\n")
        )];

        if !table.description.is_empty() {
            statements.push(format!(
                "COMMENT ON TABLE {} IS {}",
                name,
                quote_literal(&table.description)
            ));
        }
        for column in table.columns.iter().filter(|c| !c.description.is_empty()) {
            statements.push(format!(
                "COMMENT ON COLUMN {}.{} IS {}",
                name,
                quote_identifier(&column.name),
                quote_literal(&column.description)
            ));
        }
        statements
    }
}

fn quoted_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnDefinition, DataType, SemanticRole};

    fn views() -> TableSchema {
        let mut app = ColumnDefinition::with_role("app_id", SemanticRole::Dimension);
        app.nullable = false;
        app.description = "Application's id".to_string();
        let mut table = TableSchema::new("anon_views")
            .with_column(app)
            .with_column(ColumnDefinition::with_role(
                "view_time",
                SemanticRole::TimeDimension,
            ))
            .with_column(ColumnDefinition::new("views", DataType::Integer))
            .with_key(&["app_id", "view_time"]);
        table.description = "App views".to_string();
        table
    }

    #[test]
    fn test_snowflake_ddl() {
        let ddl = DdlExporter::new(SqlDialect::Snowflake)
            .export_table(&views())
            .unwrap();
        assert_eq!(ddl.statements.len(), 1);
        assert_eq!(
            ddl.statements[0],
            "CREATE OR REPLACE TABLE \"ANON_VIEWS\" (\n  \"APP_ID\" VARCHAR(16777216) NOT NULL COMMENT 'Application''s id',\n  \"VIEW_TIME\" TIMESTAMP_NTZ,\n  \"VIEWS\" INTEGER,\n  PRIMARY KEY (\"APP_ID\", \"VIEW_TIME\")\n) COMMENT = 'App views'"
        );
    }

    #[test]
    fn test_duckdb_ddl_uses_comment_statements() {
        let ddl = DdlExporter::new(SqlDialect::DuckDb)
            .export_table(&views())
            .unwrap();
        assert_eq!(ddl.statements.len(), 3);
        assert!(ddl.statements[0].starts_with("CREATE OR REPLACE TABLE \"ANON_VIEWS\""));
        assert!(ddl.statements[0].contains("\"VIEW_TIME\" TIMESTAMP"));
        assert!(!ddl.statements[0].contains("PRIMARY KEY"));
        assert_eq!(
            ddl.statements[1],
            "COMMENT ON TABLE \"ANON_VIEWS\" IS 'App views'"
        );
        assert!(ddl.statements[2].starts_with("COMMENT ON COLUMN \"ANON_VIEWS\".\"APP_ID\""));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let exporter = DdlExporter::new(SqlDialect::Snowflake);
        assert_eq!(
            exporter.export_table(&views()).unwrap(),
            exporter.export_table(&views()).unwrap()
        );
    }

    #[test]
    fn test_empty_table_rejected() {
        let result = DdlExporter::default().export_table(&TableSchema::new("empty"));
        assert!(matches!(result, Err(ExportError::ValidationError(_))));
    }
}
