//! Destination store abstraction
//!
//! The loader, provisioner and verifier only see the [`DatabaseBackend`]
//! trait: execute DDL, bulk-insert a batch of typed rows, and run count or
//! aggregate queries. The embedded DuckDB implementation lives behind the
//! `duckdb-backend` feature.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{RowBatch, SqlDialect};

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

pub mod queries;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDBBackend;

/// Error type for destination operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Bulk insert failed; nothing from the batch was committed
    #[error("Insert failed: {0}")]
    InsertFailed(String),

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The connection was already released
    #[error("Connection is closed")]
    Closed,
}

/// Result type for destination operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Query result row as a JSON value
pub type QueryRow = serde_json::Value;

/// Query result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<QueryRow>,
    /// Number of rows affected (for INSERT/UPDATE/DELETE)
    pub rows_affected: Option<u64>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<String>, rows: Vec<QueryRow>) -> Self {
        Self {
            columns,
            rows,
            rows_affected: None,
            execution_time_ms: 0,
        }
    }

    /// Create an empty result
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row as a non-negative integer
    pub fn scalar_u64(&self) -> DatabaseResult<u64> {
        let column = self
            .columns
            .first()
            .ok_or_else(|| DatabaseError::QueryFailed("Query returned no columns".to_string()))?;
        let value = self
            .rows
            .first()
            .and_then(|row| row.get(column))
            .ok_or_else(|| DatabaseError::QueryFailed("Query returned no rows".to_string()))?;

        match value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            DatabaseError::SerializationError(format!("Expected a count, got {}", value))
        })
    }
}

/// Destination capability used by the loader, provisioner and verifier
///
/// Counting, duplicate detection, sampling, truncation and existence checks
/// have default implementations built on [`execute_query`] and the SQL in
/// [`queries`]; backends override them when they have a cheaper path.
///
/// [`execute_query`]: DatabaseBackend::execute_query
#[async_trait(?Send)]
pub trait DatabaseBackend: Send + Sync {
    /// Execute a DDL or other statement that returns no rows
    async fn execute_ddl(&self, sql: &str) -> DatabaseResult<()>;

    /// Execute a SQL query and return results
    async fn execute_query(&self, sql: &str) -> DatabaseResult<QueryResult>;

    /// Execute a parameterized SQL query
    ///
    /// # Arguments
    /// * `sql` - SQL query with `?` placeholders
    /// * `params` - Parameter values as JSON
    async fn execute_query_params(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> DatabaseResult<QueryResult>;

    /// Insert a batch of rows as one atomic unit
    ///
    /// Either every row is committed and the row count is returned, or
    /// nothing is committed and an error is returned.
    async fn bulk_insert(&self, table: &str, batch: &RowBatch) -> DatabaseResult<u64>;

    /// Remove every row from a table
    async fn truncate_table(&self, table: &str) -> DatabaseResult<()> {
        self.execute_ddl(&queries::truncate_sql(self.dialect(), table))
            .await
    }

    /// Add text columns the table does not have yet
    async fn add_columns(&self, table: &str, columns: &[String]) -> DatabaseResult<()> {
        for column in columns {
            self.execute_ddl(&queries::add_column_sql(table, column))
                .await?;
        }
        Ok(())
    }

    /// Check whether a table exists
    async fn table_exists(&self, table: &str) -> DatabaseResult<bool> {
        let result = self
            .execute_query_params(
                queries::TABLE_EXISTS_SQL,
                &[serde_json::Value::String(table.to_string())],
            )
            .await?;
        Ok(result.scalar_u64()? > 0)
    }

    /// Number of rows in a table
    async fn count_rows(&self, table: &str) -> DatabaseResult<u64> {
        self.execute_query(&queries::count_rows_sql(table))
            .await?
            .scalar_u64()
    }

    /// Rows minus distinct key tuples
    async fn count_duplicates(&self, table: &str, key_columns: &[String]) -> DatabaseResult<u64> {
        let sql = queries::duplicate_count_sql(table, key_columns)?;
        self.execute_query(&sql).await?.scalar_u64()
    }

    /// First `limit` rows of a table
    async fn sample_rows(&self, table: &str, limit: usize) -> DatabaseResult<QueryResult> {
        self.execute_query(&queries::sample_sql(table, limit)).await
    }

    /// Check if database is healthy and accessible
    async fn health_check(&self) -> DatabaseResult<bool>;

    /// Dialect the backend expects DDL in
    fn dialect(&self) -> SqlDialect;

    /// Backend type string (e.g. "duckdb")
    fn backend_type(&self) -> &'static str;

    /// Release the connection
    ///
    /// Safe to call more than once. Calls made after closing fail with
    /// [`DatabaseError::Closed`].
    async fn close(&self) -> DatabaseResult<()>;
}

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Format query results for display
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result.rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => format_as_csv(result),
        OutputFormat::Table => format_as_table(result),
    }
}

fn cell_text(row: &QueryRow, column: &str) -> String {
    match row.get(column) {
        None | Some(serde_json::Value::Null) => "null".to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn format_as_csv(result: &QueryResult) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut write = || -> Result<(), csv::Error> {
        writer.write_record(&result.columns)?;
        for row in &result.rows {
            writer.write_record(result.columns.iter().map(|col| match row.get(col) {
                None | Some(serde_json::Value::Null) => String::new(),
                Some(_) => cell_text(row, col),
            }))?;
        }
        writer.flush()?;
        Ok(())
    };
    if let Err(e) = write() {
        return format!("error writing CSV: {}", e);
    }
    writer
        .into_inner()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn format_as_table(result: &QueryResult) -> String {
    if result.is_empty() {
        return "(0 rows)".to_string();
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| result.columns.iter().map(|c| cell_text(row, c)).collect())
        .collect();

    let widths: Vec<usize> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:w$}", v, w = *w))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    let mut lines = vec![
        render(result.columns.as_slice()),
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    ];
    lines.extend(cells.iter().map(|row| render(row.as_slice())));
    lines.push(format!("({} rows)", result.row_count()));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(
            OutputFormat::from_str("table").unwrap(),
            OutputFormat::Table
        );
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("csv").unwrap(), OutputFormat::Csv);
        assert!(OutputFormat::from_str("xml").is_err());
    }

    #[test]
    fn test_scalar_u64() {
        let result = QueryResult::new(
            vec!["n".to_string()],
            vec![serde_json::json!({"n": 42})],
        );
        assert_eq!(result.scalar_u64().unwrap(), 42);

        let huge = QueryResult::new(
            vec!["n".to_string()],
            vec![serde_json::json!({"n": "7"})],
        );
        assert_eq!(huge.scalar_u64().unwrap(), 7);

        assert!(QueryResult::empty().scalar_u64().is_err());
        let negative = QueryResult::new(
            vec!["n".to_string()],
            vec![serde_json::json!({"n": -1})],
        );
        assert!(negative.scalar_u64().is_err());
    }

    #[test]
    fn test_format_as_table() {
        let result = QueryResult::new(
            vec!["table_name".to_string(), "rows".to_string()],
            vec![
                serde_json::json!({"table_name": "ANON_VIEWS", "rows": 10}),
                serde_json::json!({"table_name": "ANON_USER_DAY_FACT", "rows": null}),
            ],
        );

        let output = format_as_table(&result);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "table_name         | rows");
        assert_eq!(lines[2], "ANON_VIEWS         | 10  ");
        assert!(lines[3].ends_with("null"));
        assert_eq!(lines[4], "(2 rows)");
    }

    #[test]
    fn test_format_as_csv() {
        let result = QueryResult::new(
            vec!["name".to_string(), "description".to_string()],
            vec![
                serde_json::json!({"name": "test", "description": "simple"}),
                serde_json::json!({"name": "complex", "description": "has, comma"}),
                serde_json::json!({"name": "empty", "description": null}),
            ],
        );

        let output = format_as_csv(&result);
        assert!(output.starts_with("name,description\n"));
        assert!(output.contains("test,simple\n"));
        assert!(output.contains("\"has, comma\""));
        assert!(output.contains("empty,\n"));
    }
}
