//! DuckDB destination backend
//!
//! Embedded destination for loaded tables. Supports both file-based
//! persistence and in-memory mode; the connection is held for the lifetime of
//! the backend and released by [`DatabaseBackend::close`].

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike};
use duckdb::ToSql;
use duckdb::types::{TimeUnit, Value, ValueRef};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use super::{DatabaseBackend, DatabaseError, DatabaseResult, QueryResult};
use crate::config::LoaderConfig;
use crate::models::{CellValue, RowBatch, SqlDialect};

const TABLE_COLUMNS_SQL: &str = "SELECT column_name FROM information_schema.columns \
     WHERE table_name = ? AND table_schema = current_schema() ORDER BY ordinal_position";

/// Days from 0001-01-01 (CE day 1) to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// DuckDB destination backend
pub struct DuckDBBackend {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection, `None` once closed
    connection: Mutex<Option<duckdb::Connection>>,
}

impl DuckDBBackend {
    /// Open (or create) a file-based database
    pub fn new(db_path: impl AsRef<Path>) -> DatabaseResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path).map_err(|e| {
            DatabaseError::ConnectionFailed(format!(
                "Failed to open DuckDB at {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(Some(connection)),
        })
    }

    /// Create an in-memory database
    pub fn in_memory() -> DatabaseResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(Some(connection)),
        })
    }

    /// Open the destination a configuration points at
    pub fn from_config(config: &LoaderConfig, workspace_path: &Path) -> DatabaseResult<Self> {
        match config.get_duckdb_path(workspace_path) {
            Some(path) => Self::new(path),
            None => Self::in_memory(),
        }
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut duckdb::Connection) -> DatabaseResult<T>,
    ) -> DatabaseResult<T> {
        let mut guard = self
            .connection
            .lock()
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Lock error: {}", e)))?;
        let connection = guard.as_mut().ok_or(DatabaseError::Closed)?;
        f(connection)
    }

    fn run_query(
        connection: &duckdb::Connection,
        sql: &str,
        params: &[String],
    ) -> DatabaseResult<QueryResult> {
        let start = std::time::Instant::now();

        let mut stmt = connection
            .prepare(sql)
            .map_err(|e| DatabaseError::QueryFailed(format!("Prepare failed: {}", e)))?;

        // Columns are only known once the statement has run
        let mut result_rows = stmt
            .query(duckdb::params_from_iter(params.iter()))
            .map_err(|e| DatabaseError::QueryFailed(format!("Query failed: {}", e)))?;

        let column_count = result_rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let columns: Vec<String> = (0..column_count)
            .map(|i| {
                result_rows
                    .as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut rows = Vec::new();
        while let Some(row) = result_rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            let mut map = serde_json::Map::with_capacity(columns.len());
            for (i, name) in columns.iter().enumerate() {
                let value = row
                    .get_ref(i)
                    .map(value_ref_to_json)
                    .unwrap_or(serde_json::Value::Null);
                map.insert(name.clone(), value);
            }
            rows.push(serde_json::Value::Object(map));
        }

        Ok(QueryResult {
            columns,
            rows,
            rows_affected: None,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Column names of a table in declaration order
fn table_columns(connection: &duckdb::Connection, table: &str) -> DatabaseResult<Vec<String>> {
    let mut stmt = connection
        .prepare(TABLE_COLUMNS_SQL)
        .map_err(|e| DatabaseError::QueryFailed(format!("Prepare failed: {}", e)))?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(|e| DatabaseError::QueryFailed(format!("Column lookup failed: {}", e)))?;
    if columns.is_empty() {
        return Err(DatabaseError::InsertFailed(format!(
            "Table '{}' does not exist",
            table
        )));
    }
    Ok(columns)
}

/// Position in the table of every batch column, matched exactly first and
/// then ignoring case
fn batch_positions(
    table: &str,
    table_columns: &[String],
    batch_columns: &[String],
) -> DatabaseResult<Vec<usize>> {
    batch_columns
        .iter()
        .map(|name| {
            table_columns
                .iter()
                .position(|c| c == name)
                .or_else(|| table_columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
                .ok_or_else(|| {
                    DatabaseError::InsertFailed(format!(
                        "Table '{}' does not have a column named '{}'",
                        table, name
                    ))
                })
        })
        .collect()
}

/// Convert a typed cell into a DuckDB parameter value
fn cell_to_value(cell: &CellValue) -> Value {
    match cell {
        CellValue::Null => Value::Null,
        CellValue::Text(s) => Value::Text(s.clone()),
        CellValue::Integer(i) => Value::BigInt(*i),
        CellValue::Float(f) => Value::Double(*f),
        CellValue::Boolean(b) => Value::Boolean(*b),
        CellValue::Date(d) => Value::Date32(d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
        CellValue::Timestamp(ts) => {
            Value::Timestamp(TimeUnit::Microsecond, ts.and_utc().timestamp_micros())
        }
        CellValue::Time(t) => Value::Time64(
            TimeUnit::Microsecond,
            i64::from(t.num_seconds_from_midnight()) * 1_000_000
                + i64::from(t.nanosecond() / 1_000),
        ),
    }
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value * 1_000_000,
        TimeUnit::Millisecond => value * 1_000,
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// Convert a DuckDB ValueRef to a JSON value
fn value_ref_to_json(value: ValueRef) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        ValueRef::Null => Json::Null,
        ValueRef::Boolean(b) => Json::Bool(b),
        ValueRef::TinyInt(i) => i.into(),
        ValueRef::SmallInt(i) => i.into(),
        ValueRef::Int(i) => i.into(),
        ValueRef::BigInt(i) => i.into(),
        ValueRef::UTinyInt(i) => i.into(),
        ValueRef::USmallInt(i) => i.into(),
        ValueRef::UInt(i) => i.into(),
        ValueRef::UBigInt(i) => i.into(),
        // i128 may not fit a JSON number
        ValueRef::HugeInt(i) => Json::String(i.to_string()),
        ValueRef::Float(f) => serde_json::Number::from_f64(f as f64)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        ValueRef::Double(f) => serde_json::Number::from_f64(f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        ValueRef::Decimal(d) => Json::String(d.to_string()),
        ValueRef::Text(bytes) => Json::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            use base64::Engine;
            Json::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
        ValueRef::Date32(days) => NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
            .map(|d| Json::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Json::Null),
        ValueRef::Timestamp(unit, v) => DateTime::from_timestamp_micros(to_micros(unit, v))
            .map(|dt| Json::String(dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string()))
            .unwrap_or(Json::Null),
        ValueRef::Time64(unit, v) => {
            let micros = to_micros(unit, v);
            NaiveTime::from_num_seconds_from_midnight_opt(
                (micros / 1_000_000) as u32,
                ((micros % 1_000_000) * 1_000) as u32,
            )
            .map(|t| Json::String(t.format("%H:%M:%S%.f").to_string()))
            .unwrap_or(Json::Null)
        }
        other => Json::String(format!("{:?}", other)),
    }
}

#[async_trait(?Send)]
impl DatabaseBackend for DuckDBBackend {
    async fn execute_ddl(&self, sql: &str) -> DatabaseResult<()> {
        self.with_connection(|conn| {
            conn.execute_batch(sql)
                .map_err(|e| DatabaseError::QueryFailed(format!("Execute failed: {}", e)))
        })
    }

    async fn execute_query(&self, sql: &str) -> DatabaseResult<QueryResult> {
        self.with_connection(|conn| Self::run_query(conn, sql, &[]))
    }

    async fn execute_query_params(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> DatabaseResult<QueryResult> {
        // Parameters are bound as text and cast by DuckDB
        let string_params: Vec<String> = params
            .iter()
            .map(|p| match p {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect();

        self.with_connection(|conn| Self::run_query(conn, sql, &string_params))
    }

    async fn bulk_insert(&self, table: &str, batch: &RowBatch) -> DatabaseResult<u64> {
        if batch.is_empty() {
            return Ok(0);
        }
        if batch.columns.is_empty() {
            return Err(DatabaseError::InvalidInput(format!(
                "Batch for '{}' has rows but no columns",
                table
            )));
        }

        self.with_connection(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
            let table_columns = table_columns(&tx, table)?;
            let positions = batch_positions(table, &table_columns, &batch.columns)?;
            {
                let mut appender = tx
                    .appender(table)
                    .map_err(|e| DatabaseError::InsertFailed(format!("Appender failed: {}", e)))?;
                let mut values = vec![Value::Null; table_columns.len()];
                for (index, row) in batch.rows.iter().enumerate() {
                    values.fill(Value::Null);
                    for (cell, &position) in row.iter().zip(&positions) {
                        values[position] = cell_to_value(cell);
                    }
                    let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
                    appender.append_row(params.as_slice()).map_err(|e| {
                        DatabaseError::InsertFailed(format!("Row {}: {}", index + 1, e))
                    })?;
                }
                // Constraints are checked when buffered rows are flushed
                appender
                    .flush()
                    .map_err(|e| DatabaseError::InsertFailed(e.to_string()))?;
            }
            // Dropping an uncommitted transaction rolls it back
            tx.commit()
                .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
            debug!("Appended {} rows to {}", batch.len(), table);
            Ok(batch.len() as u64)
        })
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        let result = self.execute_query("SELECT 1 AS healthy").await?;
        Ok(!result.rows.is_empty())
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::DuckDb
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }

    async fn close(&self) -> DatabaseResult<()> {
        let mut guard = self
            .connection
            .lock()
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Lock error: {}", e)))?;
        if let Some(connection) = guard.take() {
            connection
                .close()
                .map_err(|(_, e)| DatabaseError::ConnectionFailed(format!("Close failed: {}", e)))?;
            debug!("Closed DuckDB connection");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    async fn events_table(backend: &DuckDBBackend) {
        backend
            .execute_ddl(
                "CREATE TABLE \"EVENTS\" (\"ID\" BIGINT, \"LABEL\" VARCHAR, \"DAY\" DATE, \"AT\" TIMESTAMP, \"SCORE\" DOUBLE)",
            )
            .await
            .unwrap();
    }

    fn batch(rows: Vec<Vec<CellValue>>) -> RowBatch {
        RowBatch {
            columns: ["ID", "LABEL", "DAY", "AT", "SCORE"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            rows,
        }
    }

    fn row(id: i64, label: &str) -> Vec<CellValue> {
        let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        vec![
            CellValue::Integer(id),
            CellValue::Text(label.to_string()),
            CellValue::Date(day),
            CellValue::Timestamp(day.and_hms_opt(13, 45, 0).unwrap()),
            CellValue::Float(1.5),
        ]
    }

    #[tokio::test]
    async fn test_in_memory_database() {
        let backend = DuckDBBackend::in_memory().unwrap();
        assert!(backend.is_in_memory());
        assert!(backend.db_path().is_none());
        assert!(backend.health_check().await.unwrap());
        assert_eq!(backend.backend_type(), "duckdb");
        assert_eq!(backend.dialect(), SqlDialect::DuckDb);
    }

    #[tokio::test]
    async fn test_bulk_insert_and_counts() {
        let backend = DuckDBBackend::in_memory().unwrap();
        events_table(&backend).await;

        let inserted = backend
            .bulk_insert("EVENTS", &batch(vec![row(1, "x"), row(2, "y"), row(2, "y")]))
            .await
            .unwrap();
        assert_eq!(inserted, 3);
        assert_eq!(backend.count_rows("EVENTS").await.unwrap(), 3);
        assert_eq!(
            backend
                .count_duplicates("EVENTS", &["ID".to_string()])
                .await
                .unwrap(),
            1
        );

        let sample = backend.sample_rows("EVENTS", 1).await.unwrap();
        assert_eq!(sample.row_count(), 1);
        assert_eq!(sample.rows[0]["DAY"], "2024-02-29");
        assert_eq!(sample.rows[0]["AT"], "2024-02-29 13:45:00");
    }

    #[tokio::test]
    async fn test_failed_batch_commits_nothing() {
        let backend = DuckDBBackend::in_memory().unwrap();
        backend
            .execute_ddl("CREATE TABLE \"STRICT_T\" (\"ID\" BIGINT NOT NULL)")
            .await
            .unwrap();

        let bad = RowBatch {
            columns: vec!["ID".to_string()],
            rows: vec![vec![CellValue::Integer(1)], vec![CellValue::Null]],
        };
        let err = backend.bulk_insert("STRICT_T", &bad).await.unwrap_err();
        assert!(matches!(err, DatabaseError::InsertFailed(_)));
        assert_eq!(backend.count_rows("STRICT_T").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bulk_insert_maps_columns_by_name() {
        let backend = DuckDBBackend::in_memory().unwrap();
        events_table(&backend).await;

        let partial = RowBatch {
            columns: vec!["score".to_string(), "ID".to_string()],
            rows: vec![vec![CellValue::Float(2.5), CellValue::Integer(9)]],
        };
        assert_eq!(backend.bulk_insert("EVENTS", &partial).await.unwrap(), 1);

        let result = backend
            .execute_query("SELECT \"ID\", \"LABEL\", \"SCORE\" FROM \"EVENTS\"")
            .await
            .unwrap();
        assert_eq!(result.rows[0]["ID"], 9);
        assert_eq!(result.rows[0]["LABEL"], serde_json::Value::Null);
        assert_eq!(result.rows[0]["SCORE"], 2.5);

        let unknown = RowBatch {
            columns: vec!["ID".to_string(), "REGION".to_string()],
            rows: vec![vec![CellValue::Integer(1), CellValue::Text("north".to_string())]],
        };
        let err = backend.bulk_insert("EVENTS", &unknown).await.unwrap_err();
        assert!(err.to_string().contains("REGION"));
        assert_eq!(backend.count_rows("EVENTS").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_table_exists_and_truncate() {
        let backend = DuckDBBackend::in_memory().unwrap();
        assert!(!backend.table_exists("EVENTS").await.unwrap());
        events_table(&backend).await;
        assert!(backend.table_exists("EVENTS").await.unwrap());

        backend
            .bulk_insert("EVENTS", &batch(vec![row(1, "x")]))
            .await
            .unwrap();
        backend.truncate_table("EVENTS").await.unwrap();
        assert_eq!(backend.count_rows("EVENTS").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_close_releases_connection() {
        let backend = DuckDBBackend::in_memory().unwrap();
        backend.close().await.unwrap();
        backend.close().await.unwrap();
        assert!(matches!(
            backend.execute_query("SELECT 1").await,
            Err(DatabaseError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dest.duckdb");
        {
            let backend = DuckDBBackend::new(&path).unwrap();
            events_table(&backend).await;
            backend
                .bulk_insert("EVENTS", &batch(vec![row(7, "z")]))
                .await
                .unwrap();
            backend.close().await.unwrap();
        }
        let reopened = DuckDBBackend::new(&path).unwrap();
        assert_eq!(reopened.db_path(), Some(path.as_path()));
        assert_eq!(reopened.count_rows("EVENTS").await.unwrap(), 1);
    }
}
