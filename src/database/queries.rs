//! SQL used for counting, duplicate detection and maintenance
//!
//! All identifiers are quoted; none of these statements modify data except
//! [`truncate_sql`].

use super::{DatabaseError, DatabaseResult};
use crate::models::SqlDialect;
use crate::validation::input::quote_identifier;

/// Existence check, bound with the table name
pub const TABLE_EXISTS_SQL: &str =
    "SELECT COUNT(*) AS matches FROM information_schema.tables WHERE table_name = ?";

pub fn count_rows_sql(table: &str) -> String {
    format!("SELECT COUNT(*) AS row_count FROM {}", quote_identifier(table))
}

/// Rows minus distinct key tuples
///
/// Distinct tuples are counted through a `SELECT DISTINCT` subquery, so
/// tuples containing NULLs count like any other value.
pub fn duplicate_count_sql(table: &str, key_columns: &[String]) -> DatabaseResult<String> {
    if key_columns.is_empty() {
        return Err(DatabaseError::InvalidInput(format!(
            "No key columns for duplicate check on '{}'",
            table
        )));
    }
    let table = quote_identifier(table);
    let keys = key_columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "SELECT (SELECT COUNT(*) FROM {table}) - (SELECT COUNT(*) FROM (SELECT DISTINCT {keys} FROM {table}) AS key_tuples) AS duplicates"
    ))
}

pub fn sample_sql(table: &str, limit: usize) -> String {
    format!("SELECT * FROM {} LIMIT {}", quote_identifier(table), limit)
}

pub fn truncate_sql(dialect: SqlDialect, table: &str) -> String {
    match dialect {
        SqlDialect::Snowflake => format!("TRUNCATE TABLE {}", quote_identifier(table)),
        SqlDialect::DuckDb => format!("DELETE FROM {}", quote_identifier(table)),
    }
}

/// Add a text column unless the table already has it
pub fn add_column_sql(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} VARCHAR",
        quote_identifier(table),
        quote_identifier(column)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_count_sql() {
        let sql = duplicate_count_sql("T", &["ID".to_string(), "DAY".to_string()]).unwrap();
        assert_eq!(
            sql,
            "SELECT (SELECT COUNT(*) FROM \"T\") - (SELECT COUNT(*) FROM (SELECT DISTINCT \"ID\", \"DAY\" FROM \"T\") AS key_tuples) AS duplicates"
        );
        assert!(duplicate_count_sql("T", &[]).is_err());
    }

    #[test]
    fn test_add_column_sql() {
        assert_eq!(
            add_column_sql("ITEMS", "REGION"),
            "ALTER TABLE \"ITEMS\" ADD COLUMN IF NOT EXISTS \"REGION\" VARCHAR"
        );
    }

    #[test]
    fn test_truncate_per_dialect() {
        assert_eq!(truncate_sql(SqlDialect::Snowflake, "T"), "TRUNCATE TABLE \"T\"");
        assert_eq!(truncate_sql(SqlDialect::DuckDb, "T"), "DELETE FROM \"T\"");
    }
}
