//! SQL query CLI command
//!
//! Provides a command to execute SQL queries against the destination database.

use super::{ConfigArgs, open_backend, runtime};
use crate::cli::error::CliError;
use crate::database::{DatabaseBackend, OutputFormat, format_query_result};

/// Query command arguments
#[derive(Debug, Clone)]
pub struct QueryArgs {
    /// SQL query to execute
    pub sql: String,
    pub config: ConfigArgs,
    /// Output format
    pub format: String,
}

/// Execute a SQL query against the destination database
pub fn handle_query(args: &QueryArgs) -> Result<(), CliError> {
    let workspace_path = &args.config.workspace;
    let config = args.config.resolve()?;

    if config.is_in_memory() {
        return Err(CliError::InvalidArgument(
            "An in-memory database has nothing to query; set database.path".to_string(),
        ));
    }
    if let Some(path) = config.get_duckdb_path(workspace_path)
        && !path.exists()
    {
        return Err(CliError::InvalidArgument(format!(
            "Database {} does not exist. Run 'run' first.",
            path.display()
        )));
    }

    // Parse output format
    let output_format: OutputFormat = args
        .format
        .parse()
        .map_err(|e: String| CliError::InvalidArgument(e))?;

    let rt = runtime()?;

    rt.block_on(async {
        let backend = open_backend(&config, workspace_path)?;

        let result = backend
            .execute_query(&args.sql)
            .await
            .map_err(|e| CliError::DatabaseError(format!("Query failed: {}", e)));

        if let Err(e) = backend.close().await {
            tracing::warn!("Failed to close database: {}", e);
        }
        let result = result?;

        println!("{}", format_query_result(&result, output_format));

        // Print execution time for non-JSON formats
        if output_format != OutputFormat::Json {
            eprintln!("\nExecution time: {}ms", result.execution_time_ms);
        }

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_query_requires_existing_database() {
        let temp = TempDir::new().unwrap();
        let err = handle_query(&QueryArgs {
            sql: "SELECT 1".to_string(),
            config: ConfigArgs::new(temp.path()),
            format: "table".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }

    #[test]
    fn test_invalid_format() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("semantic_model.yaml"), "tables: []").unwrap();
        let mut config = ConfigArgs::new(temp.path());
        config.database = Some("db.duckdb".to_string());
        crate::database::DuckDBBackend::new(temp.path().join("db.duckdb")).unwrap();

        let err = handle_query(&QueryArgs {
            sql: "SELECT 1".to_string(),
            config,
            format: "xml".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }
}
