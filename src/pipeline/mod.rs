//! End-to-end ingestion pipeline
//!
//! Composes schema parsing, provisioning, loading and verification into one
//! run that produces a [`PipelineReport`].
//!
//! # Example
//!
//! ```rust,ignore
//! use semantic_loader::config::LoaderConfig;
//! use semantic_loader::database::DuckDBBackend;
//! use semantic_loader::pipeline::PipelineOrchestrator;
//!
//! let config = LoaderConfig::load(workspace)?;
//! let backend = DuckDBBackend::from_config(&config, workspace)?;
//! let schema_path = config.schema_path(workspace);
//!
//! let report = PipelineOrchestrator::new(config, workspace, backend)
//!     .run(&schema_path)
//!     .await?;
//! println!("{}", report.render_text());
//! ```

mod error;
mod orchestrator;
mod report;

pub use error::{PipelineError, PipelineResult, PipelineState};
pub use orchestrator::PipelineOrchestrator;
pub use report::{DiscoverySummary, PipelineReport, RunSummary};

#[cfg(feature = "duckdb-backend")]
use crate::config::LoaderConfig;
#[cfg(feature = "duckdb-backend")]
use crate::database::DuckDBBackend;

/// Run a full pipeline against the DuckDB destination a configuration names
///
/// This is a convenience function for simple pipeline execution.
#[cfg(feature = "duckdb-backend")]
pub async fn run_pipeline(
    config: LoaderConfig,
    workspace: &std::path::Path,
) -> PipelineResult<PipelineReport> {
    let backend =
        DuckDBBackend::from_config(&config, workspace).map_err(|e| PipelineError::Connection {
            state: PipelineState::Validating,
            message: e.to_string(),
        })?;
    let schema_path = config.schema_path(workspace);
    PipelineOrchestrator::new(config, workspace, backend)
        .run(&schema_path)
        .await
}

#[cfg(all(test, feature = "duckdb-backend"))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_pipeline_in_memory() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("semantic_model.yaml"),
            "name: shop\ntables:\n  - name: orders\n    primary_key: [id]\n    columns:\n      - name: id\n        data_type: integer\n      - name: item\n",
        )
        .unwrap();
        fs::create_dir(temp.path().join("data")).unwrap();
        fs::write(temp.path().join("data/orders_1.csv"), "id,item\n1,pen\n2,ink\n").unwrap();

        let mut config = LoaderConfig::in_memory();
        config.source.directory = "data".to_string();

        let report = run_pipeline(config, temp.path()).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.summary.rows_loaded, 2);
        assert_eq!(
            report.states,
            vec![
                PipelineState::Validating,
                PipelineState::Loading,
                PipelineState::Verifying,
                PipelineState::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_schema_is_fatal() {
        let temp = TempDir::new().unwrap();
        let err = run_pipeline(LoaderConfig::in_memory(), temp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaParse { .. }));
        assert_eq!(err.state(), PipelineState::Validating);
    }
}
