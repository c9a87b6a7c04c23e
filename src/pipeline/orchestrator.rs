//! Pipeline orchestration
//!
//! A run walks VALIDATING -> LOADING -> VERIFYING -> DONE. Only a schema
//! document that cannot be parsed, an unusable configuration, or an
//! unreachable destination stop it; everything else is recorded in the
//! [`PipelineReport`]. The destination is closed on every exit path.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::error::{PipelineError, PipelineResult, PipelineState};
use super::report::{DiscoverySummary, PipelineReport, RunSummary};
use crate::config::LoaderConfig;
use crate::database::DatabaseBackend;
use crate::import::SchemaDefinitionParser;
use crate::ingest::{BulkLoader, DiscoveryReport, FileDiscovery};
use crate::models::SchemaDefinition;
use crate::provision::TableProvisioner;
use crate::verify::IntegrityVerifier;

/// Drives one pipeline run against one destination
///
/// The orchestrator owns the backend and releases it when the run ends, so
/// each run consumes the orchestrator.
pub struct PipelineOrchestrator<B: DatabaseBackend> {
    config: LoaderConfig,
    workspace: PathBuf,
    backend: B,
}

impl<B: DatabaseBackend> PipelineOrchestrator<B> {
    /// `workspace` anchors the relative paths of the configuration
    pub fn new(config: LoaderConfig, workspace: impl Into<PathBuf>, backend: B) -> Self {
        Self {
            config,
            workspace: workspace.into(),
            backend,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Provision, load and verify every table of a schema document
    pub async fn run(self, schema_path: &Path) -> PipelineResult<PipelineReport> {
        let result = self.execute(schema_path, true).await;
        self.shutdown(&result).await;
        result
    }

    /// Verify the destination against the source files without loading
    pub async fn verify_only(self, schema_path: &Path) -> PipelineResult<PipelineReport> {
        let result = self.execute(schema_path, false).await;
        self.shutdown(&result).await;
        result
    }

    async fn shutdown(&self, result: &PipelineResult<PipelineReport>) {
        if let Err(e) = result {
            error!(
                "Pipeline {} in {}: {}",
                PipelineState::Failed,
                e.state(),
                e
            );
        }
        if let Err(e) = self.backend.close().await {
            warn!("Failed to close {} destination: {}", self.backend.backend_type(), e);
        }
    }

    async fn execute(&self, schema_path: &Path, load: bool) -> PipelineResult<PipelineReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut states = vec![PipelineState::Validating];
        info!("Pipeline run {} started ({})", run_id, PipelineState::Validating);

        let (schema, discovery) = self.validate(schema_path).await?;

        let mut provisioning = Vec::new();
        let mut loads = Vec::new();
        let clear_existing = load && self.config.load.clear_existing;
        if load {
            states.push(PipelineState::Loading);
            info!("{}: {} table(s)", PipelineState::Loading, schema.tables.len());

            let provisioner = TableProvisioner::for_backend(&self.backend, self.config.load.provision);
            provisioning = provisioner.provision(&self.backend, &schema).await;

            let loader = BulkLoader::from_config(&self.config);
            loads = loader.load_all(&self.backend, &schema, &discovery).await;
        }

        states.push(PipelineState::Verifying);
        info!("{}", PipelineState::Verifying);
        let verification = IntegrityVerifier::from_config(&self.config)
            .verify(&self.backend, &schema, &discovery, &loads)
            .await;

        states.push(PipelineState::Done);
        let mut report = PipelineReport {
            run_id,
            model: schema.name.clone(),
            version: schema.version.clone(),
            started_at,
            finished_at: Utc::now(),
            states,
            clear_existing,
            discovery: DiscoverySummary::from(&discovery),
            provisioning,
            loads,
            verification,
            summary: RunSummary::default(),
        };
        report.summarize();

        info!(
            "Pipeline run {} {}: {}/{} tables PERFECT, {} rows loaded",
            run_id,
            PipelineState::Done,
            report.summary.perfect_tables,
            report.summary.total_tables,
            report.summary.rows_loaded
        );
        Ok(report)
    }

    async fn validate(
        &self,
        schema_path: &Path,
    ) -> PipelineResult<(SchemaDefinition, DiscoveryReport)> {
        let state = PipelineState::Validating;

        let schema = SchemaDefinitionParser::new()
            .with_strict_mode(self.config.strict_mode())
            .with_key_overrides(self.config.key_overrides())
            .parse_file(schema_path)
            .map_err(|source| PipelineError::SchemaParse { state, source })?;

        let problems = self.config.validate_settings();
        if !problems.is_empty() {
            return Err(PipelineError::Config { state, problems });
        }

        match self.backend.health_check().await {
            Ok(true) => {}
            Ok(false) => {
                return Err(PipelineError::Connection {
                    state,
                    message: "health check returned no rows".to_string(),
                });
            }
            Err(e) => {
                return Err(PipelineError::Connection {
                    state,
                    message: e.to_string(),
                });
            }
        }

        let discovery = FileDiscovery::from_config(&schema, &self.config)
            .discover(&schema, &self.config.source_dir(&self.workspace))
            .map_err(|e| PipelineError::Config {
                state,
                problems: vec![e.to_string()],
            })?;

        Ok((schema, discovery))
    }
}
