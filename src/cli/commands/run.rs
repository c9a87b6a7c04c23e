//! Pipeline CLI commands
//!
//! `run` provisions, loads and verifies; `verify` only verifies.

use std::path::PathBuf;

use tracing::info;

use super::{ConfigArgs, open_backend, runtime};
use crate::cli::error::CliError;
use crate::pipeline::{PipelineOrchestrator, PipelineReport};

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            _ => Err(format!("Unknown report format: {}. Use 'text' or 'json'.", s)),
        }
    }
}

/// Run and verify command arguments
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub config: ConfigArgs,
    pub format: ReportFormat,
    /// Also write the JSON report to this file
    pub report: Option<PathBuf>,
    /// Exit non-zero when any table is not PERFECT
    pub fail_on_issues: bool,
}

/// Provision, load and verify every table
pub fn handle_run(args: &RunArgs) -> Result<(), CliError> {
    execute(args, true)
}

/// Verify the destination against the source files without loading
pub fn handle_verify(args: &RunArgs) -> Result<(), CliError> {
    execute(args, false)
}

fn execute(args: &RunArgs, load: bool) -> Result<(), CliError> {
    let workspace = &args.config.workspace;
    let config = args.config.resolve()?;
    let schema_path = config.schema_path(workspace);
    if !schema_path.exists() {
        return Err(CliError::FileNotFound(schema_path));
    }

    let rt = runtime()?;
    let report = rt.block_on(async {
        let backend = open_backend(&config, workspace)?;
        let orchestrator = PipelineOrchestrator::new(config, workspace.clone(), backend);
        let report = if load {
            orchestrator.run(&schema_path).await?
        } else {
            orchestrator.verify_only(&schema_path).await?
        };
        Ok::<PipelineReport, CliError>(report)
    })?;

    emit(&report, args)?;

    if args.fail_on_issues && report.has_issues() {
        let failing = report.summary.total_tables - report.summary.perfect_tables;
        return Err(CliError::IssuesFound(failing.max(1)));
    }
    Ok(())
}

fn emit(report: &PipelineReport, args: &RunArgs) -> Result<(), CliError> {
    let json = || {
        report
            .to_json()
            .map_err(|e| CliError::IoError(format!("Failed to serialize report: {}", e)))
    };

    match args.format {
        ReportFormat::Text => println!("{}", report.render_text()),
        ReportFormat::Json => println!("{}", json()?),
    }

    if let Some(path) = &args.report {
        std::fs::write(path, json()?)
            .map_err(|e| CliError::FileWriteError(path.clone(), e.to_string()))?;
        info!("Report written to {}", path.display());
    }
    Ok(())
}
