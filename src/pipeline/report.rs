//! Pipeline run report

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::error::PipelineState;
use crate::database::{OutputFormat, QueryResult, format_query_result};
use crate::ingest::{DiscoveryConflict, DiscoveryReport, LoadResult};
use crate::provision::ProvisionOutcome;
use crate::verify::VerificationReport;

/// Discovery figures kept in the report
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoverySummary {
    pub source_dir: PathBuf,
    pub files_matched: usize,
    pub unmatched: Vec<PathBuf>,
    pub conflicts: Vec<DiscoveryConflict>,
    pub warnings: Vec<String>,
}

impl From<&DiscoveryReport> for DiscoverySummary {
    fn from(report: &DiscoveryReport) -> Self {
        Self {
            source_dir: report.source_dir.clone(),
            files_matched: report.total_files(),
            unmatched: report.unmatched.clone(),
            conflicts: report.conflicts.clone(),
            warnings: report.warnings.clone(),
        }
    }
}

/// Headline numbers for a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_tables: usize,
    pub perfect_tables: usize,
    pub rows_loaded: u64,
    pub files_attempted: usize,
    pub files_failed: usize,
    pub tables_failed_to_provision: usize,
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub model: String,
    pub version: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// States visited, in order
    pub states: Vec<PipelineState>,
    pub clear_existing: bool,
    pub discovery: DiscoverySummary,
    pub provisioning: Vec<ProvisionOutcome>,
    pub loads: Vec<LoadResult>,
    pub verification: VerificationReport,
    pub summary: RunSummary,
}

impl PipelineReport {
    pub(crate) fn summarize(&mut self) {
        self.summary = RunSummary {
            total_tables: self.verification.tables.len(),
            perfect_tables: self.verification.summary.perfect,
            rows_loaded: self.loads.iter().map(|l| l.rows_loaded).sum(),
            files_attempted: self.loads.iter().map(|l| l.files_attempted).sum(),
            files_failed: self.loads.iter().map(|l| l.files_failed).sum(),
            tables_failed_to_provision: self.provisioning.iter().filter(|p| p.is_failed()).count(),
        };
    }

    /// Every table verified PERFECT
    pub fn is_success(&self) -> bool {
        self.summary.total_tables > 0 && self.summary.perfect_tables == self.summary.total_tables
    }

    /// Anything a caller may want to fail on
    pub fn has_issues(&self) -> bool {
        !self.is_success()
            || self.summary.files_failed > 0
            || self.summary.tables_failed_to_provision > 0
            || !self.discovery.conflicts.is_empty()
    }

    pub fn duration_string(&self) -> String {
        let millis = (self.finished_at - self.started_at).num_milliseconds().max(0);
        if millis < 1000 {
            format!("{}ms", millis)
        } else {
            format!("{:.1}s", millis as f64 / 1000.0)
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn loads_table(&self) -> QueryResult {
        QueryResult::new(
            ["table", "rows_loaded", "files", "failed", "cleared"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            self.loads
                .iter()
                .map(|l| {
                    serde_json::json!({
                        "table": l.table,
                        "rows_loaded": l.rows_loaded,
                        "files": l.files_attempted,
                        "failed": l.files_failed,
                        "cleared": l.cleared,
                    })
                })
                .collect(),
        )
    }

    /// Aligned text rendering
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "Run {} for model '{}'{}\n",
            self.run_id,
            self.model,
            self.version
                .as_ref()
                .map(|v| format!(" v{}", v))
                .unwrap_or_default()
        );
        out.push_str(&format!(
            "Mode: {}, finished in {}\n",
            if self.clear_existing {
                "clear existing"
            } else {
                "append"
            },
            self.duration_string()
        ));

        for outcome in self.provisioning.iter().filter(|p| p.is_failed()) {
            out.push_str(&format!(
                "Provisioning failed for {}: {}\n",
                outcome.table,
                outcome.error.as_deref().unwrap_or("unknown error")
            ));
        }
        for conflict in &self.discovery.conflicts {
            out.push_str(&format!(
                "Not loaded, matches several tables ({}): {}\n",
                conflict.tables.join(", "),
                conflict.file.display()
            ));
        }

        if !self.loads.is_empty() {
            out.push_str("\nLoad\n");
            out.push_str(&format_query_result(&self.loads_table(), OutputFormat::Table));
            out.push('\n');
            for load in &self.loads {
                for file in load.files.iter().filter(|f| !f.succeeded()) {
                    out.push_str(&format!(
                        "  failed: {} ({})\n",
                        file.path.display(),
                        file.error.as_deref().unwrap_or_default()
                    ));
                }
                if let Some(e) = &load.error {
                    out.push_str(&format!("  skipped {}: {}\n", load.table, e));
                }
            }
        }

        out.push_str("\nIntegrity\n");
        out.push_str(&self.verification.render_text());
        out.push('\n');
        out
    }
}
