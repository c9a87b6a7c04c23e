//! Pipeline errors
//!
//! Only failures that make a run meaningless surface here. Per-file,
//! per-table and per-query problems are recorded in the report instead.

use serde::{Deserialize, Serialize};

use crate::import::SchemaParseError;

/// Pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Validating,
    Loading,
    Verifying,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Validating => "VALIDATING",
            PipelineState::Loading => "LOADING",
            PipelineState::Verifying => "VERIFYING",
            PipelineState::Done => "DONE",
            PipelineState::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}

/// Fatal pipeline error
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Schema document could not be parsed while {state}: {source}")]
    SchemaParse {
        state: PipelineState,
        #[source]
        source: SchemaParseError,
    },

    #[error("Destination unreachable while {state}: {message}")]
    Connection {
        state: PipelineState,
        message: String,
    },

    #[error("Invalid configuration while {state}: {}", .problems.join("; "))]
    Config {
        state: PipelineState,
        problems: Vec<String>,
    },
}

impl PipelineError {
    /// State the run was in when it failed
    pub fn state(&self) -> PipelineState {
        match self {
            PipelineError::SchemaParse { state, .. }
            | PipelineError::Connection { state, .. }
            | PipelineError::Config { state, .. } => *state,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_carries_state() {
        let err = PipelineError::Connection {
            state: PipelineState::Validating,
            message: "refused".to_string(),
        };
        assert_eq!(err.state(), PipelineState::Validating);
        assert_eq!(
            err.to_string(),
            "Destination unreachable while VALIDATING: refused"
        );

        let err = PipelineError::Config {
            state: PipelineState::Validating,
            problems: vec!["a".to_string(), "b".to_string()],
        };
        assert!(err.to_string().ends_with("a; b"));
        assert!(PipelineState::Failed.is_terminal());
    }
}
