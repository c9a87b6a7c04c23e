//! Integrity classification

use serde::{Deserialize, Serialize};

/// Post-load integrity of one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityStatus {
    Perfect,
    DuplicatesFound,
    CountMismatch,
    Unknown,
}

impl IntegrityStatus {
    pub fn is_perfect(&self) -> bool {
        *self == IntegrityStatus::Perfect
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityStatus::Perfect => "PERFECT",
            IntegrityStatus::DuplicatesFound => "DUPLICATES_FOUND",
            IntegrityStatus::CountMismatch => "COUNT_MISMATCH",
            IntegrityStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for IntegrityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify a table from its counts
///
/// `None` marks a count that could not be obtained. A count mismatch is
/// reported ahead of duplicates; a known mismatch does not need the
/// duplicate count.
pub fn classify(
    local: Option<u64>,
    destination: Option<u64>,
    duplicates: Option<u64>,
) -> IntegrityStatus {
    match (local, destination, duplicates) {
        (Some(l), Some(d), _) if l != d => IntegrityStatus::CountMismatch,
        (Some(_), Some(_), Some(0)) => IntegrityStatus::Perfect,
        (Some(_), Some(_), Some(_)) => IntegrityStatus::DuplicatesFound,
        _ => IntegrityStatus::Unknown,
    }
}
