//! Value coercion from source text to typed cells.
//!
//! Target types come from two places. Column names listed in the
//! `[coercion]` config section are coerced as listed, whatever the schema
//! declares; every other column follows its declared [`DataType`]. Columns
//! that are not in the schema stay text.
//!
//! A value that cannot be coerced becomes [`CellValue::Null`] and is counted
//! in the [`CoercionReport`]; under [`StrictMode::Strict`] the first such
//! value fails the batch instead.
//!
//! [`DataType`]: crate::models::DataType

use crate::config::CoercionSection;
use crate::models::{CellValue, RowBatch, SemanticType, StrictMode, TableSchema};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Spellings read as a missing value in every column
pub const MISSING_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NULL", "null", "NaN", "nan", "None", "<NA>", "#N/A",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%Y%m%d"];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const TIMESTAMP_TZ_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f %z"];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

const MAX_FAILURE_SAMPLES: usize = 10;

/// Column-name driven coercion lists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoercionRules {
    date: HashSet<String>,
    timestamp: HashSet<String>,
    numeric: HashSet<String>,
    text: HashSet<String>,
}

fn upper_set(values: &[String]) -> HashSet<String> {
    values.iter().map(|v| v.trim().to_uppercase()).collect()
}

impl CoercionRules {
    /// Rules with no named columns; every column follows its declared type
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_section(section: &CoercionSection) -> Self {
        Self {
            date: upper_set(&section.date_columns),
            timestamp: upper_set(&section.timestamp_columns),
            numeric: upper_set(&section.numeric_columns),
            text: upper_set(&section.text_columns),
        }
    }

    /// Named override for a column, if any
    ///
    /// `declared` is the schema's type for the column; it only decides
    /// between integer and float for numeric columns.
    fn named_type(&self, column: &str, declared: Option<SemanticType>) -> Option<SemanticType> {
        if self.date.contains(column) {
            Some(SemanticType::Date)
        } else if self.timestamp.contains(column) {
            Some(SemanticType::Timestamp)
        } else if self.numeric.contains(column) {
            match declared {
                Some(SemanticType::Integer) => Some(SemanticType::Integer),
                _ => Some(SemanticType::Float),
            }
        } else if self.text.contains(column) {
            Some(SemanticType::String)
        } else {
            None
        }
    }
}

/// A value that could not be coerced
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("row {row}, column '{column}': cannot read '{value}' as {target:?}")]
pub struct CoercionFailure {
    /// Zero-based data row index
    pub row: usize,
    pub column: String,
    pub value: String,
    pub target: SemanticType,
}

/// Per-batch coercion summary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoercionReport {
    /// Values replaced by NULL
    pub failures: usize,
    /// Failures per column
    pub by_column: BTreeMap<String, usize>,
    /// First few failures, for the log and the report
    pub samples: Vec<CoercionFailure>,
}

impl CoercionReport {
    fn record(&mut self, failure: CoercionFailure) {
        self.failures += 1;
        *self.by_column.entry(failure.column.clone()).or_insert(0) += 1;
        if self.samples.len() < MAX_FAILURE_SAMPLES {
            self.samples.push(failure);
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

/// Converts raw text rows into typed [`RowBatch`]es
#[derive(Debug, Clone, Default)]
pub struct TypeCoercer {
    rules: CoercionRules,
    strict: StrictMode,
}

impl TypeCoercer {
    pub fn new(rules: CoercionRules, strict: StrictMode) -> Self {
        Self { rules, strict }
    }

    /// Target type for each column of a batch
    pub fn plan(&self, table: &TableSchema, columns: &[String]) -> Vec<SemanticType> {
        columns
            .iter()
            .map(|name| {
                let declared = table.column(name).map(|c| c.data_type.semantic_type());
                self.rules
                    .named_type(name, declared)
                    .or(declared)
                    .unwrap_or(SemanticType::String)
            })
            .collect()
    }

    /// Coerce a single raw value
    pub fn coerce_value(raw: &str, target: SemanticType) -> Option<CellValue> {
        if MISSING_MARKERS.contains(&raw.trim()) {
            return Some(CellValue::Null);
        }
        let value = raw.trim();
        match target {
            SemanticType::String => Some(CellValue::Text(raw.to_string())),
            SemanticType::Integer => parse_integer(value).map(CellValue::Integer),
            SemanticType::Float => parse_float(value).map(CellValue::Float),
            SemanticType::Boolean => parse_boolean(value).map(CellValue::Boolean),
            SemanticType::Date => parse_date(value).map(CellValue::Date),
            SemanticType::Timestamp => parse_timestamp(value).map(CellValue::Timestamp),
            SemanticType::Time => parse_time(value).map(CellValue::Time),
        }
    }

    /// Coerce every row of a column-reconciled batch
    ///
    /// Rows shorter than `columns` are padded with NULLs and longer rows are
    /// truncated; the readers reject ragged input before it gets here.
    pub fn coerce_batch(
        &self,
        table: &TableSchema,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Result<(RowBatch, CoercionReport), CoercionFailure> {
        let plan = self.plan(table, &columns);
        let mut report = CoercionReport::default();
        let mut batch = RowBatch::new(columns);
        batch.rows.reserve(rows.len());

        for (row_index, raw_row) in rows.into_iter().enumerate() {
            let mut row = Vec::with_capacity(plan.len());
            for (position, target) in plan.iter().enumerate() {
                let raw = raw_row.get(position).map(String::as_str).unwrap_or("");
                match Self::coerce_value(raw, *target) {
                    Some(value) => row.push(value),
                    None => {
                        let failure = CoercionFailure {
                            row: row_index,
                            column: batch.columns[position].clone(),
                            value: raw.to_string(),
                            target: *target,
                        };
                        if self.strict.is_strict() {
                            return Err(failure);
                        }
                        debug!("Coercion failed in table '{}': {}", table.name, failure);
                        report.record(failure);
                        row.push(CellValue::Null);
                    }
                }
            }
            batch.rows.push(row);
        }

        Ok((batch, report))
    }
}

fn parse_integer(value: &str) -> Option<i64> {
    if let Ok(i) = value.parse::<i64>() {
        return Some(i);
    }
    let f = value.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_float(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_boolean(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| parse_timestamp(value).map(|ts| ts.date()))
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            TIMESTAMP_TZ_FORMATS
                .iter()
                .find_map(|fmt| DateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.naive_utc())
        })
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
}
