//! Enums for the schema model
//!
//! # Serde Casing Conventions
//!
//! - `snake_case`: keywords that appear in schema documents and config files
//!   (SemanticRole, Aggregation, StrictMode, ProvisionMode)
//! - `lowercase`: dialect names (SqlDialect)
//! - Display string: [`DataType`] round-trips through its canonical spelling
//!   (e.g. `"VARCHAR"`, `"NUMBER(18,2)"`) so serialized models stay readable

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Role a column plays in the semantic model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticRole {
    /// Descriptive attribute
    Dimension,
    /// Temporal attribute
    TimeDimension,
    /// Aggregatable metric (measure)
    Fact,
}

impl SemanticRole {
    /// Type assumed when a column of this role does not declare one
    pub fn default_data_type(&self) -> DataType {
        match self {
            SemanticRole::Dimension => DataType::Varchar(None),
            SemanticRole::TimeDimension => DataType::Timestamp,
            SemanticRole::Fact => DataType::Float,
        }
    }
}

impl fmt::Display for SemanticRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticRole::Dimension => write!(f, "dimension"),
            SemanticRole::TimeDimension => write!(f, "time_dimension"),
            SemanticRole::Fact => write!(f, "fact"),
        }
    }
}

/// Coarse value category used when coercing source values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
    Time,
}

/// Default aggregation for a fact column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Sum,
    Avg,
    Min,
    Max,
    Count,
    CountDistinct,
}

impl std::str::FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "avg" | "average" | "mean" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "count" => Ok(Aggregation::Count),
            "count_distinct" | "countdistinct" => Ok(Aggregation::CountDistinct),
            _ => Err(format!("Unknown aggregation: {}", s)),
        }
    }
}

/// SQL dialect used when rendering DDL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    /// Snowflake warehouse DDL (inline comments, unenforced primary key)
    Snowflake,
    /// Embedded DuckDB destination (default)
    #[default]
    DuckDb,
}

impl std::str::FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "snowflake" => Ok(SqlDialect::Snowflake),
            "duckdb" => Ok(SqlDialect::DuckDb),
            _ => Err(format!(
                "Unknown SQL dialect: {}. Use 'snowflake' or 'duckdb'.",
                s
            )),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlDialect::Snowflake => write!(f, "snowflake"),
            SqlDialect::DuckDb => write!(f, "duckdb"),
        }
    }
}

/// Whether lenient fallbacks are allowed
///
/// Under `Lenient` an unrecognized column type becomes an unbounded string
/// and a value that cannot be coerced becomes NULL. Under `Strict` both are
/// errors: the schema fails to parse, or the whole file fails to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrictMode {
    #[default]
    Lenient,
    Strict,
}

impl StrictMode {
    pub fn from_flag(strict: bool) -> Self {
        if strict {
            StrictMode::Strict
        } else {
            StrictMode::Lenient
        }
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, StrictMode::Strict)
    }
}

/// How tables are provisioned before loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionMode {
    /// Always issue create-or-replace DDL
    Replace,
    /// Only create tables that do not exist yet
    #[default]
    CreateIfMissing,
    /// Never issue DDL
    Skip,
}

impl std::str::FromStr for ProvisionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "replace" => Ok(ProvisionMode::Replace),
            "create_if_missing" => Ok(ProvisionMode::CreateIfMissing),
            "skip" => Ok(ProvisionMode::Skip),
            _ => Err(format!(
                "Unknown provision mode: {}. Use 'replace', 'create-if-missing' or 'skip'.",
                s
            )),
        }
    }
}

/// Declared column type, resolved from the schema document's type spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DataType {
    /// Variable-length string, unbounded when no length is given
    Varchar(Option<u32>),
    Text,
    Integer,
    BigInt,
    Float,
    Double,
    /// Fixed-point number; `NUMBER(p,0)` resolves to [`DataType::Integer`]
    Decimal(Option<(u8, u8)>),
    Boolean,
    Date,
    Timestamp,
    Time,
    Json,
    Array,
    Object,
}

static RE_SIZED_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(varchar|char|character|string|number|numeric|decimal)\s*\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\)$",
    )
    .expect("Invalid regex")
});

/// Largest precision both destinations accept
pub const MAX_DECIMAL_PRECISION: u8 = 38;

fn decimal_bounds(raw: &str, precision: u32, scale: u32) -> (u8, u8) {
    let max = u32::from(MAX_DECIMAL_PRECISION);
    let clamped_precision = precision.clamp(1, max);
    let clamped_scale = scale.min(clamped_precision);
    if (clamped_precision, clamped_scale) != (precision, scale) {
        warn!(
            "Type '{}' is outside DECIMAL({},{}) limits; using DECIMAL({},{})",
            raw, max, max, clamped_precision, clamped_scale
        );
    }
    // Both values are at most 38 here
    (clamped_precision as u8, clamped_scale as u8)
}

impl DataType {
    /// Resolve a type spelling through the fixed lookup table
    ///
    /// Returns `None` for spellings the table does not know; callers decide
    /// whether that falls back to [`DataType::Varchar`] or is an error.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Some(caps) = RE_SIZED_TYPE.captures(trimmed) {
            let base = caps[1].to_lowercase();
            return match base.as_str() {
                "varchar" | "char" | "character" | "string" => {
                    Some(DataType::Varchar(Some(caps[2].parse().ok()?)))
                }
                _ => {
                    // Digit runs too long for u32 are over any limit anyway
                    let precision: u32 = caps[2].parse().unwrap_or(u32::MAX);
                    let scale: u32 = caps
                        .get(3)
                        .map(|m| m.as_str().parse().unwrap_or(u32::MAX))
                        .unwrap_or(0);
                    if scale == 0 {
                        Some(DataType::Integer)
                    } else {
                        Some(DataType::Decimal(Some(decimal_bounds(trimmed, precision, scale))))
                    }
                }
            };
        }

        match trimmed.to_lowercase().as_str() {
            "string" | "varchar" | "char" | "character" => Some(DataType::Varchar(None)),
            "text" => Some(DataType::Text),
            "integer" | "int" | "smallint" | "tinyint" => Some(DataType::Integer),
            "bigint" | "long" => Some(DataType::BigInt),
            "float" | "real" | "float4" | "float8" => Some(DataType::Float),
            "double" | "double precision" => Some(DataType::Double),
            "decimal" | "numeric" | "number" => Some(DataType::Decimal(None)),
            "boolean" | "bool" => Some(DataType::Boolean),
            "date" => Some(DataType::Date),
            "datetime" | "timestamp" | "timestamp_ntz" | "timestamp_ltz" | "timestamp_tz" => {
                Some(DataType::Timestamp)
            }
            "time" => Some(DataType::Time),
            "json" | "variant" => Some(DataType::Json),
            "array" => Some(DataType::Array),
            "object" => Some(DataType::Object),
            _ => None,
        }
    }

    /// Value category used by the coercer
    pub fn semantic_type(&self) -> SemanticType {
        match self {
            DataType::Varchar(_)
            | DataType::Text
            | DataType::Json
            | DataType::Array
            | DataType::Object => SemanticType::String,
            DataType::Integer | DataType::BigInt => SemanticType::Integer,
            DataType::Float | DataType::Double | DataType::Decimal(_) => SemanticType::Float,
            DataType::Boolean => SemanticType::Boolean,
            DataType::Date => SemanticType::Date,
            DataType::Timestamp => SemanticType::Timestamp,
            DataType::Time => SemanticType::Time,
        }
    }

    /// Physical storage type for a dialect
    pub fn storage_type(&self, dialect: SqlDialect) -> String {
        match dialect {
            SqlDialect::Snowflake => match self {
                DataType::Varchar(None) => "VARCHAR(16777216)".to_string(),
                DataType::Varchar(Some(len)) => format!("VARCHAR({})", len),
                DataType::Text => "TEXT".to_string(),
                DataType::Integer => "INTEGER".to_string(),
                DataType::BigInt => "BIGINT".to_string(),
                DataType::Float => "FLOAT".to_string(),
                DataType::Double => "DOUBLE".to_string(),
                DataType::Decimal(None) => "NUMBER".to_string(),
                DataType::Decimal(Some((p, s))) => format!("NUMBER({},{})", p, s),
                DataType::Boolean => "BOOLEAN".to_string(),
                DataType::Date => "DATE".to_string(),
                DataType::Timestamp => "TIMESTAMP_NTZ".to_string(),
                DataType::Time => "TIME".to_string(),
                DataType::Json => "VARIANT".to_string(),
                DataType::Array => "ARRAY".to_string(),
                DataType::Object => "OBJECT".to_string(),
            },
            SqlDialect::DuckDb => match self {
                DataType::Varchar(_) | DataType::Text => "VARCHAR".to_string(),
                // Snowflake INTEGER is NUMBER(38,0); BIGINT keeps the same range here
                DataType::Integer | DataType::BigInt => "BIGINT".to_string(),
                DataType::Float | DataType::Double | DataType::Decimal(None) => {
                    "DOUBLE".to_string()
                }
                DataType::Decimal(Some((p, s))) => format!("DECIMAL({},{})", p, s),
                DataType::Boolean => "BOOLEAN".to_string(),
                DataType::Date => "DATE".to_string(),
                DataType::Timestamp => "TIMESTAMP".to_string(),
                DataType::Time => "TIME".to_string(),
                DataType::Json | DataType::Array | DataType::Object => "VARCHAR".to_string(),
            },
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Varchar(None) => write!(f, "VARCHAR"),
            DataType::Varchar(Some(len)) => write!(f, "VARCHAR({})", len),
            DataType::Text => write!(f, "TEXT"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Decimal(None) => write!(f, "DECIMAL"),
            DataType::Decimal(Some((p, s))) => write!(f, "NUMBER({},{})", p, s),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Time => write!(f, "TIME"),
            DataType::Json => write!(f, "JSON"),
            DataType::Array => write!(f, "ARRAY"),
            DataType::Object => write!(f, "OBJECT"),
        }
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for DataType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DataType::parse(&value).ok_or_else(|| format!("Unknown data type: {}", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_spellings() {
        assert_eq!(DataType::parse("string"), Some(DataType::Varchar(None)));
        assert_eq!(DataType::parse("VARCHAR"), Some(DataType::Varchar(None)));
        assert_eq!(DataType::parse("int"), Some(DataType::Integer));
        assert_eq!(DataType::parse("Timestamp_NTZ"), Some(DataType::Timestamp));
        assert_eq!(DataType::parse("datetime"), Some(DataType::Timestamp));
        assert_eq!(DataType::parse("bool"), Some(DataType::Boolean));
        assert_eq!(DataType::parse("json"), Some(DataType::Json));
    }

    #[test]
    fn test_parse_sized_types() {
        assert_eq!(
            DataType::parse("VARCHAR(255)"),
            Some(DataType::Varchar(Some(255)))
        );
        assert_eq!(DataType::parse("NUMBER(38,0)"), Some(DataType::Integer));
        assert_eq!(
            DataType::parse("number(18, 2)"),
            Some(DataType::Decimal(Some((18, 2))))
        );
    }

    #[test]
    fn test_oversized_decimal_is_clamped() {
        assert_eq!(
            DataType::parse("number(50,2)"),
            Some(DataType::Decimal(Some((38, 2))))
        );
        assert_eq!(
            DataType::parse("NUMERIC(300, 4)"),
            Some(DataType::Decimal(Some((38, 4))))
        );
        assert_eq!(
            DataType::parse("decimal(10,12)"),
            Some(DataType::Decimal(Some((10, 10))))
        );
        assert_eq!(DataType::parse("number(99999999999,0)"), Some(DataType::Integer));
        assert_eq!(
            DataType::parse("number(50,2)")
                .unwrap()
                .storage_type(SqlDialect::DuckDb),
            "DECIMAL(38,2)"
        );
    }

    #[test]
    fn test_parse_unknown_spelling() {
        assert_eq!(DataType::parse("geography"), None);
        assert_eq!(DataType::parse(""), None);
    }

    #[test]
    fn test_storage_types_per_dialect() {
        let unbounded = DataType::Varchar(None);
        assert_eq!(
            unbounded.storage_type(SqlDialect::Snowflake),
            "VARCHAR(16777216)"
        );
        assert_eq!(unbounded.storage_type(SqlDialect::DuckDb), "VARCHAR");
        assert_eq!(
            DataType::Timestamp.storage_type(SqlDialect::Snowflake),
            "TIMESTAMP_NTZ"
        );
        assert_eq!(DataType::Json.storage_type(SqlDialect::Snowflake), "VARIANT");
        assert_eq!(DataType::Integer.storage_type(SqlDialect::DuckDb), "BIGINT");
    }

    #[test]
    fn test_role_defaults() {
        assert_eq!(
            SemanticRole::Dimension.default_data_type(),
            DataType::Varchar(None)
        );
        assert_eq!(
            SemanticRole::TimeDimension.default_data_type(),
            DataType::Timestamp
        );
        assert_eq!(SemanticRole::Fact.default_data_type(), DataType::Float);
    }

    #[test]
    fn test_data_type_serde_round_trip() {
        let json = serde_json::to_string(&DataType::Decimal(Some((10, 2)))).unwrap();
        assert_eq!(json, "\"NUMBER(10,2)\"");
        let back: DataType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DataType::Decimal(Some((10, 2))));
    }

    #[test]
    fn test_aggregation_and_modes_from_str() {
        assert_eq!("SUM".parse::<Aggregation>().unwrap(), Aggregation::Sum);
        assert_eq!(
            "count_distinct".parse::<Aggregation>().unwrap(),
            Aggregation::CountDistinct
        );
        assert!("median".parse::<Aggregation>().is_err());
        assert_eq!(
            "create-if-missing".parse::<ProvisionMode>().unwrap(),
            ProvisionMode::CreateIfMissing
        );
        assert_eq!(
            "snowflake".parse::<SqlDialect>().unwrap(),
            SqlDialect::Snowflake
        );
    }
}
