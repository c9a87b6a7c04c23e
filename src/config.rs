//! Loader configuration file support
//!
//! Handles parsing of `.semantic-loader.toml` configuration files and
//! environment variable overrides. The resulting [`LoaderConfig`] is passed
//! explicitly to every component; nothing reads it from global state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::models::{ProvisionMode, StrictMode};
use crate::validation::input::validate_file_pattern;

/// Default configuration filename
pub const CONFIG_FILENAME: &str = ".semantic-loader.toml";

/// Default database filename for DuckDB
pub const DEFAULT_DUCKDB_FILENAME: &str = ".semantic-loader.duckdb";

/// Database path that selects an in-memory destination
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Environment variable for the DuckDB path
pub const ENV_DB_PATH: &str = "SEMANTIC_LOADER_DB_PATH";

/// Environment variable for the source directory
pub const ENV_SOURCE_DIR: &str = "SEMANTIC_LOADER_SOURCE_DIR";

/// Environment variable for the schema document path
pub const ENV_SCHEMA: &str = "SEMANTIC_LOADER_SCHEMA";

/// Environment variable for strict mode ("true"/"false")
pub const ENV_STRICT: &str = "SEMANTIC_LOADER_STRICT";

/// Environment variable for clear-existing mode ("true"/"false")
pub const ENV_CLEAR_EXISTING: &str = "SEMANTIC_LOADER_CLEAR_EXISTING";

/// Error type for configuration handling
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Failed to serialize config: {0}")]
    SerializationError(String),
}

/// Result type for configuration handling
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Destination backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackendType {
    /// DuckDB embedded database (default)
    #[default]
    DuckDB,
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "duckdb" => Ok(DatabaseBackendType::DuckDB),
            _ => Err(format!("Unknown database backend: {}. Use 'duckdb'.", s)),
        }
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::DuckDB => write!(f, "duckdb"),
        }
    }
}

/// Destination section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// Database backend type
    #[serde(default)]
    pub backend: DatabaseBackendType,

    /// Path to the DuckDB file (relative to the working directory), or `:memory:`
    #[serde(default = "default_duckdb_path")]
    pub path: String,
}

fn default_duckdb_path() -> String {
    DEFAULT_DUCKDB_FILENAME.to_string()
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            backend: DatabaseBackendType::default(),
            path: default_duckdb_path(),
        }
    }
}

/// Schema document section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSection {
    /// Path to the schema document
    #[serde(default = "default_schema_path")]
    pub path: String,
}

fn default_schema_path() -> String {
    "semantic_model.yaml".to_string()
}

impl Default for SchemaSection {
    fn default() -> Self {
        Self {
            path: default_schema_path(),
        }
    }
}

/// Source files section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    /// Directory holding the split source files
    #[serde(default = "default_source_dir")]
    pub directory: String,

    /// File extensions considered during discovery
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Field delimiter for `.csv` files
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_source_dir() -> String {
    "data".to_string()
}

fn default_extensions() -> Vec<String> {
    ["csv", "tsv", "json", "jsonl", "ndjson"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            directory: default_source_dir(),
            extensions: default_extensions(),
            delimiter: default_delimiter(),
        }
    }
}

impl SourceSection {
    /// Delimiter byte, if the configured delimiter is a single ASCII character
    pub fn delimiter_byte(&self) -> Option<u8> {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => Some(*b),
            _ => None,
        }
    }
}

/// Load behaviour section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSection {
    /// Truncate every table before loading
    #[serde(default)]
    pub clear_existing: bool,

    /// Turn lenient fallbacks into errors
    #[serde(default)]
    pub strict: bool,

    /// How tables are provisioned before loading
    #[serde(default)]
    pub provision: ProvisionMode,

    /// Rows sampled per table during verification (0 disables sampling)
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

fn default_sample_rows() -> usize {
    5
}

impl Default for LoadSection {
    fn default() -> Self {
        Self {
            clear_existing: false,
            strict: false,
            provision: ProvisionMode::default(),
            sample_rows: default_sample_rows(),
        }
    }
}

/// Columns coerced by name regardless of their declared type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoercionSection {
    #[serde(default)]
    pub date_columns: Vec<String>,
    #[serde(default)]
    pub timestamp_columns: Vec<String>,
    #[serde(default)]
    pub numeric_columns: Vec<String>,
    #[serde(default)]
    pub text_columns: Vec<String>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for CoercionSection {
    fn default() -> Self {
        Self {
            date_columns: strings(&["VIEW_DATE"]),
            timestamp_columns: strings(&["VIEW_TIME"]),
            numeric_columns: strings(&[
                "TOTAL_AMOUNT_SPENT",
                "TOTAL_VIEW_TIME_SEC",
                "TOTAL_VIEW_TIME",
                "DISTINCT_APP_COUNT",
                "VIEW_COUNT",
                "DISTINCT_USER_COUNT",
                "APP_COUNT",
                "USER_COUNT",
            ]),
            text_columns: strings(&["APP_ID", "USER_ID", "COMPANY_ID", "STATUS"]),
        }
    }
}

/// Per-table overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSection {
    /// Filename substrings that route a file to this table
    #[serde(default)]
    pub file_patterns: Vec<String>,

    /// Key columns used for duplicate detection, replacing the declared key
    #[serde(default)]
    pub key_columns: Vec<String>,

    /// Source header spelling (case-insensitive) to canonical column name
    #[serde(default)]
    pub column_mappings: BTreeMap<String, String>,
}

/// Main configuration structure
///
/// Represents the `.semantic-loader.toml` configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoaderConfig {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub schema: SchemaSection,

    #[serde(default)]
    pub source: SourceSection,

    #[serde(default)]
    pub load: LoadSection,

    #[serde(default)]
    pub coercion: CoercionSection,

    /// Per-table overrides keyed by canonical table name
    #[serde(default)]
    pub tables: BTreeMap<String, TableSection>,
}

impl LoaderConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with an in-memory destination, for tests and dry runs
    pub fn in_memory() -> Self {
        Self {
            database: DatabaseSection {
                backend: DatabaseBackendType::DuckDB,
                path: IN_MEMORY_PATH.to_string(),
            },
            ..Default::default()
        }
    }

    /// Load configuration from a working directory
    ///
    /// Looks for `.semantic-loader.toml` in the directory.
    /// Falls back to defaults if not found.
    pub fn load(workspace_path: &Path) -> ConfigResult<Self> {
        Self::load_file(&workspace_path.join(CONFIG_FILENAME))
    }

    /// Load configuration from an explicit file, defaulting when it is absent
    pub fn load_file(config_path: &Path) -> ConfigResult<Self> {
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::IoError(format!("Failed to read config: {}", e)))?;

            Self::parse(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a working directory
    pub fn save(&self, workspace_path: &Path) -> ConfigResult<()> {
        let config_path = workspace_path.join(CONFIG_FILENAME);
        let content = self.to_toml()?;

        std::fs::write(&config_path, content)
            .map_err(|e| ConfigError::IoError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializationError(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            self.database.path = path;
        }

        if let Ok(dir) = std::env::var(ENV_SOURCE_DIR) {
            self.source.directory = dir;
        }

        if let Ok(schema) = std::env::var(ENV_SCHEMA) {
            self.schema.path = schema;
        }

        if let Ok(strict) = std::env::var(ENV_STRICT)
            && let Some(strict) = parse_flag(&strict)
        {
            self.load.strict = strict;
        }

        if let Ok(clear) = std::env::var(ENV_CLEAR_EXISTING)
            && let Some(clear) = parse_flag(&clear)
        {
            self.load.clear_existing = clear;
        }
    }

    pub fn strict_mode(&self) -> StrictMode {
        StrictMode::from_flag(self.load.strict)
    }

    /// Whether the destination is in-memory
    pub fn is_in_memory(&self) -> bool {
        self.database.path == IN_MEMORY_PATH
    }

    /// Get the DuckDB database path for a working directory
    ///
    /// Returns `None` for an in-memory destination.
    pub fn get_duckdb_path(&self, workspace_path: &Path) -> Option<PathBuf> {
        if self.is_in_memory() {
            None
        } else if self.database.path.is_empty() {
            Some(workspace_path.join(DEFAULT_DUCKDB_FILENAME))
        } else {
            Some(resolve(workspace_path, &self.database.path))
        }
    }

    /// Schema document path, resolved against a working directory
    pub fn schema_path(&self, workspace_path: &Path) -> PathBuf {
        resolve(workspace_path, &self.schema.path)
    }

    /// Source directory, resolved against a working directory
    pub fn source_dir(&self, workspace_path: &Path) -> PathBuf {
        resolve(workspace_path, &self.source.directory)
    }

    /// Overrides for a table, matched case-insensitively
    pub fn table(&self, name: &str) -> Option<&TableSection> {
        self.tables
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, section)| section)
    }

    /// Key overrides for every table that declares `key_columns`
    pub fn key_overrides(&self) -> HashMap<String, Vec<String>> {
        self.tables
            .iter()
            .filter(|(_, section)| !section.key_columns.is_empty())
            .map(|(name, section)| (name.to_uppercase(), section.key_columns.clone()))
            .collect()
    }

    /// List configuration problems
    ///
    /// An empty list means the configuration is usable. A missing source
    /// directory is not reported here; discovery records it as a warning.
    pub fn validate(&self, workspace_path: &Path) -> Vec<String> {
        let mut problems = Vec::new();

        let schema_path = self.schema_path(workspace_path);
        if !schema_path.is_file() {
            problems.push(format!(
                "Schema document not found: {}",
                schema_path.display()
            ));
        }

        problems.extend(self.validate_settings());
        problems
    }

    /// List problems that do not depend on the filesystem
    pub fn validate_settings(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.source.delimiter_byte().is_none() {
            problems.push(format!(
                "Delimiter must be a single ASCII character, got '{}'",
                self.source.delimiter
            ));
        }

        if self.source.extensions.is_empty() {
            problems.push("No source file extensions configured".to_string());
        }

        for (name, section) in &self.tables {
            if name.trim().is_empty() {
                problems.push("Table override with an empty name".to_string());
            }
            for pattern in &section.file_patterns {
                if let Err(e) = validate_file_pattern(pattern) {
                    problems.push(format!("Table '{}': {}", name, e));
                }
            }
            for (alias, canonical) in &section.column_mappings {
                if alias.trim().is_empty() || canonical.trim().is_empty() {
                    problems.push(format!(
                        "Table '{}': column mapping entries cannot be empty",
                        name
                    ));
                }
            }
        }

        problems
    }
}

fn resolve(workspace_path: &Path, path: &str) -> PathBuf {
    if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        workspace_path.join(path)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# Semantic Loader Configuration

[database]
# Destination backend: "duckdb"
backend = "duckdb"

# Path to DuckDB database file (relative to this directory, or absolute).
# Use ":memory:" for a throwaway in-memory destination.
path = ".semantic-loader.duckdb"

[schema]
# Semantic schema document describing the tables to provision
path = "semantic_model.yaml"

[source]
# Directory holding the split source files
directory = "data/split_files"
extensions = ["csv", "tsv", "json", "jsonl"]
delimiter = ","

[load]
# Truncate every table before loading instead of appending
clear_existing = false

# Fail on unknown column types and uncoercible values instead of
# falling back to strings and NULLs
strict = false

# "replace", "create_if_missing" or "skip"
provision = "create_if_missing"

# Rows sampled per table after verification (0 disables)
sample_rows = 5

[coercion]
date_columns = ["VIEW_DATE"]
timestamp_columns = ["VIEW_TIME"]
numeric_columns = ["TOTAL_AMOUNT_SPENT", "TOTAL_VIEW_TIME_SEC", "TOTAL_VIEW_TIME", "DISTINCT_APP_COUNT", "VIEW_COUNT", "DISTINCT_USER_COUNT", "APP_COUNT", "USER_COUNT"]
text_columns = ["APP_ID", "USER_ID", "COMPANY_ID", "STATUS"]

[tables.ANON_VIEWS]
file_patterns = ["anon_views"]
key_columns = ["APP_ID", "USER_ID", "VIEW_TIME"]

[tables.ANON_VIEWS.column_mappings]
app_id = "APP_ID"
user_id = "USER_ID"
view_time = "VIEW_TIME"
total_amount_spent = "TOTAL_AMOUNT_SPENT"

[tables.ANON_USER_DAY_FACT]
file_patterns = ["anon_user_day_fact", "user_day_fact"]
key_columns = ["USER_ID", "VIEW_DATE"]

[tables.ANON_USER_DAY_FACT.column_mappings]
total_view_time = "TOTAL_VIEW_TIME_SEC"
app_count = "DISTINCT_APP_COUNT"
view_count = "VIEW_COUNT"

[tables.ANON_COMPANY_DAY_FACT]
file_patterns = ["anon_company_day_fact", "company_day_fact"]
key_columns = ["COMPANY_ID", "VIEW_DATE"]

[tables.ANON_COMPANY_DAY_FACT.column_mappings]
company_status = "STATUS"
status = "STATUS"
user_count = "DISTINCT_USER_COUNT"
app_count = "DISTINCT_APP_COUNT"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::new();
        assert_eq!(config.database.backend, DatabaseBackendType::DuckDB);
        assert_eq!(config.database.path, DEFAULT_DUCKDB_FILENAME);
        assert!(!config.load.clear_existing);
        assert_eq!(config.load.provision, ProvisionMode::CreateIfMissing);
        assert_eq!(config.load.sample_rows, 5);
        assert_eq!(config.coercion.date_columns, vec!["VIEW_DATE"]);
        assert!(config.tables.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[database]
path = ":memory:"

[load]
clear_existing = true
strict = true
provision = "replace"

[tables.events]
file_patterns = ["evt"]
key_columns = ["id"]

[tables.events.column_mappings]
EventId = "ID"
"#;
        let config = LoaderConfig::parse(toml).unwrap();
        assert!(config.is_in_memory());
        assert!(config.load.clear_existing);
        assert_eq!(config.strict_mode(), StrictMode::Strict);
        assert_eq!(config.load.provision, ProvisionMode::Replace);

        let events = config.table("EVENTS").unwrap();
        assert_eq!(events.file_patterns, vec!["evt"]);
        assert_eq!(events.column_mappings.get("EventId").unwrap(), "ID");
        assert_eq!(
            config.key_overrides().get("EVENTS"),
            Some(&vec!["id".to_string()])
        );
    }

    #[test]
    fn test_sample_config_parses() {
        let config = LoaderConfig::parse(sample_config()).unwrap();
        assert_eq!(config.tables.len(), 3);
        let company = config.table("anon_company_day_fact").unwrap();
        assert_eq!(company.column_mappings.get("company_status").unwrap(), "STATUS");
        assert_eq!(company.column_mappings.get("status").unwrap(), "STATUS");
        assert_eq!(config.load.provision, ProvisionMode::CreateIfMissing);
    }

    #[test]
    fn test_to_toml_round_trip() {
        let config = LoaderConfig::parse(sample_config()).unwrap();
        let toml = config.to_toml().unwrap();
        let reparsed = LoaderConfig::parse(&toml).unwrap();
        assert_eq!(reparsed.tables.len(), 3);
        assert_eq!(reparsed.source.directory, "data/split_files");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let mut config = LoaderConfig::new();
        config.source.directory = "incoming".to_string();
        config.save(dir.path()).unwrap();

        let loaded = LoaderConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.source.directory, "incoming");
        assert_eq!(loaded.source_dir(dir.path()), dir.path().join("incoming"));
    }

    #[test]
    fn test_paths() {
        let root = Path::new("/work");
        let config = LoaderConfig::new();
        assert_eq!(
            config.get_duckdb_path(root),
            Some(PathBuf::from("/work/.semantic-loader.duckdb"))
        );
        assert_eq!(LoaderConfig::in_memory().get_duckdb_path(root), None);
        assert_eq!(
            config.schema_path(root),
            PathBuf::from("/work/semantic_model.yaml")
        );
    }

    #[test]
    fn test_validate_reports_problems() {
        let dir = tempdir().unwrap();
        let mut config = LoaderConfig::new();
        config.source.delimiter = ";;".to_string();
        config.tables.insert(
            "T".to_string(),
            TableSection {
                file_patterns: vec!["".to_string()],
                ..Default::default()
            },
        );

        let problems = config.validate(dir.path());
        assert_eq!(problems.len(), 3);
        assert!(problems[0].starts_with("Schema document not found"));

        std::fs::write(dir.path().join("semantic_model.yaml"), "tables: []").unwrap();
        let config = LoaderConfig::new();
        assert!(config.validate(dir.path()).is_empty());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
