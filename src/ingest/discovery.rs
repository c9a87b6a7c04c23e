//! Source file discovery
//!
//! Every table gets an explicit rule table of filename patterns: its own
//! lowercase name, the `file_patterns` from its `[tables.<NAME>]` config
//! section, and any `file_patterns` declared in the schema document. A file
//! belongs to the table whose longest pattern occurs in its file name
//! (case-insensitive). When two tables tie at that length the file is a
//! [`DiscoveryConflict`] and is loaded nowhere.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::IngestError;
use super::reader::sorted;
use crate::config::LoaderConfig;
use crate::models::SchemaDefinition;

/// Where a pattern came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    TableName,
    Config,
    Document,
}

/// One filename pattern for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRule {
    pub table: String,
    /// Lowercase substring matched against file names
    pub pattern: String,
    pub source: RuleSource,
}

/// Result of matching one file name against the rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileMatch {
    Table(String),
    /// Several tables matched with patterns of the same length
    Conflict(Vec<String>),
    Unmatched,
}

/// Priority-ordered filename rules for every table of a schema
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<FileRule>,
}

impl RuleTable {
    /// Build rules for every table of a schema
    pub fn build(schema: &SchemaDefinition, config: &LoaderConfig) -> Self {
        let mut table = Self::default();
        for schema_table in &schema.tables {
            table.add(&schema_table.name, &schema_table.name, RuleSource::TableName);
            if let Some(section) = config.table(&schema_table.name) {
                for pattern in &section.file_patterns {
                    table.add(&schema_table.name, pattern, RuleSource::Config);
                }
            }
            for pattern in &schema_table.file_patterns {
                table.add(&schema_table.name, pattern, RuleSource::Document);
            }
        }
        table
    }

    /// Add a rule; blank patterns and repeats for the same table are ignored
    pub fn add(&mut self, table: &str, pattern: &str, source: RuleSource) {
        let pattern = pattern.trim().to_lowercase();
        let table = table.trim().to_uppercase();
        if pattern.is_empty()
            || self
                .rules
                .iter()
                .any(|r| r.table == table && r.pattern == pattern)
        {
            return;
        }
        self.rules.push(FileRule {
            table,
            pattern,
            source,
        });
        // Longest first, then by table for a stable order
        self.rules.sort_by(|a, b| {
            b.pattern
                .len()
                .cmp(&a.pattern.len())
                .then_with(|| a.table.cmp(&b.table))
                .then_with(|| a.pattern.cmp(&b.pattern))
        });
    }

    pub fn rules(&self) -> &[FileRule] {
        &self.rules
    }

    pub fn rules_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a FileRule> + 'a {
        self.rules
            .iter()
            .filter(move |r| r.table.eq_ignore_ascii_case(table))
    }

    /// Match a file name (not a full path)
    pub fn match_file(&self, file_name: &str) -> FileMatch {
        let name = file_name.to_lowercase();
        let mut matching = self.rules.iter().filter(|r| name.contains(&r.pattern));

        let Some(best) = matching.next() else {
            return FileMatch::Unmatched;
        };

        let mut tables: BTreeSet<&str> = BTreeSet::new();
        tables.insert(best.table.as_str());
        for rule in matching.take_while(|r| r.pattern.len() == best.pattern.len()) {
            tables.insert(rule.table.as_str());
        }

        if tables.len() == 1 {
            FileMatch::Table(best.table.clone())
        } else {
            FileMatch::Conflict(tables.into_iter().map(str::to_string).collect())
        }
    }
}

/// A table and the files assigned to it, in load order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceFileGroup {
    pub table: String,
    pub files: Vec<PathBuf>,
}

impl SourceFileGroup {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            files: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A file matched equally well by several tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryConflict {
    pub file: PathBuf,
    pub tables: Vec<String>,
}

/// Files found in the source directory, bucketed by table
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    pub source_dir: PathBuf,
    /// One group per schema table, in schema order
    pub groups: Vec<SourceFileGroup>,
    pub unmatched: Vec<PathBuf>,
    pub conflicts: Vec<DiscoveryConflict>,
    pub warnings: Vec<String>,
}

impl DiscoveryReport {
    pub fn group(&self, table: &str) -> Option<&SourceFileGroup> {
        self.groups
            .iter()
            .find(|g| g.table.eq_ignore_ascii_case(table))
    }

    /// Files assigned to a table; empty for unknown tables
    pub fn files_for(&self, table: &str) -> &[PathBuf] {
        self.group(table).map(|g| g.files.as_slice()).unwrap_or(&[])
    }

    pub fn total_files(&self) -> usize {
        self.groups.iter().map(|g| g.files.len()).sum()
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Finds source files and assigns them to tables
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    rules: RuleTable,
    extensions: Vec<String>,
}

impl FileDiscovery {
    pub fn new(rules: RuleTable, extensions: Vec<String>) -> Self {
        Self { rules, extensions }
    }

    pub fn from_config(schema: &SchemaDefinition, config: &LoaderConfig) -> Self {
        Self::new(
            RuleTable::build(schema, config),
            config.source.extensions.clone(),
        )
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// List candidate files directly inside a directory, sorted by path
    ///
    /// Extensions match regardless of case.
    pub fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
        let options = glob::MatchOptions {
            case_sensitive: false,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        let mut files = Vec::new();
        for extension in &self.extensions {
            let extension = extension.trim().trim_start_matches('.');
            let pattern = format!("{}/*.{}", glob::Pattern::escape(&dir.to_string_lossy()), extension);
            let entries = glob::glob_with(&pattern, options)
                .map_err(|e| IngestError::InvalidPattern(format!("{}: {}", pattern, e)))?;
            for entry in entries {
                match entry {
                    Ok(path) if path.is_file() => files.push(path),
                    Ok(_) => {}
                    Err(e) => warn!("Error accessing path: {}", e),
                }
            }
        }
        Ok(sorted(files))
    }

    /// Discover and group the files of a source directory
    ///
    /// A missing directory is not an error: every table gets an empty group
    /// and the report carries a warning.
    pub fn discover(
        &self,
        schema: &SchemaDefinition,
        dir: &Path,
    ) -> Result<DiscoveryReport, IngestError> {
        let mut report = DiscoveryReport {
            source_dir: dir.to_path_buf(),
            groups: schema
                .tables
                .iter()
                .map(|t| SourceFileGroup::new(&t.name))
                .collect(),
            ..Default::default()
        };

        if !dir.is_dir() {
            let message = format!("Source directory does not exist: {}", dir.display());
            warn!("{}", message);
            report.warnings.push(message);
            return Ok(report);
        }

        for path in self.list_files(dir)? {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            match self.rules.match_file(&file_name) {
                FileMatch::Table(table) => {
                    debug!("{} -> {}", file_name, table);
                    match report.groups.iter_mut().find(|g| g.table == table) {
                        Some(group) => group.files.push(path),
                        None => report.unmatched.push(path),
                    }
                }
                FileMatch::Conflict(tables) => {
                    error!(
                        "File '{}' matches tables {:?} equally well; it will not be loaded",
                        file_name, tables
                    );
                    report.conflicts.push(DiscoveryConflict { file: path, tables });
                }
                FileMatch::Unmatched => report.unmatched.push(path),
            }
        }

        for group in &report.groups {
            if group.is_empty() {
                let message = format!("No source files found for table {}", group.table);
                warn!("{}", message);
                report.warnings.push(message);
            } else {
                info!("Table {}: {} file(s)", group.table, group.files.len());
            }
        }
        if !report.unmatched.is_empty() {
            info!(
                "{} file(s) matched no table and will be ignored",
                report.unmatched.len()
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableSection;
    use crate::models::TableSchema;
    use std::fs;
    use tempfile::TempDir;

    fn schema() -> SchemaDefinition {
        SchemaDefinition::new(
            "anon",
            vec![
                TableSchema::new("ANON_VIEWS"),
                TableSchema::new("ANON_USER_DAY_FACT"),
                TableSchema::new("ANON_COMPANY_DAY_FACT"),
            ],
        )
    }

    fn config() -> LoaderConfig {
        let mut config = LoaderConfig::new();
        for (table, patterns) in [
            ("ANON_USER_DAY_FACT", vec!["user_day_fact"]),
            ("ANON_COMPANY_DAY_FACT", vec!["company_day_fact"]),
        ] {
            config.tables.insert(
                table.to_string(),
                TableSection {
                    file_patterns: patterns.into_iter().map(str::to_string).collect(),
                    ..Default::default()
                },
            );
        }
        config
    }

    #[test]
    fn test_longest_pattern_wins() {
        let mut rules = RuleTable::build(&schema(), &config());
        rules.add("ANON_VIEWS", "day", RuleSource::Config);

        assert_eq!(
            rules.match_file("part_001_ANON_USER_DAY_FACT.csv"),
            FileMatch::Table("ANON_USER_DAY_FACT".to_string())
        );
        assert_eq!(
            rules.match_file("company_day_fact_2024.csv"),
            FileMatch::Table("ANON_COMPANY_DAY_FACT".to_string())
        );
        assert_eq!(
            rules.match_file("monday.csv"),
            FileMatch::Table("ANON_VIEWS".to_string())
        );
        assert_eq!(rules.match_file("readme.csv"), FileMatch::Unmatched);
    }

    #[test]
    fn test_equal_length_tie_is_conflict() {
        let mut rules = RuleTable::default();
        rules.add("A", "sales", RuleSource::Config);
        rules.add("B", "sales", RuleSource::Config);
        rules.add("A", "s", RuleSource::Config);

        assert_eq!(
            rules.match_file("sales_1.csv"),
            FileMatch::Conflict(vec!["A".to_string(), "B".to_string()])
        );
    }

    #[test]
    fn test_rules_are_deduplicated() {
        let mut rules = RuleTable::default();
        rules.add("t", "Events", RuleSource::Config);
        rules.add("T", "events", RuleSource::Document);
        rules.add("T", "  ", RuleSource::Document);
        assert_eq!(rules.rules().len(), 1);
        assert_eq!(rules.rules_for("t").count(), 1);
    }

    #[test]
    fn test_discover_groups_sorted_files() {
        let dir = TempDir::new().unwrap();
        for name in [
            "anon_views_2.csv",
            "anon_views_1.csv",
            "user_day_fact.json",
            "notes.csv",
            "anon_views.parquet",
        ] {
            fs::write(dir.path().join(name), "id\n").unwrap();
        }

        let discovery = FileDiscovery::from_config(&schema(), &config());
        let report = discovery.discover(&schema(), dir.path()).unwrap();

        let views = report.files_for("ANON_VIEWS");
        assert_eq!(views.len(), 2);
        assert!(views[0].ends_with("anon_views_1.csv"));
        assert!(views[1].ends_with("anon_views_2.csv"));
        assert_eq!(report.files_for("anon_user_day_fact").len(), 1);
        assert_eq!(report.unmatched.len(), 1);
        assert_eq!(report.total_files(), 3);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("ANON_COMPANY_DAY_FACT"));
    }

    #[test]
    fn test_extension_case_is_ignored() {
        let dir = TempDir::new().unwrap();
        for name in ["anon_views_1.CSV", "anon_views_2.Jsonl", "user_day_fact.TXT"] {
            fs::write(dir.path().join(name), "id\n").unwrap();
        }

        let discovery = FileDiscovery::from_config(&schema(), &config());
        let report = discovery.discover(&schema(), dir.path()).unwrap();

        let views = report.files_for("ANON_VIEWS");
        assert_eq!(views.len(), 2);
        assert!(views[0].ends_with("anon_views_1.CSV"));
        assert!(report.unmatched.is_empty());
        // txt is not a default extension
        assert_eq!(report.total_files(), 2);
    }

    #[test]
    fn test_conflicting_file_is_loaded_nowhere() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ab.csv"), "id\n").unwrap();

        let schema = SchemaDefinition::new("m", vec![TableSchema::new("A"), TableSchema::new("B")]);
        let report = FileDiscovery::from_config(&schema, &LoaderConfig::new())
            .discover(&schema, dir.path())
            .unwrap();

        assert!(report.has_conflicts());
        assert_eq!(report.conflicts[0].tables, vec!["A", "B"]);
        assert_eq!(report.total_files(), 0);
    }

    #[test]
    fn test_missing_directory_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let report = FileDiscovery::from_config(&schema(), &config())
            .discover(&schema(), &dir.path().join("absent"))
            .unwrap();
        assert_eq!(report.groups.len(), 3);
        assert_eq!(report.total_files(), 0);
        assert!(report.warnings[0].starts_with("Source directory does not exist"));
    }
}
