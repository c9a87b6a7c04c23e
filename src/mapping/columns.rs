//! Source header reconciliation.
//!
//! Headers are matched case-insensitively against each table's configured
//! alternate spellings. Every header, mapped or not, ends up uppercased, and
//! an unmapped header is kept under that uppercased name rather than being
//! dropped.

use crate::config::LoaderConfig;
use crate::models::TableSchema;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Alternate header spellings for one table
///
/// Several spellings may point at the same canonical column. Inserting a
/// spelling that is already present (in any case) replaces its target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
    table: String,
    aliases: HashMap<String, String>,
}

impl ColumnMapping {
    pub fn new(table: impl AsRef<str>) -> Self {
        Self {
            table: table.as_ref().trim().to_uppercase(),
            aliases: HashMap::new(),
        }
    }

    /// Build a mapping from `(alias, canonical)` pairs, later pairs winning
    pub fn from_pairs<I, A, C>(table: impl AsRef<str>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, C)>,
        A: AsRef<str>,
        C: AsRef<str>,
    {
        let mut mapping = Self::new(table);
        for (alias, canonical) in pairs {
            mapping.insert(alias, canonical);
        }
        mapping
    }

    pub fn insert(&mut self, alias: impl AsRef<str>, canonical: impl AsRef<str>) {
        self.aliases.insert(
            alias.as_ref().trim().to_lowercase(),
            canonical.as_ref().trim().to_uppercase(),
        );
    }

    /// Canonical name for a header, if one is configured
    pub fn resolve(&self, header: &str) -> Option<&str> {
        self.aliases
            .get(&header.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Outcome of reconciling one file's header row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciledHeaders {
    /// Canonical name per raw header position
    pub targets: Vec<String>,
    /// Raw positions that survive, in header order
    pub selected: Vec<usize>,
    /// Canonical names of the surviving positions
    pub columns: Vec<String>,
    /// Canonical names that are not columns of the target table
    pub unknown: Vec<String>,
    /// Canonical names that more than one raw header resolved to
    pub collisions: Vec<String>,
}

impl ReconciledHeaders {
    /// Raw header to canonical name, one pair per raw position
    pub fn rename_map<'a>(&'a self, headers: &'a [String]) -> Vec<(&'a str, &'a str)> {
        headers
            .iter()
            .zip(self.targets.iter())
            .map(|(raw, target)| (raw.as_str(), target.as_str()))
            .collect()
    }
}

/// Maps source headers onto canonical column names
#[derive(Debug, Clone, Default)]
pub struct ColumnReconciler {
    mappings: HashMap<String, ColumnMapping>,
}

impl ColumnReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `column_mappings` of every configured table
    pub fn from_config(config: &LoaderConfig) -> Self {
        let mut reconciler = Self::new();
        for (table, section) in &config.tables {
            if !section.column_mappings.is_empty() {
                reconciler = reconciler.with_mapping(ColumnMapping::from_pairs(
                    table,
                    section.column_mappings.iter(),
                ));
            }
        }
        reconciler
    }

    /// Add or replace the mapping of a table
    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mappings.insert(mapping.table.clone(), mapping);
        self
    }

    pub fn mapping_for(&self, table: &str) -> Option<&ColumnMapping> {
        self.mappings.get(&table.trim().to_uppercase())
    }

    /// Canonical name of a single header for a table
    pub fn canonical_name(&self, table: &str, header: &str) -> String {
        let header = header.trim_start_matches('\u{feff}').trim();
        self.mapping_for(table)
            .and_then(|m| m.resolve(header))
            .map(str::to_string)
            .unwrap_or_else(|| header.to_uppercase())
    }

    /// Reconcile a header row against a table
    ///
    /// When several raw headers resolve to the same canonical name, the
    /// rightmost one is kept and the others are dropped.
    pub fn reconcile(&self, headers: &[String], table: &TableSchema) -> ReconciledHeaders {
        let targets: Vec<String> = headers
            .iter()
            .map(|h| self.canonical_name(&table.name, h))
            .collect();

        let mut last_position: HashMap<&str, usize> = HashMap::new();
        for (position, target) in targets.iter().enumerate() {
            last_position.insert(target.as_str(), position);
        }

        let mut result = ReconciledHeaders::default();
        for (position, target) in targets.iter().enumerate() {
            if last_position.get(target.as_str()) != Some(&position) {
                if !result.collisions.contains(target) {
                    result.collisions.push(target.clone());
                }
                continue;
            }
            result.selected.push(position);
            result.columns.push(target.clone());
            if table.column(target).is_none() {
                result.unknown.push(target.clone());
            }
        }

        if !result.collisions.is_empty() {
            warn!(
                "Table '{}': several headers map to {:?}; the last one wins",
                table.name, result.collisions
            );
        }
        if !result.unknown.is_empty() {
            debug!(
                "Table '{}': headers {:?} are not schema columns and are kept as-is",
                table.name, result.unknown
            );
        }

        result.targets = targets;
        result
    }
}
