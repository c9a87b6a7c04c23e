//! Source inventory CLI command
//!
//! Surveys the source directory without touching the destination.

use super::ConfigArgs;
use crate::cli::error::CliError;
use crate::import::SchemaDefinitionParser;
use crate::ingest::{FileDiscovery, Inventory};

/// Inventory command arguments
#[derive(Debug, Clone)]
pub struct InventoryArgs {
    pub config: ConfigArgs,
    /// Print JSON instead of the text table
    pub json: bool,
}

/// Match source files to tables and summarize what a run would load
pub fn handle_inventory(args: &InventoryArgs) -> Result<(), CliError> {
    let inventory = build_inventory(&args.config)?;

    if args.json {
        let json = serde_json::to_string_pretty(&inventory)
            .map_err(|e| CliError::IoError(format!("Failed to serialize inventory: {}", e)))?;
        println!("{}", json);
    } else {
        println!("{}", inventory.render_text());
    }
    Ok(())
}

fn build_inventory(args: &ConfigArgs) -> Result<Inventory, CliError> {
    let config = args.resolve()?;
    let schema_path = config.schema_path(&args.workspace);
    if !schema_path.exists() {
        return Err(CliError::FileNotFound(schema_path));
    }

    let problems = config.validate_settings();
    if let Some(problem) = problems.first() {
        return Err(CliError::InvalidArgument(problem.clone()));
    }

    let schema = SchemaDefinitionParser::new()
        .with_strict_mode(config.strict_mode())
        .with_key_overrides(config.key_overrides())
        .parse_file(&schema_path)?;

    let discovery = FileDiscovery::from_config(&schema, &config)
        .discover(&schema, &config.source_dir(&args.workspace))?;
    let delimiter = config.source.delimiter_byte().unwrap_or(b',');

    Ok(Inventory::build(&discovery, delimiter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_inventory_counts_rows() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("semantic_model.yaml"),
            "tables:\n  - name: orders\n    columns:\n      - name: id\n",
        )
        .unwrap();
        fs::create_dir(temp.path().join("data")).unwrap();
        fs::write(temp.path().join("data/orders_a.csv"), "id\n1\n2\n").unwrap();
        fs::write(temp.path().join("data/orders_b.csv"), "id\n3\n").unwrap();
        fs::write(temp.path().join("data/misc.csv"), "x\n1\n").unwrap();

        let mut args = ConfigArgs::new(temp.path());
        args.source = Some("data".to_string());

        let inventory = build_inventory(&args).unwrap();
        assert_eq!(inventory.total_rows(), 3);
        assert_eq!(inventory.total_files(), 2);
        assert_eq!(inventory.unmatched.len(), 1);
    }
}
