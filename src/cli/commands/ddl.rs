//! DDL rendering CLI command

use std::path::PathBuf;

use super::ConfigArgs;
use crate::cli::error::CliError;
use crate::import::SchemaDefinitionParser;
use crate::models::{ProvisionMode, SchemaDefinition, SqlDialect};
use crate::provision::TableProvisioner;

/// DDL command arguments
#[derive(Debug, Clone)]
pub struct DdlArgs {
    pub config: ConfigArgs,
    pub dialect: SqlDialect,
    /// Write the script here instead of stdout
    pub output: Option<PathBuf>,
}

/// Print the CREATE statements for every table of the schema document
pub fn handle_ddl(args: &DdlArgs) -> Result<(), CliError> {
    let config = args.config.resolve()?;
    let schema_path = config.schema_path(&args.config.workspace);
    if !schema_path.exists() {
        return Err(CliError::FileNotFound(schema_path));
    }

    let schema = SchemaDefinitionParser::new()
        .with_strict_mode(config.strict_mode())
        .with_key_overrides(config.key_overrides())
        .parse_file(&schema_path)?;

    let script = render_script(&schema, args.dialect, config.load.provision)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &script)
                .map_err(|e| CliError::FileWriteError(path.clone(), e.to_string()))?;
            eprintln!(
                "Wrote {} statement(s) to {}",
                schema.tables.len(),
                path.display()
            );
        }
        None => print!("{}", script),
    }
    Ok(())
}

fn render_script(
    schema: &SchemaDefinition,
    dialect: SqlDialect,
    mode: ProvisionMode,
) -> Result<String, CliError> {
    let statements = TableProvisioner::new(dialect, mode).render(schema)?;
    let mut script = String::new();
    for ddl in statements {
        script.push_str(&ddl.to_sql());
        script.push_str("\n\n");
    }
    Ok(script)
}
