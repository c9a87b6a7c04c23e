//! CLI command implementations

pub mod ddl;
pub mod init;
pub mod inventory;
pub mod query;
pub mod run;

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::config::LoaderConfig;
use crate::database::DuckDBBackend;
use crate::models::ProvisionMode;

/// Options shared by every command that reads the loader configuration
///
/// Flags take precedence over environment variables, which take precedence
/// over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Directory that relative paths resolve against
    pub workspace: PathBuf,
    /// Explicit configuration file (defaults to `.semantic-loader.toml` in the workspace)
    pub config: Option<PathBuf>,
    pub schema: Option<String>,
    pub source: Option<String>,
    pub database: Option<String>,
    pub strict: bool,
    pub clear_existing: bool,
    pub provision: Option<String>,
}

impl ConfigArgs {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            ..Default::default()
        }
    }

    /// Load the configuration and layer the flags on top
    pub fn resolve(&self) -> Result<LoaderConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => {
                if !path.exists() {
                    return Err(CliError::FileNotFound(path.clone()));
                }
                LoaderConfig::load_file(path)?
            }
            None => LoaderConfig::load(&self.workspace)?,
        };

        if let Some(schema) = &self.schema {
            config.schema.path = schema.clone();
        }
        if let Some(source) = &self.source {
            config.source.directory = source.clone();
        }
        if let Some(database) = &self.database {
            config.database.path = database.clone();
        }
        if self.strict {
            config.load.strict = true;
        }
        if self.clear_existing {
            config.load.clear_existing = true;
        }
        if let Some(mode) = &self.provision {
            config.load.provision = mode
                .parse::<ProvisionMode>()
                .map_err(CliError::InvalidArgument)?;
        }

        Ok(config)
    }
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}

pub(crate) fn open_backend(
    config: &LoaderConfig,
    workspace: &std::path::Path,
) -> Result<DuckDBBackend, CliError> {
    DuckDBBackend::from_config(config, workspace)
        .map_err(|e| CliError::DatabaseError(format!("Failed to open database: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_flags_override_config_file() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(".semantic-loader.toml"),
            "[source]\ndirectory = \"incoming\"\n\n[load]\nprovision = \"skip\"\n",
        )
        .unwrap();

        let mut args = ConfigArgs::new(temp.path());
        let config = args.resolve().unwrap();
        assert_eq!(config.source.directory, "incoming");
        assert_eq!(config.load.provision, ProvisionMode::Skip);

        args.source = Some("landing".to_string());
        args.provision = Some("replace".to_string());
        args.clear_existing = true;
        let config = args.resolve().unwrap();
        assert_eq!(config.source.directory, "landing");
        assert_eq!(config.load.provision, ProvisionMode::Replace);
        assert!(config.load.clear_existing);
    }

    #[test]
    fn test_missing_explicit_config() {
        let temp = TempDir::new().unwrap();
        let mut args = ConfigArgs::new(temp.path());
        args.config = Some(temp.path().join("nope.toml"));
        assert!(matches!(args.resolve(), Err(CliError::FileNotFound(_))));
    }

    #[test]
    fn test_invalid_provision_mode() {
        let temp = TempDir::new().unwrap();
        let mut args = ConfigArgs::new(temp.path());
        args.provision = Some("sometimes".to_string());
        assert!(matches!(args.resolve(), Err(CliError::InvalidArgument(_))));
    }
}
