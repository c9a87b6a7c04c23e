//! Workspace initialization CLI command

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::config::{CONFIG_FILENAME, LoaderConfig, sample_config};

/// Init command arguments
#[derive(Debug, Clone)]
pub struct InitArgs {
    pub workspace: PathBuf,
    /// Overwrite an existing configuration file
    pub force: bool,
}

/// Write a commented sample configuration into the workspace
pub fn handle_init(args: &InitArgs) -> Result<(), CliError> {
    if !args.workspace.is_dir() {
        return Err(CliError::FileNotFound(args.workspace.clone()));
    }

    let path = args.workspace.join(CONFIG_FILENAME);
    if path.exists() && !args.force {
        return Err(CliError::InvalidArgument(format!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        )));
    }

    let content = sample_config();
    // Never write a file the loader itself would reject
    LoaderConfig::parse(content)?;

    std::fs::write(&path, content)
        .map_err(|e| CliError::FileWriteError(path.clone(), e.to_string()))?;
    println!("Created {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        let args = InitArgs {
            workspace: temp.path().to_path_buf(),
            force: false,
        };

        handle_init(&args).unwrap();
        let config = LoaderConfig::load(temp.path()).unwrap();
        assert!(config.table("anon_views").is_some());

        assert!(matches!(
            handle_init(&args),
            Err(CliError::InvalidArgument(_))
        ));
        handle_init(&InitArgs {
            force: true,
            ..args
        })
        .unwrap();
    }
}
