//! Init command implementation

use crate::config::{Config, PathsConfig};
use crate::error::{Error, Result};
use crate::registry::RegistryDb;
use std::path::PathBuf;
use tracing::info;

/// Initialize archivist configuration and registry database.
/// With `force`, an existing config is overwritten with defaults.
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<Config> {
    let base = base_dir.unwrap_or_else(Config::default_base_dir);
    let config_path = base.join("config.toml");

    if config_path.exists() && !force {
        return Err(Error::AlreadyInitialized(base.display().to_string()));
    }

    std::fs::create_dir_all(&base)?;

    let mut config = Config::default();
    config.paths = PathsConfig {
        config_file: config_path,
        registry_file: base.join("registry.db"),
        base_dir: base.clone(),
    };
    config.save()?;

    RegistryDb::new(&config.paths.registry_file).await?;

    info!("Initialized archivist at {}", base.display());
    println!("Initialized archivist at {}", base.display());
    println!("Config: {}", config.paths.config_file.display());
    println!("Registry: {}", config.paths.registry_file.display());
    Ok(config)
}
