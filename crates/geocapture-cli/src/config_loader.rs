//! Configuration loading utilities for CLI commands

use anyhow::{Context, Result};
use geocapture_core::config::{CliConfigOverrides, LayeredConfig};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "geocapture.toml";

/// Resolve the configuration file to read, if any.
///
/// An explicit path must exist; the default file is optional.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) if !path.exists() => {
            anyhow::bail!("Configuration file not found: {}", path.display())
        }
        Some(path) => Ok(Some(path.to_path_buf())),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            Ok(default.exists().then_some(default))
        }
    }
}

/// Load defaults, file, environment and CLI layers.
///
/// Validation is left to the caller so invalid values can still be inspected.
pub fn load_config(explicit: Option<&Path>, overrides: CliConfigOverrides) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();

    if let Some(path) = resolve_config_path(explicit)? {
        config = config
            .load_from_file(&path)
            .with_context(|| format!("Failed to load configuration file {}", path.display()))?;
    }

    let mut config = config.load_from_env();
    config.update_from_cli(overrides);
    Ok(config)
}
