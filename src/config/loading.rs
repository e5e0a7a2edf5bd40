//! Configuration loading functionality.
//!
//! Resolves the configuration path, creates a default file when none exists,
//! and parses and validates the TOML content.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use super::Config;
use super::validation::validate_config;
use crate::constants::*;

/// Configuration directory override, set once at startup from `--config`.
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for the current process.
///
/// Can only be called once; later calls return an error.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// The directory passed with `--config`, if any.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

/// Path of `shadefilter.toml`.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = get_custom_config_dir() {
        return Ok(custom_dir.join(CONFIG_FILE_NAME));
    }

    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("shadefilter").join(CONFIG_FILE_NAME))
}

/// Load configuration from the default location, creating it first if missing.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        super::builder::create_default_config(&config_path)
            .context("Failed to create default config during load")?;
        log_block_start!("Created default configuration");
        log_indented!("{}", config_path.display());
    }

    load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))
}

/// Load configuration from a specific path.
///
/// Unlike [`load`], this never creates a file.
pub fn load_from_path(path: &PathBuf) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("Configuration file not found at {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    validate_config(&config)?;

    Ok(config)
}
