//! Configuration and library loading
//!
//! Finds and parses `prendr.toml`, and reads JSON5 sprite libraries.

use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::schema::RendrConfig;
use crate::color::ColorError;

/// Name of the configuration file searched for.
pub const CONFIG_FILE_NAME: &str = "prendr.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse prendr.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
    /// A palette color string could not be parsed
    #[error("Invalid palette color: {0}")]
    Color(#[from] ColorError),
    /// A sprite library file is not valid JSON5
    #[error("Failed to parse library '{path}': {message}")]
    Library { path: PathBuf, message: String },
}

/// Find prendr.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find prendr.toml by walking up from `start`.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;
    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            return Some(config_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from `path`, or from the discovered prendr.toml.
///
/// Without a path and without a config file on disk, the default
/// configuration is returned. It has an empty palette, which the codec
/// rejects.
pub fn load_config(path: Option<&Path>) -> Result<RendrConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(RendrConfig::default()),
    }
}

fn load_config_file(path: &Path) -> Result<RendrConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: RendrConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    log::debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Read a sprite library written in JSON5.
pub fn load_library(path: &Path) -> Result<Value, ConfigError> {
    let contents = fs::read_to_string(path)?;
    json5::from_str(&contents)
        .map_err(|e| ConfigError::Library { path: path.to_path_buf(), message: e.to_string() })
}
