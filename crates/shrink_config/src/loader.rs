//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ShrinkConfig;
use std::path::Path;

/// Name of the configuration file inside a project directory.
pub const CONFIG_FILE: &str = "shrink.toml";

/// Loads and validates a `shrink.toml` configuration from a project directory.
///
/// Reads `<project_dir>/shrink.toml`, parses it, and validates its values.
pub fn load_config(project_dir: &Path) -> Result<ShrinkConfig, ConfigError> {
    let content = std::fs::read_to_string(project_dir.join(CONFIG_FILE))?;
    load_config_from_str(&content)
}

/// Parses and validates a `shrink.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ShrinkConfig, ConfigError> {
    let config: ShrinkConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that configuration values are usable.
fn validate_config(config: &ShrinkConfig) -> Result<(), ConfigError> {
    if config.cache.dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "cache.dir must not be empty".to_string(),
        ));
    }
    for name in config.formats.keys() {
        if !is_valid_format_name(name) {
            return Err(ConfigError::ValidationError(format!(
                "invalid format name '{name}': use lowercase letters, digits, '-' or '_'"
            )));
        }
    }
    Ok(())
}

fn is_valid_format_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}
