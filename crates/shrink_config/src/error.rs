//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating a `shrink.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A settings table could not be converted to a fingerprint value.
    #[error("invalid settings for format '{format}': {reason}")]
    SettingsError {
        /// The format whose settings failed to convert.
        format: String,
        /// Description of the failure.
        reason: String,
    },
}
