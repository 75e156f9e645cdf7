//! Parsing and validation of `shrink.toml` project configuration files.
//!
//! This crate reads the project configuration file and produces a strongly-typed
//! [`ShrinkConfig`] describing where the cache lives and which compressor
//! settings apply to each asset format.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::{format_for_path, resolve_settings};
pub use types::*;
