//! Configuration types deserialized from `shrink.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default cache directory, relative to the project directory.
pub const DEFAULT_CACHE_DIR: &str = ".shrink-cache";

/// The top-level configuration parsed from `shrink.toml`.
///
/// Every section is optional; an empty file is a valid configuration.
#[derive(Debug, Default, Deserialize)]
pub struct ShrinkConfig {
    /// Cache location and on/off switch.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Settings applied to every format before format-specific overrides.
    #[serde(default)]
    pub defaults: toml::Table,
    /// Per-format compressor settings (e.g., `[formats.css]`).
    #[serde(default)]
    pub formats: BTreeMap<String, toml::Table>,
}

/// The `[cache]` section.
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// Cache directory. Relative paths are resolved against the project directory.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// When `false`, lookups always miss and nothing is stored.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_enabled() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            enabled: default_enabled(),
        }
    }
}

impl CacheConfig {
    /// Returns the cache directory, joined onto `project_dir` if relative.
    pub fn resolve_dir(&self, project_dir: &Path) -> PathBuf {
        if self.dir.is_absolute() {
            self.dir.clone()
        } else {
            project_dir.join(&self.dir)
        }
    }
}
