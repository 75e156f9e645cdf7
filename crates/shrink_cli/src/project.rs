//! Shared helpers for CLI commands.
//!
//! Resolves the project root and its `shrink.toml`, opens the cache the
//! configuration points at, canonicalizes source paths into cache keys, and
//! turns `--format` / `--settings` flags into a settings fingerprint.

use std::path::{Path, PathBuf};

use serde_json::Value;
use shrink_cache::CacheManager;
use shrink_config::{ShrinkConfig, CONFIG_FILE};
use tracing::debug;

use crate::{GlobalArgs, SettingsArgs};

/// A resolved project: its root directory and configuration.
#[derive(Debug)]
pub struct Project {
    /// Directory relative config paths are resolved against.
    pub root: PathBuf,
    /// Parsed configuration, or defaults if there is no `shrink.toml`.
    pub config: ShrinkConfig,
}

impl Project {
    /// Returns the cache directory, honoring `--cache-dir`.
    pub fn cache_dir(&self, global: &GlobalArgs) -> PathBuf {
        match &global.cache_dir {
            Some(dir) => dir.clone(),
            None => self.config.cache.resolve_dir(&self.root),
        }
    }

    /// Opens and initializes the project's cache.
    pub fn open_cache(
        &self,
        global: &GlobalArgs,
    ) -> Result<CacheManager, Box<dyn std::error::Error>> {
        let dir = self.cache_dir(global);
        debug!(dir = %dir.display(), "opening cache");
        Ok(CacheManager::open(dir)?)
    }

    /// Resolves the settings fingerprint for `file`.
    ///
    /// `--settings` is used verbatim; `--format` or the format inferred from
    /// the file extension selects a table from the configuration.
    pub fn settings_for(
        &self,
        file: &Path,
        args: &SettingsArgs,
    ) -> Result<Value, Box<dyn std::error::Error>> {
        if let Some(ref raw) = args.settings {
            return serde_json::from_str(raw)
                .map_err(|e| format!("--settings is not valid JSON: {e}").into());
        }
        let format = match args.format.as_deref() {
            Some(format) => format,
            None => shrink_config::format_for_path(file).ok_or_else(|| {
                format!(
                    "cannot infer a format for {}; pass --format or --settings",
                    file.display()
                )
            })?,
        };
        Ok(shrink_config::resolve_settings(&self.config, format)?)
    }
}

/// Walks up from `start` looking for the nearest directory containing `shrink.toml`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).is_file() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Resolves the project from global CLI args.
///
/// If `--config` is given, that file is loaded and its directory is the root.
/// Otherwise the nearest `shrink.toml` above the current directory is used,
/// falling back to default settings rooted at the current directory.
pub fn load_project(global: &GlobalArgs) -> Result<Project, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("cannot read {}: {e}", config_path.display()))?;
        let config = shrink_config::load_config_from_str(&content)?;
        let root = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        return Ok(Project { root, config });
    }

    let cwd = std::env::current_dir()?;
    match find_project_root(&cwd) {
        Some(root) => {
            let config = shrink_config::load_config(&root)?;
            Ok(Project { root, config })
        }
        None => {
            debug!("no {CONFIG_FILE} found, using defaults");
            Ok(Project {
                root: cwd,
                config: ShrinkConfig::default(),
            })
        }
    }
}

/// Turns a user-supplied source path into the cache key for it.
///
/// Existing files are canonicalized so every spelling maps to one entry.
/// A path that no longer exists is made absolute against the current
/// directory so entries for deleted sources can still be addressed.
pub fn source_key(file: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match std::fs::canonicalize(file) {
        Ok(path) => Ok(path),
        Err(_) if file.is_absolute() => Ok(file.to_path_buf()),
        Err(_) => Ok(std::env::current_dir()?.join(file)),
    }
}
