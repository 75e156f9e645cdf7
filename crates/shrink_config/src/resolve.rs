//! Settings resolution: merging shared defaults with per-format overrides.
//!
//! The result is the opaque settings value the cache stores with each
//! artifact and compares on lookup.

use crate::error::ConfigError;
use crate::types::ShrinkConfig;
use std::path::Path;

/// Key under which the format name is recorded in resolved settings.
pub const FORMAT_KEY: &str = "format";

/// Resolves the compressor settings for `format`.
///
/// Starts from `[defaults]`, overlays `[formats.<format>]` key by key, and
/// records the format name under `"format"` so that two formats never share
/// a fingerprint even when their tables are identical. A format without a
/// table resolves to the defaults plus its name.
pub fn resolve_settings(
    config: &ShrinkConfig,
    format: &str,
) -> Result<serde_json::Value, ConfigError> {
    let mut merged = config.defaults.clone();
    if let Some(overrides) = config.formats.get(format) {
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged.insert(
        FORMAT_KEY.to_string(),
        toml::Value::String(format.to_string()),
    );

    serde_json::to_value(&merged).map_err(|e| ConfigError::SettingsError {
        format: format.to_string(),
        reason: e.to_string(),
    })
}

/// Infers an asset format name from a file's extension.
///
/// Returns `None` for extensions no compressor handles.
pub fn format_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let format = match ext.as_str() {
        "css" => "css",
        "js" | "mjs" | "cjs" => "js",
        "html" | "htm" => "html",
        "svg" => "svg",
        "json" => "json",
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" => "image",
        _ => return None,
    };
    Some(format)
}
