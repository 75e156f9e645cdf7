//! Cache manifest mapping original source files to compressed artifacts.
//!
//! The manifest is stored as `manifest.json` in the cache directory. It records,
//! for every original path, the content hash the artifact was produced from,
//! where the artifact lives, and the compression settings used, so a later
//! build can tell whether the artifact is still usable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shrink_common::ContentHash;

use crate::error::CacheError;

/// Name of the manifest file within the cache directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Temporary name the manifest is written under before being renamed into place.
pub(crate) const MANIFEST_TMP_FILE: &str = ".manifest.json.partial";

/// Manifest format version written by this build.
pub const MANIFEST_VERSION: &str = "1";

/// The persisted state of one cache directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Format tag. Manifests with any other value are discarded on load.
    pub version: String,

    /// One entry per original file path. Paths are stored exactly as the
    /// caller supplied them; no normalization is performed.
    #[serde(default)]
    pub entries: BTreeMap<PathBuf, CacheEntry>,
}

/// One cached artifact and the fingerprint it was produced under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Content hash of the original file when the artifact was stored.
    pub source_hash: ContentHash,

    /// Absolute path of the stored artifact.
    pub compressed_path: PathBuf,

    /// Epoch milliseconds at which this entry was stored.
    pub timestamp: i64,

    /// Compression settings the artifact was produced with, stored verbatim.
    pub settings: serde_json::Value,

    /// Byte sizes of the source and the artifact.
    pub size: EntrySize,
}

/// Informational byte counts for a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntrySize {
    /// Size of the original source file.
    pub original: u64,
    /// Size of the compressed artifact.
    pub compressed: u64,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// Creates a new, empty manifest tagged with the current format version.
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            entries: BTreeMap::new(),
        }
    }

    /// Loads the manifest from the cache directory.
    ///
    /// Fails with [`CacheError::Io`] if the file is missing or unreadable,
    /// [`CacheError::ManifestParse`] if it is not a valid manifest, and
    /// [`CacheError::UnsupportedVersion`] if it was written in another format.
    pub fn load(cache_dir: &Path) -> Result<Self, CacheError> {
        let path = cache_dir.join(MANIFEST_FILE);
        let content =
            std::fs::read_to_string(&path).map_err(|e| CacheError::Io { path, source: e })?;
        let manifest: Self =
            serde_json::from_str(&content).map_err(|e| CacheError::ManifestParse {
                reason: e.to_string(),
            })?;
        if manifest.version != MANIFEST_VERSION {
            return Err(CacheError::UnsupportedVersion {
                found: manifest.version,
                expected: MANIFEST_VERSION.to_string(),
            });
        }
        Ok(manifest)
    }

    /// Saves the manifest to the cache directory.
    ///
    /// Creates the cache directory if it doesn't exist. The manifest is written
    /// to a temporary file and renamed over `manifest.json`, so readers only
    /// ever see a complete manifest.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::Io {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        let tmp = cache_dir.join(MANIFEST_TMP_FILE);
        std::fs::write(&tmp, json).map_err(|e| CacheError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        let path = cache_dir.join(MANIFEST_FILE);
        std::fs::rename(&tmp, &path).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if any entry stores its artifact at `artifact`.
    pub fn references(&self, artifact: &Path) -> bool {
        self.entries
            .values()
            .any(|entry| entry.compressed_path == artifact)
    }
}
