//! Content-addressed artifact storage.
//!
//! Artifacts are the compressed bytes handed to the cache by the caller. Each
//! one is stored verbatim, directly inside the cache directory, as
//! `<hex source hash>.<original extension>`. There are no headers and no
//! subdirectories: the artifact file is exactly what the compressor produced.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use shrink_common::ContentHash;

use crate::error::{CacheError, CleanupWarning};
use crate::manifest::MANIFEST_FILE;

/// Suffix appended to temporaries while an artifact is being written.
const PARTIAL_SUFFIX: &str = ".partial";

/// Store for compressed artifacts rooted at a cache directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    /// Root cache directory.
    cache_dir: PathBuf,
}

/// Outcome of an on-demand garbage collection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Number of unreferenced files removed.
    pub removed: usize,
    /// Total bytes freed.
    pub bytes_freed: u64,
}

impl ArtifactStore {
    /// Creates a new artifact store rooted at the given cache directory.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    /// Returns the artifact filename for a source with the given hash.
    ///
    /// The extension is taken from `original` (the last one, so
    /// `bundle.min.js` yields `js`). A source without an extension yields
    /// the bare hex hash.
    pub fn artifact_name(hash: &ContentHash, original: &Path) -> String {
        match original.extension().map(OsStr::to_string_lossy) {
            Some(ext) if !ext.is_empty() => format!("{hash}.{ext}"),
            _ => hash.to_string(),
        }
    }

    /// Writes an artifact and returns the path it was stored at.
    ///
    /// Any existing file at that path is replaced. The bytes go to a
    /// temporary file first and are renamed into place.
    pub fn write(
        &self,
        hash: &ContentHash,
        original: &Path,
        data: &[u8],
    ) -> Result<PathBuf, CacheError> {
        let name = Self::artifact_name(hash, original);
        let path = self.cache_dir.join(&name);
        let tmp = self.cache_dir.join(format!(".{name}{PARTIAL_SUFFIX}"));

        std::fs::write(&tmp, data).map_err(|e| CacheError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(CacheError::Io { path, source: e });
        }
        Ok(path)
    }

    /// Returns `true` if the artifact file exists.
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }

    /// Deletes an artifact file.
    ///
    /// Returns `Ok(true)` if a file was removed and `Ok(false)` if it was
    /// already gone. Any other failure is returned as a [`CleanupWarning`].
    pub fn remove(path: &Path) -> Result<bool, CleanupWarning> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CleanupWarning {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }

    /// Removes every file in the cache directory not in `live`.
    ///
    /// The manifest, hidden files (which includes in-flight temporaries) and
    /// subdirectories are never touched.
    pub fn gc(&self, live: &HashSet<PathBuf>) -> Result<GcReport, CacheError> {
        let mut report = GcReport::default();
        if !self.cache_dir.exists() {
            return Ok(report);
        }

        let entries = std::fs::read_dir(&self.cache_dir).map_err(|e| CacheError::Io {
            path: self.cache_dir.clone(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Io {
                path: self.cache_dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == MANIFEST_FILE || name.starts_with('.') || !path.is_file() {
                continue;
            }
            if live.contains(&path) {
                continue;
            }
            let len = entry.metadata().map(|m| m.len()).unwrap_or(0);
            std::fs::remove_file(&path).map_err(|e| CacheError::Io {
                path: path.clone(),
                source: e,
            })?;
            report.removed += 1;
            report.bytes_freed += len;
        }

        Ok(report)
    }
}
