//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Stale entries are never errors: they surface as a
/// [`Lookup::Miss`](crate::Lookup::Miss). Only an unreadable source file or
/// a failed write aborts the calling operation.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The original source file could not be read.
    ///
    /// A caller asking about a file that does not exist is a precondition
    /// violation, so this is reported rather than treated as a cache miss.
    #[error("cannot read source file {path}: {source}")]
    SourceUnreadable {
        /// The source file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The cache manifest could not be parsed as valid JSON.
    #[error("failed to parse cache manifest: {reason}")]
    ManifestParse {
        /// Description of the parse failure.
        reason: String,
    },

    /// The manifest on disk carries a format version this build does not read.
    #[error("unsupported manifest version {found:?}, expected {expected:?}")]
    UnsupportedVersion {
        /// The version tag found on disk.
        found: String,
        /// The version tag this build writes.
        expected: String,
    },

    /// The manifest could not be serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// `invalidate_cache` was called for a path with no manifest entry.
    #[error("no cache entry for {path}")]
    EntryNotFound {
        /// The original file path that was looked up.
        path: PathBuf,
    },

    /// A source path cannot be used as a manifest key.
    ///
    /// Manifest keys are JSON strings, so the path must be valid UTF-8.
    #[error("source path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// The offending path.
        path: PathBuf,
    },

    /// A thread panicked while holding the shared cache lock.
    #[error("shared cache lock poisoned")]
    Poisoned,
}

/// A non-fatal failure to delete an artifact file during invalidation.
///
/// The manifest entry is removed regardless; this value is handed back to
/// the caller so it can decide whether leftover files matter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to delete artifact {path}: {reason}")]
pub struct CleanupWarning {
    /// The artifact that could not be removed.
    pub path: PathBuf,
    /// Description of the underlying I/O failure.
    pub reason: String,
}
