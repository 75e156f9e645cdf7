//! Source file hashing and read-only entry verification.
//!
//! Computes content hashes for original source files and, for reporting,
//! compares every manifest entry against the files currently on disk
//! without mutating the manifest.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use shrink_common::ContentHash;

use crate::artifact::ArtifactStore;
use crate::error::CacheError;
use crate::manifest::Manifest;

/// State of one manifest entry relative to the files on disk.
///
/// Settings are not part of this check: they are only known to the caller
/// asking for a specific artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Source hash matches and the artifact exists.
    Fresh,
    /// The source file's content no longer matches the stored hash.
    SourceChanged,
    /// The source file no longer exists or cannot be read.
    SourceMissing,
    /// The source matches but the artifact file is gone.
    ArtifactMissing,
}

/// Utility for hashing source files.
pub struct SourceHasher;

impl SourceHasher {
    /// Reads a source file, mapping failure to [`CacheError::SourceUnreadable`].
    pub fn read_source(path: &Path) -> Result<Vec<u8>, CacheError> {
        std::fs::read(path).map_err(|e| CacheError::SourceUnreadable {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Computes the content hash of a single file.
    pub fn hash_file(path: &Path) -> Result<ContentHash, CacheError> {
        Self::read_source(path).map(|content| ContentHash::from_bytes(&content))
    }

    /// Computes content hashes for multiple files in parallel.
    ///
    /// Files that cannot be read are left out of the result.
    pub fn hash_files(paths: &[PathBuf]) -> HashMap<PathBuf, ContentHash> {
        paths
            .par_iter()
            .filter_map(|path| Self::hash_file(path).ok().map(|hash| (path.clone(), hash)))
            .collect()
    }

    /// Classifies every manifest entry against the current disk state.
    ///
    /// Results are sorted by original path.
    pub fn verify(manifest: &Manifest) -> Vec<(PathBuf, EntryStatus)> {
        let paths: Vec<PathBuf> = manifest.entries.keys().cloned().collect();
        let hashes = Self::hash_files(&paths);

        // BTreeMap iteration keeps the output in path order.
        manifest
            .entries
            .iter()
            .map(|(path, entry)| {
                let status = match hashes.get(path) {
                    None => EntryStatus::SourceMissing,
                    Some(hash) if *hash != entry.source_hash => EntryStatus::SourceChanged,
                    Some(_) if !ArtifactStore::exists(&entry.compressed_path) => {
                        EntryStatus::ArtifactMissing
                    }
                    Some(_) => EntryStatus::Fresh,
                };
                (path.clone(), status)
            })
            .collect()
    }
}
