//! The cache manager.
//!
//! [`CacheManager`] ties together the manifest, the artifact store and source
//! hashing into the lookup/save/invalidate protocol the build pipeline uses.
//! Every mutation of the manifest is persisted to disk before the call
//! returns.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use shrink_common::ContentHash;
use tracing::{debug, warn};

use crate::artifact::{ArtifactStore, GcReport};
use crate::error::{CacheError, CleanupWarning};
use crate::hasher::{EntryStatus, SourceHasher};
use crate::manifest::{CacheEntry, EntrySize, Manifest};

/// Why a lookup did not produce a usable artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// No entry exists for the path.
    NotCached,
    /// The source content changed since the artifact was stored.
    SourceChanged,
    /// The artifact was produced with different settings.
    SettingsChanged,
    /// The manifest entry pointed at an artifact file that no longer exists.
    ArtifactMissing,
}

impl MissReason {
    /// Short human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            MissReason::NotCached => "not cached",
            MissReason::SourceChanged => "source changed",
            MissReason::SettingsChanged => "settings changed",
            MissReason::ArtifactMissing => "artifact missing",
        }
    }
}

/// Result of [`CacheManager::get_cached_file`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// A valid entry whose artifact can be reused.
    Hit(CacheEntry),
    /// No usable artifact. A stale entry, if there was one, has been removed.
    Miss {
        /// Why the lookup missed.
        reason: MissReason,
        /// Set when removing the stale artifact failed.
        cleanup: Option<CleanupWarning>,
    },
}

impl Lookup {
    fn miss(reason: MissReason) -> Self {
        Lookup::Miss {
            reason,
            cleanup: None,
        }
    }

    /// Returns `true` on a hit.
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }

    /// Consumes the lookup, returning the entry on a hit.
    pub fn into_entry(self) -> Option<CacheEntry> {
        match self {
            Lookup::Hit(entry) => Some(entry),
            Lookup::Miss { .. } => None,
        }
    }

    /// Returns the miss reason, if this was a miss.
    pub fn miss_reason(&self) -> Option<MissReason> {
        match self {
            Lookup::Hit(_) => None,
            Lookup::Miss { reason, .. } => Some(*reason),
        }
    }
}

/// Result of [`CacheManager::invalidate_cache`].
#[derive(Debug, Clone, PartialEq)]
pub struct Invalidation {
    /// The entry that was removed from the manifest.
    pub removed: CacheEntry,
    /// `true` if the artifact file was deleted by this call.
    ///
    /// `false` when it was already gone or is still used by another entry.
    pub artifact_deleted: bool,
    /// Set when the artifact could not be deleted.
    pub cleanup: Option<CleanupWarning>,
}

/// Result of [`CacheManager::save_to_cache`].
#[derive(Debug, Clone, PartialEq)]
pub struct Saved {
    /// The entry now recorded for the source.
    pub entry: CacheEntry,
    /// Set when the artifact this save superseded could not be deleted.
    pub cleanup: Option<CleanupWarning>,
}

/// Aggregate numbers over the whole manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Number of entries.
    pub entries: usize,
    /// Sum of original source sizes.
    pub original_bytes: u64,
    /// Sum of compressed artifact sizes.
    pub compressed_bytes: u64,
}

impl CacheStats {
    /// Fraction of original bytes saved by compression, in `0.0..=1.0` for
    /// artifacts no larger than their sources. Zero when nothing is cached.
    pub fn savings_ratio(&self) -> f64 {
        if self.original_bytes == 0 {
            return 0.0;
        }
        1.0 - self.compressed_bytes as f64 / self.original_bytes as f64
    }
}

/// Owns the manifest for one cache directory.
///
/// Operations take `&mut self` and are expected to run one at a time. Use
/// [`SharedCache`](crate::SharedCache) when several threads need the same
/// directory.
#[derive(Debug)]
pub struct CacheManager {
    /// Root directory for the manifest and artifacts. Absolute once
    /// [`initialize`](Self::initialize) has run.
    cache_dir: PathBuf,

    /// In-memory manifest; authoritative for this instance.
    manifest: Manifest,

    /// Artifact storage inside `cache_dir`.
    store: ArtifactStore,
}

impl CacheManager {
    /// Creates a manager bound to `cache_dir` without touching the disk.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        Self {
            store: ArtifactStore::new(&cache_dir),
            cache_dir,
            manifest: Manifest::new(),
        }
    }

    /// Creates a manager and runs [`initialize`](Self::initialize).
    pub fn open(cache_dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let mut manager = Self::new(cache_dir);
        manager.initialize()?;
        Ok(manager)
    }

    /// Ensures the cache directory exists and loads its manifest.
    ///
    /// A missing, corrupt or foreign-version manifest is replaced by an
    /// empty one, which is written immediately so the directory always holds
    /// a readable manifest afterwards. Calling this again reloads from disk.
    pub fn initialize(&mut self) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|e| CacheError::Io {
            path: self.cache_dir.clone(),
            source: e,
        })?;
        self.cache_dir = std::fs::canonicalize(&self.cache_dir).map_err(|e| CacheError::Io {
            path: self.cache_dir.clone(),
            source: e,
        })?;
        self.store = ArtifactStore::new(&self.cache_dir);

        match Manifest::load(&self.cache_dir) {
            Ok(manifest) => {
                debug!(
                    dir = %self.cache_dir.display(),
                    entries = manifest.len(),
                    "loaded cache manifest"
                );
                self.manifest = manifest;
            }
            Err(err) => {
                match &err {
                    CacheError::Io { .. } => {
                        debug!(dir = %self.cache_dir.display(), "no cache manifest, starting fresh")
                    }
                    _ => warn!(
                        dir = %self.cache_dir.display(),
                        error = %err,
                        "discarding unreadable cache manifest"
                    ),
                }
                self.manifest = Manifest::new();
                self.persist()?;
            }
        }
        Ok(())
    }

    /// Looks up a reusable artifact for `original_path` under `settings`.
    ///
    /// The source is always re-read and hashed; failing to read it is an
    /// error. An entry whose hash or settings no longer match is invalidated,
    /// and one whose artifact vanished is dropped from the manifest. A hit
    /// leaves the manifest untouched.
    pub fn get_cached_file(
        &mut self,
        original_path: &Path,
        settings: &Value,
    ) -> Result<Lookup, CacheError> {
        let current = SourceHasher::hash_file(original_path)?;

        let reason = match self.manifest.entries.get(original_path) {
            None => {
                debug!(path = %original_path.display(), "cache miss: not cached");
                return Ok(Lookup::miss(MissReason::NotCached));
            }
            Some(entry) if entry.source_hash != current => MissReason::SourceChanged,
            Some(entry) if entry.settings != *settings => MissReason::SettingsChanged,
            Some(entry) if !ArtifactStore::exists(&entry.compressed_path) => {
                MissReason::ArtifactMissing
            }
            Some(entry) => {
                debug!(path = %original_path.display(), "cache hit");
                return Ok(Lookup::Hit(entry.clone()));
            }
        };

        debug!(
            path = %original_path.display(),
            reason = reason.as_str(),
            "cache miss"
        );

        let cleanup = if reason == MissReason::ArtifactMissing {
            let removed = self.manifest.entries.remove(original_path);
            self.commit(original_path, removed)?;
            None
        } else {
            self.invalidate_cache(original_path)?.cleanup
        };

        Ok(Lookup::Miss { reason, cleanup })
    }

    /// Stores `compressed` as the artifact for `original_path`.
    ///
    /// The artifact is named after the source's content hash and extension and
    /// written before the manifest, which is persisted before returning. An
    /// artifact superseded by this save is deleted unless another entry still
    /// uses it; a failure to delete it is reported in [`Saved::cleanup`].
    ///
    /// Sources with identical content and extension share one artifact file,
    /// so saving one of them replaces the bytes every such entry serves, even
    /// when the entries were stored under different settings.
    ///
    /// If the manifest cannot be written, the entry for `original_path` is
    /// dropped from memory rather than restored whenever the old entry
    /// pointed at the artifact just overwritten, and the written artifact is
    /// deleted if nothing else references it. A stale entry on disk then
    /// resolves to a miss instead of serving the new bytes.
    ///
    /// The path must be valid UTF-8, since the manifest stores keys as JSON
    /// strings.
    pub fn save_to_cache(
        &mut self,
        original_path: &Path,
        compressed: &[u8],
        settings: &Value,
    ) -> Result<Saved, CacheError> {
        let source = SourceHasher::read_source(original_path)?;
        if original_path.to_str().is_none() {
            return Err(CacheError::NonUtf8Path {
                path: original_path.to_path_buf(),
            });
        }
        let source_hash = ContentHash::from_bytes(&source);

        let compressed_path = self.store.write(&source_hash, original_path, compressed)?;

        let entry = CacheEntry {
            source_hash,
            compressed_path,
            timestamp: self.next_timestamp(original_path),
            settings: settings.clone(),
            size: EntrySize {
                original: source.len() as u64,
                compressed: compressed.len() as u64,
            },
        };

        let previous = self
            .manifest
            .entries
            .insert(original_path.to_path_buf(), entry.clone());
        if let Err(err) = self.persist() {
            self.manifest.entries.remove(original_path);
            if let Some(previous) = previous {
                if previous.compressed_path != entry.compressed_path {
                    self.manifest
                        .entries
                        .insert(original_path.to_path_buf(), previous);
                }
            }
            let _ = self.release_artifact(&entry.compressed_path);
            return Err(err);
        }

        debug!(
            path = %original_path.display(),
            artifact = %entry.compressed_path.display(),
            original = entry.size.original,
            compressed = entry.size.compressed,
            "stored artifact"
        );

        let cleanup = match previous {
            Some(previous) if previous.compressed_path != entry.compressed_path => {
                self.release_artifact(&previous.compressed_path).err()
            }
            _ => None,
        };

        Ok(Saved { entry, cleanup })
    }

    /// Removes the entry for `original_path` and deletes its artifact.
    ///
    /// The artifact is kept if another entry shares it. The manifest is
    /// persisted before the artifact is touched. A failure to delete it is
    /// logged and returned in [`Invalidation::cleanup`]; the entry stays
    /// removed either way.
    ///
    /// Returns [`CacheError::EntryNotFound`] if there is no entry for the path.
    pub fn invalidate_cache(&mut self, original_path: &Path) -> Result<Invalidation, CacheError> {
        let removed =
            self.manifest
                .entries
                .remove(original_path)
                .ok_or_else(|| CacheError::EntryNotFound {
                    path: original_path.to_path_buf(),
                })?;
        self.commit(original_path, Some(removed.clone()))?;

        let (artifact_deleted, cleanup) = match self.release_artifact(&removed.compressed_path) {
            Ok(deleted) => (deleted, None),
            Err(warning) => (false, Some(warning)),
        };

        Ok(Invalidation {
            removed,
            artifact_deleted,
            cleanup,
        })
    }

    /// Drops every entry whose original file no longer exists.
    ///
    /// Returns the number of entries removed.
    pub fn prune_missing_sources(&mut self) -> Result<usize, CacheError> {
        let missing: Vec<PathBuf> = self
            .manifest
            .entries
            .keys()
            .filter(|path| !path.exists())
            .cloned()
            .collect();
        for path in &missing {
            self.invalidate_cache(path)?;
        }
        Ok(missing.len())
    }

    /// Invalidates every entry. Returns the number of entries removed.
    pub fn clear(&mut self) -> Result<usize, CacheError> {
        let paths: Vec<PathBuf> = self.manifest.entries.keys().cloned().collect();
        for path in &paths {
            self.invalidate_cache(path)?;
        }
        Ok(paths.len())
    }

    /// Deletes files in the cache directory that no entry references.
    ///
    /// Never run implicitly by the other operations.
    pub fn gc(&self) -> Result<GcReport, CacheError> {
        let live: HashSet<PathBuf> = self
            .manifest
            .entries
            .values()
            .map(|entry| entry.compressed_path.clone())
            .collect();
        self.store.gc(&live)
    }

    /// Classifies every entry against the disk without modifying anything.
    pub fn verify(&self) -> Vec<(PathBuf, EntryStatus)> {
        SourceHasher::verify(&self.manifest)
    }

    /// Returns aggregate entry counts and sizes.
    pub fn stats(&self) -> CacheStats {
        self.manifest
            .entries
            .values()
            .fold(CacheStats::default(), |mut stats, entry| {
                stats.entries += 1;
                stats.original_bytes += entry.size.original;
                stats.compressed_bytes += entry.size.compressed;
                stats
            })
    }

    /// Returns the entry for `original_path` without validating it.
    pub fn entry(&self, original_path: &Path) -> Option<&CacheEntry> {
        self.manifest.entries.get(original_path)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    /// Returns `true` if no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }

    /// Returns the in-memory manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Returns the cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn persist(&self) -> Result<(), CacheError> {
        self.manifest.save(&self.cache_dir)
    }

    /// Persists a change to the entry for `original_path`, putting `previous`
    /// back in memory if the write fails so memory never runs ahead of disk.
    fn commit(
        &mut self,
        original_path: &Path,
        previous: Option<CacheEntry>,
    ) -> Result<(), CacheError> {
        let Err(err) = self.persist() else {
            return Ok(());
        };
        match previous {
            Some(entry) => self.manifest.entries.insert(original_path.to_path_buf(), entry),
            None => self.manifest.entries.remove(original_path),
        };
        Err(err)
    }

    /// Deletes an artifact no longer referenced by any entry.
    fn release_artifact(&self, artifact: &Path) -> Result<bool, CleanupWarning> {
        if self.manifest.references(artifact) {
            debug!(artifact = %artifact.display(), "artifact still shared, keeping");
            return Ok(false);
        }
        ArtifactStore::remove(artifact).inspect_err(|warning| {
            warn!(
                artifact = %warning.path.display(),
                reason = %warning.reason,
                "artifact cleanup failed"
            );
        })
    }

    /// Current epoch-millis, forced past the previous timestamp for this path.
    fn next_timestamp(&self, original_path: &Path) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        match self.manifest.entries.get(original_path) {
            Some(previous) if previous.timestamp >= now => previous.timestamp + 1,
            _ => now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_cache() -> (tempfile::TempDir, CacheManager) {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::open(dir.path().join("cache")).unwrap();
        (dir, cache)
    }

    fn write_source(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn initialize_creates_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("a").join("b").join("cache");
        let cache = CacheManager::open(&cache_dir).unwrap();
        assert!(cache.is_empty());
        assert!(cache_dir.join("manifest.json").exists());
        assert!(cache.cache_dir().is_absolute());
    }

    #[test]
    fn initialize_replaces_corrupt_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("manifest.json"), "{ broken").unwrap();

        let cache = CacheManager::open(dir.path()).unwrap();
        assert!(cache.is_empty());
        assert!(Manifest::load(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn initialize_resets_foreign_version() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("manifest.json"),
            r#"{ "version": "0", "entries": {} }"#,
        )
        .unwrap();

        let cache = CacheManager::open(dir.path()).unwrap();
        assert_eq!(cache.manifest().version, crate::manifest::MANIFEST_VERSION);
        assert_eq!(Manifest::load(dir.path()).unwrap().version, "1");
    }

    #[test]
    fn initialize_is_idempotent() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.css", "a { }");
        cache.save_to_cache(&src, b"a{}", &json!({})).unwrap();

        cache.initialize().unwrap();
        cache.initialize().unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lookup_unknown_path_is_not_cached() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.css", "a { }");
        let lookup = cache.get_cached_file(&src, &json!({})).unwrap();
        assert_eq!(lookup.miss_reason(), Some(MissReason::NotCached));
    }

    #[test]
    fn lookup_missing_source_is_error() {
        let (dir, mut cache) = make_cache();
        let err = cache
            .get_cached_file(&dir.path().join("missing.css"), &json!({}))
            .unwrap_err();
        assert!(matches!(err, CacheError::SourceUnreadable { .. }));
    }

    #[test]
    fn save_missing_source_is_error() {
        let (dir, mut cache) = make_cache();
        let err = cache
            .save_to_cache(&dir.path().join("missing.css"), b"x", &json!({}))
            .unwrap_err();
        assert!(matches!(err, CacheError::SourceUnreadable { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn save_records_entry() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "style.css", "body { color: red; }");
        let settings = json!({ "format": "css" });

        let entry = cache.save_to_cache(&src, b"body{color:red}", &settings).unwrap().entry;

        let hash = ContentHash::from_bytes(b"body { color: red; }");
        assert_eq!(entry.source_hash, hash);
        assert_eq!(
            entry.compressed_path,
            cache.cache_dir().join(format!("{hash}.css"))
        );
        assert_eq!(entry.settings, settings);
        assert_eq!(entry.size.original, 20);
        assert_eq!(entry.size.compressed, 15);
        assert_eq!(cache.entry(&src), Some(&entry));
    }

    #[test]
    fn resave_advances_timestamp() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.js", "let a = 1;");
        let first = cache.save_to_cache(&src, b"let a=1", &json!({})).unwrap().entry;
        let second = cache.save_to_cache(&src, b"let a=1", &json!({})).unwrap().entry;
        assert!(second.timestamp > first.timestamp);
    }

    #[test]
    fn hit_is_read_only() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.js", "let a = 1;");
        cache.save_to_cache(&src, b"let a=1", &json!({})).unwrap();
        let before = std::fs::read_to_string(cache.cache_dir().join("manifest.json")).unwrap();

        assert!(cache.get_cached_file(&src, &json!({})).unwrap().is_hit());

        let after = std::fs::read_to_string(cache.cache_dir().join("manifest.json")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn settings_compare_structurally() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.html", "<p>hi</p>");
        let stored: Value = serde_json::from_str(r#"{"a":1,"b":{"c":[1,2]}}"#).unwrap();
        let reordered: Value = serde_json::from_str(r#"{"b":{"c":[1,2]},"a":1}"#).unwrap();
        cache.save_to_cache(&src, b"<p>hi", &stored).unwrap();

        assert!(cache.get_cached_file(&src, &reordered).unwrap().is_hit());
    }

    #[test]
    fn settings_change_invalidates() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.css", "a { }");
        let entry = cache
            .save_to_cache(&src, b"a{}", &json!({ "level": 1 }))
            .unwrap()
            .entry;

        let lookup = cache.get_cached_file(&src, &json!({ "level": 2 })).unwrap();
        assert_eq!(lookup.miss_reason(), Some(MissReason::SettingsChanged));
        assert!(cache.entry(&src).is_none());
        assert!(!entry.compressed_path.exists());
    }

    #[test]
    fn missing_artifact_prunes_entry() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.css", "a { }");
        let entry = cache.save_to_cache(&src, b"a{}", &json!({})).unwrap().entry;
        std::fs::remove_file(&entry.compressed_path).unwrap();

        let lookup = cache.get_cached_file(&src, &json!({})).unwrap();
        assert_eq!(lookup.miss_reason(), Some(MissReason::ArtifactMissing));
        assert!(cache.is_empty());
        assert!(Manifest::load(cache.cache_dir()).unwrap().is_empty());
    }

    #[test]
    fn invalidate_unknown_path_errors() {
        let (dir, mut cache) = make_cache();
        let err = cache
            .invalidate_cache(&dir.path().join("never.css"))
            .unwrap_err();
        assert!(matches!(err, CacheError::EntryNotFound { .. }));
    }

    #[test]
    fn invalidate_removes_entry_and_artifact() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.css", "a { }");
        let entry = cache.save_to_cache(&src, b"a{}", &json!({})).unwrap().entry;

        let inv = cache.invalidate_cache(&src).unwrap();
        assert_eq!(inv.removed, entry);
        assert!(inv.artifact_deleted);
        assert!(inv.cleanup.is_none());
        assert!(!entry.compressed_path.exists());
        assert!(Manifest::load(cache.cache_dir()).unwrap().is_empty());
    }

    #[test]
    fn invalidate_with_missing_artifact_still_removes_entry() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.css", "a { }");
        let entry = cache.save_to_cache(&src, b"a{}", &json!({})).unwrap().entry;
        std::fs::remove_file(&entry.compressed_path).unwrap();

        let inv = cache.invalidate_cache(&src).unwrap();
        assert!(!inv.artifact_deleted);
        assert!(inv.cleanup.is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn undeletable_artifact_is_soft_warning() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.css", "a { }");
        let entry = cache.save_to_cache(&src, b"a{}", &json!({})).unwrap().entry;
        // A directory in place of the artifact makes remove_file fail.
        std::fs::remove_file(&entry.compressed_path).unwrap();
        std::fs::create_dir(&entry.compressed_path).unwrap();

        let inv = cache.invalidate_cache(&src).unwrap();
        let warning = inv.cleanup.expect("cleanup warning");
        assert_eq!(warning.path, entry.compressed_path);
        assert!(cache.is_empty());
        assert!(Manifest::load(cache.cache_dir()).unwrap().is_empty());
    }

    #[test]
    fn identical_sources_share_artifact() {
        let (dir, mut cache) = make_cache();
        let a = write_source(&dir, "a.css", "same");
        let b = write_source(&dir, "b.css", "same");
        let entry_a = cache.save_to_cache(&a, b"s", &json!({})).unwrap().entry;
        let entry_b = cache.save_to_cache(&b, b"s", &json!({})).unwrap().entry;
        assert_eq!(entry_a.compressed_path, entry_b.compressed_path);

        let inv = cache.invalidate_cache(&a).unwrap();
        assert!(!inv.artifact_deleted);
        assert!(entry_b.compressed_path.exists());
        assert!(cache.get_cached_file(&b, &json!({})).unwrap().is_hit());
    }

    #[test]
    fn shared_artifact_serves_latest_bytes_to_every_entry() {
        let (dir, mut cache) = make_cache();
        let a = write_source(&dir, "a.css", "same");
        let b = write_source(&dir, "b.css", "same");
        let settings_a = json!({ "level": 1 });
        cache.save_to_cache(&a, b"from-a", &settings_a).unwrap();
        cache
            .save_to_cache(&b, b"from-b", &json!({ "level": 2 }))
            .unwrap();

        let entry = cache
            .get_cached_file(&a, &settings_a)
            .unwrap()
            .into_entry()
            .unwrap();
        assert_eq!(entry.settings, settings_a);
        assert_eq!(std::fs::read(&entry.compressed_path).unwrap(), b"from-b");
    }

    #[test]
    fn save_over_changed_source_removes_old_artifact() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.css", "one");
        let old = cache.save_to_cache(&src, b"1", &json!({})).unwrap().entry;
        std::fs::write(&src, "two").unwrap();

        let new = cache.save_to_cache(&src, b"2", &json!({})).unwrap().entry;
        assert_ne!(old.compressed_path, new.compressed_path);
        assert!(!old.compressed_path.exists());
        assert!(new.compressed_path.exists());
    }

    #[test]
    fn undeletable_superseded_artifact_is_soft_warning() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.css", "one");
        let old = cache.save_to_cache(&src, b"1", &json!({})).unwrap().entry;
        std::fs::remove_file(&old.compressed_path).unwrap();
        std::fs::create_dir(&old.compressed_path).unwrap();
        std::fs::write(&src, "two").unwrap();

        let saved = cache.save_to_cache(&src, b"2", &json!({})).unwrap();
        let warning = saved.cleanup.expect("cleanup warning");
        assert_eq!(warning.path, old.compressed_path);
        assert_eq!(cache.entry(&src), Some(&saved.entry));
    }

    #[test]
    fn failed_persist_rolls_back_save() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.css", "a { }");
        // A directory at the temporary manifest name makes every write fail.
        std::fs::create_dir(cache.cache_dir().join(".manifest.json.partial")).unwrap();

        let err = cache.save_to_cache(&src, b"a{}", &json!({})).unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
        assert!(cache.entry(&src).is_none());
        let lookup = cache.get_cached_file(&src, &json!({})).unwrap();
        assert_eq!(lookup.miss_reason(), Some(MissReason::NotCached));
        let hash = ContentHash::from_bytes(b"a { }");
        assert!(!cache.cache_dir().join(format!("{hash}.css")).exists());
    }

    #[test]
    fn failed_resave_never_serves_new_bytes_under_old_settings() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.css", "a { }");
        let old = json!({ "level": 1 });
        let entry = cache.save_to_cache(&src, b"OLD", &old).unwrap().entry;
        let blocker = cache.cache_dir().join(".manifest.json.partial");
        std::fs::create_dir(&blocker).unwrap();

        assert!(cache
            .save_to_cache(&src, b"NEW", &json!({ "level": 2 }))
            .is_err());
        assert!(!cache.get_cached_file(&src, &old).unwrap().is_hit());
        assert!(!entry.compressed_path.exists());

        // The manifest on disk still names the old entry; it must self-heal.
        std::fs::remove_dir(&blocker).unwrap();
        let mut reopened = CacheManager::open(cache.cache_dir()).unwrap();
        let lookup = reopened.get_cached_file(&src, &old).unwrap();
        assert_eq!(lookup.miss_reason(), Some(MissReason::ArtifactMissing));
    }

    #[test]
    fn failed_persist_rolls_back_invalidate() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.css", "a { }");
        let entry = cache.save_to_cache(&src, b"a{}", &json!({})).unwrap().entry;
        let blocker = cache.cache_dir().join(".manifest.json.partial");
        std::fs::create_dir(&blocker).unwrap();

        assert!(cache.invalidate_cache(&src).is_err());
        assert_eq!(cache.entry(&src), Some(&entry));
        assert!(entry.compressed_path.exists());

        std::fs::remove_dir(&blocker).unwrap();
        assert!(cache.get_cached_file(&src, &json!({})).unwrap().is_hit());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_path_is_rejected_before_writing() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (dir, mut cache) = make_cache();
        let bad = dir.path().join(OsStr::from_bytes(b"bad\xff.css"));
        std::fs::write(&bad, "a { }").unwrap();
        let good = write_source(&dir, "good.css", "b { }");

        let err = cache.save_to_cache(&bad, b"a{}", &json!({})).unwrap_err();
        assert!(matches!(err, CacheError::NonUtf8Path { .. }));
        assert!(cache.is_empty());

        cache.save_to_cache(&good, b"b{}", &json!({})).unwrap();
        assert_eq!(Manifest::load(cache.cache_dir()).unwrap().len(), 1);
        let files = std::fs::read_dir(cache.cache_dir()).unwrap().count();
        assert_eq!(files, 2, "manifest plus the one good artifact");
    }

    #[test]
    fn stats_sum_sizes() {
        let (dir, mut cache) = make_cache();
        let a = write_source(&dir, "a.css", "aaaaaaaaaa");
        let b = write_source(&dir, "b.css", "bbbbbbbbbb");
        cache.save_to_cache(&a, b"aaaa", &json!({})).unwrap();
        cache.save_to_cache(&b, b"b", &json!({})).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.original_bytes, 20);
        assert_eq!(stats.compressed_bytes, 5);
        assert!((stats.savings_ratio() - 0.75).abs() < 1e-9);
        assert_eq!(CacheStats::default().savings_ratio(), 0.0);
    }

    #[test]
    fn prune_drops_vanished_sources() {
        let (dir, mut cache) = make_cache();
        let keep = write_source(&dir, "keep.css", "keep");
        let gone = write_source(&dir, "gone.css", "gone");
        cache.save_to_cache(&keep, b"k", &json!({})).unwrap();
        let gone_entry = cache.save_to_cache(&gone, b"g", &json!({})).unwrap().entry;
        std::fs::remove_file(&gone).unwrap();

        assert_eq!(cache.prune_missing_sources().unwrap(), 1);
        assert!(cache.entry(&keep).is_some());
        assert!(cache.entry(&gone).is_none());
        assert!(!gone_entry.compressed_path.exists());
    }

    #[test]
    fn clear_removes_everything() {
        let (dir, mut cache) = make_cache();
        let a = write_source(&dir, "a.css", "a");
        let b = write_source(&dir, "b.js", "b");
        cache.save_to_cache(&a, b"a", &json!({})).unwrap();
        cache.save_to_cache(&b, b"b", &json!({})).unwrap();

        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.is_empty());
        let files: Vec<_> = std::fs::read_dir(cache.cache_dir()).unwrap().collect();
        assert_eq!(files.len(), 1, "only the manifest should remain");
    }

    #[test]
    fn gc_keeps_live_artifacts() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.css", "a");
        let entry = cache.save_to_cache(&src, b"a", &json!({})).unwrap().entry;
        std::fs::write(cache.cache_dir().join("stray.css"), "stray").unwrap();

        let report = cache.gc().unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(report.bytes_freed, 5);
        assert!(entry.compressed_path.exists());
    }

    #[test]
    fn verify_reports_without_mutating() {
        let (dir, mut cache) = make_cache();
        let src = write_source(&dir, "a.css", "before");
        cache.save_to_cache(&src, b"b", &json!({})).unwrap();
        std::fs::write(&src, "after").unwrap();

        let report = cache.verify();
        assert_eq!(report, vec![(src.clone(), EntryStatus::SourceChanged)]);
        assert!(cache.entry(&src).is_some());
    }
}
