//! Thread-safe access to one cache directory.
//!
//! A [`CacheManager`] assumes sequential callers. [`SharedCache`] serializes
//! access behind a mutex so each mutation and the manifest write that follows
//! it happen under one lock, and [`CacheRegistry`] hands out a single shared
//! manager per cache directory so that every caller in the process sees the
//! same manifest.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::cache::{CacheManager, Invalidation, Lookup, Saved};
use crate::error::CacheError;

/// A cloneable handle to a mutex-guarded [`CacheManager`].
#[derive(Debug, Clone)]
pub struct SharedCache {
    inner: Arc<Mutex<CacheManager>>,
}

impl SharedCache {
    /// Wraps an existing manager.
    pub fn new(manager: CacheManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    /// See [`CacheManager::initialize`].
    pub fn initialize(&self) -> Result<(), CacheError> {
        self.lock()?.initialize()
    }

    /// See [`CacheManager::get_cached_file`].
    pub fn get_cached_file(
        &self,
        original_path: &Path,
        settings: &Value,
    ) -> Result<Lookup, CacheError> {
        self.lock()?.get_cached_file(original_path, settings)
    }

    /// See [`CacheManager::save_to_cache`].
    pub fn save_to_cache(
        &self,
        original_path: &Path,
        compressed: &[u8],
        settings: &Value,
    ) -> Result<Saved, CacheError> {
        self.lock()?.save_to_cache(original_path, compressed, settings)
    }

    /// See [`CacheManager::invalidate_cache`].
    pub fn invalidate_cache(&self, original_path: &Path) -> Result<Invalidation, CacheError> {
        self.lock()?.invalidate_cache(original_path)
    }

    /// Runs `f` with exclusive access to the manager.
    pub fn with<T>(&self, f: impl FnOnce(&mut CacheManager) -> T) -> Result<T, CacheError> {
        let mut guard = self.lock()?;
        Ok(f(&mut guard))
    }

    /// Returns `true` if both handles point at the same manager.
    pub fn same_as(&self, other: &SharedCache) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheManager>, CacheError> {
        self.inner.lock().map_err(|_| CacheError::Poisoned)
    }
}

/// One [`SharedCache`] per canonical cache directory.
///
/// The registry is an ordinary value owned by the caller, so independent
/// registries (for example in parallel tests) never share state.
#[derive(Debug, Default)]
pub struct CacheRegistry {
    caches: Mutex<HashMap<PathBuf, SharedCache>>,
}

impl CacheRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared cache for `cache_dir`, opening it on first use.
    ///
    /// Different spellings of the same directory resolve to the same cache.
    pub fn open(&self, cache_dir: &Path) -> Result<SharedCache, CacheError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::Io {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;
        let key = std::fs::canonicalize(cache_dir).map_err(|e| CacheError::Io {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;

        let mut caches = self.caches.lock().map_err(|_| CacheError::Poisoned)?;
        if let Some(existing) = caches.get(&key) {
            return Ok(existing.clone());
        }
        let shared = SharedCache::new(CacheManager::open(&key)?);
        caches.insert(key, shared.clone());
        Ok(shared)
    }

    /// Number of directories opened so far.
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.caches.lock().map_err(|_| CacheError::Poisoned)?.len())
    }

    /// Returns `true` if no directory has been opened.
    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}
