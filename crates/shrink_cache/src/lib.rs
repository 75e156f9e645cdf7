//! Build-time content-addressed compression cache.
//!
//! This crate maps original source files to previously produced compressed
//! artifacts so repeated builds can skip recompressing unchanged inputs. An
//! artifact is reusable only while the source's content hash and the
//! compression settings both match what was recorded when it was stored.

#![warn(missing_docs)]

pub mod artifact;
pub mod cache;
pub mod error;
pub mod hasher;
pub mod manifest;
pub mod shared;

pub use artifact::{ArtifactStore, GcReport};
pub use cache::{CacheManager, CacheStats, Invalidation, Lookup, MissReason, Saved};
pub use error::{CacheError, CleanupWarning};
pub use hasher::{EntryStatus, SourceHasher};
pub use manifest::{CacheEntry, EntrySize, Manifest, MANIFEST_FILE, MANIFEST_VERSION};
pub use shared::{CacheRegistry, SharedCache};
