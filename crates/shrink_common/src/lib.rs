//! Shared foundational types used across the shrink build cache.
//!
//! This crate provides the content hash used both as the cache validity
//! fingerprint and as the stem of every stored artifact's filename.

#![warn(missing_docs)]

pub mod hash;

pub use hash::{ContentHash, ParseHashError};
