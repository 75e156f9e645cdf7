//! `shrink invalidate`, `prune`, `gc` and `clear`: cache maintenance.

use std::path::Path;

use tracing::{info, warn};

use crate::project::{load_project, source_key};
use crate::GlobalArgs;

/// Runs the `shrink invalidate` command.
///
/// Removes the entry for `file` and its artifact. A file with no entry is an
/// error. Returns exit code 0.
pub fn invalidate(file: &Path, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let mut cache = project.open_cache(global)?;
    let key = source_key(file)?;

    let invalidation = cache.invalidate_cache(&key)?;
    if let Some(warning) = &invalidation.cleanup {
        warn!("{warning}");
    }
    info!("invalidated {}", key.display());
    Ok(0)
}

/// Runs the `shrink prune` command. Returns exit code 0.
pub fn prune(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let mut cache = project.open_cache(global)?;
    let removed = cache.prune_missing_sources()?;
    info!("pruned {removed} entries with missing sources");
    Ok(0)
}

/// Runs the `shrink gc` command. Returns exit code 0.
pub fn gc(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let cache = project.open_cache(global)?;
    let report = cache.gc()?;
    info!(
        "removed {} unreferenced files ({} bytes)",
        report.removed, report.bytes_freed
    );
    Ok(0)
}

/// Runs the `shrink clear` command. Returns exit code 0.
pub fn clear(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let mut cache = project.open_cache(global)?;
    let removed = cache.clear()?;
    info!("cleared {removed} entries");
    Ok(0)
}
