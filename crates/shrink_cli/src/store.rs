//! `shrink store`: record an externally produced artifact.

use tracing::{info, warn};

use crate::project::{load_project, source_key};
use crate::{GlobalArgs, StoreArgs};

/// Runs the `shrink store` command.
///
/// Reads the compressed bytes from the artifact file and saves them as the
/// cached result for the source under the resolved settings. Does nothing
/// when the cache is disabled. Returns exit code 0.
pub fn run(args: &StoreArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    if !project.config.cache.enabled {
        info!("cache disabled, not storing {}", args.file.display());
        return Ok(0);
    }

    let key = source_key(&args.file)?;
    let settings = project.settings_for(&key, &args.settings)?;
    let compressed = std::fs::read(&args.artifact)
        .map_err(|e| format!("cannot read artifact {}: {e}", args.artifact.display()))?;

    let mut cache = project.open_cache(global)?;
    let saved = cache.save_to_cache(&key, &compressed, &settings)?;
    if let Some(warning) = &saved.cleanup {
        warn!("{warning}");
    }
    let entry = saved.entry;

    info!(
        "stored {} ({} -> {} bytes)",
        key.display(),
        entry.size.original,
        entry.size.compressed
    );
    if !global.quiet {
        println!("{}", entry.compressed_path.display());
    }
    Ok(0)
}
