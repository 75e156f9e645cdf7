//! `shrink lookup`: ask the cache for a reusable artifact.

use shrink_cache::Lookup;
use tracing::warn;

use crate::project::{load_project, source_key};
use crate::{GlobalArgs, LookupArgs};

/// Exit code reported when no reusable artifact exists.
pub const MISS_EXIT_CODE: i32 = 2;

/// Runs the `shrink lookup` command.
///
/// Prints the artifact path on a hit and the miss reason otherwise. A stale
/// entry found along the way is removed, exactly as a build hook's lookup
/// would. Returns exit code 0 on a hit and 2 on a miss.
pub fn run(args: &LookupArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    if !project.config.cache.enabled {
        println!("miss (cache disabled)");
        return Ok(MISS_EXIT_CODE);
    }

    let key = source_key(&args.file)?;
    let settings = project.settings_for(&key, &args.settings)?;
    let mut cache = project.open_cache(global)?;

    match cache.get_cached_file(&key, &settings)? {
        Lookup::Hit(entry) => {
            println!("hit {}", entry.compressed_path.display());
            Ok(0)
        }
        Lookup::Miss { reason, cleanup } => {
            if let Some(warning) = cleanup {
                warn!("{warning}");
            }
            println!("miss ({})", reason.as_str());
            Ok(MISS_EXIT_CODE)
        }
    }
}
