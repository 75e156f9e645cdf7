//! `shrink status`: cache summary and entry listing.

use std::path::PathBuf;

use shrink_cache::{CacheStats, EntryStatus};

use crate::project::load_project;
use crate::{GlobalArgs, StatusArgs};

/// Runs the `shrink status` command.
///
/// Prints a summary line followed by one line per entry. With `--json` the
/// manifest is printed instead; with `--verify` each entry is re-checked
/// against its source. Returns exit code 0.
pub fn run(args: &StatusArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let cache = project.open_cache(global)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(cache.manifest())?);
        return Ok(0);
    }

    if !global.quiet {
        eprintln!("      Cache {}", cache.cache_dir().display());
    }
    println!("{}", summary_line(&cache.stats()));

    if args.verify {
        let report = cache.verify();
        for (path, status) in &report {
            println!("  {:<16} {}", status_label(*status), path.display());
        }
        println!("{} stale", stale_count(&report));
    } else {
        for (path, entry) in &cache.manifest().entries {
            println!(
                "  {:>10} -> {:<10} {}",
                entry.size.original,
                entry.size.compressed,
                path.display()
            );
        }
    }

    Ok(0)
}

/// Formats the one-line summary for a cache.
pub fn summary_line(stats: &CacheStats) -> String {
    format!(
        "{} entries, {} bytes -> {} bytes ({:.1}% saved)",
        stats.entries,
        stats.original_bytes,
        stats.compressed_bytes,
        stats.savings_ratio() * 100.0
    )
}

fn status_label(status: EntryStatus) -> &'static str {
    match status {
        EntryStatus::Fresh => "fresh",
        EntryStatus::SourceChanged => "source changed",
        EntryStatus::SourceMissing => "source missing",
        EntryStatus::ArtifactMissing => "artifact missing",
    }
}

/// Counts entries that a lookup would not reuse, ignoring settings.
fn stale_count(report: &[(PathBuf, EntryStatus)]) -> usize {
    report
        .iter()
        .filter(|(_, status)| *status != EntryStatus::Fresh)
        .count()
}
