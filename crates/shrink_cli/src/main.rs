//! shrink CLI: inspect and drive a build-time compression cache.
//!
//! Provides `shrink status` for reporting on a cache directory, `shrink lookup`
//! and `shrink store` for the per-file cache protocol a build hook performs,
//! and `shrink invalidate`, `prune`, `gc` and `clear` for maintenance.

#![warn(missing_docs)]

mod lookup;
mod maintenance;
mod project;
mod status;
mod store;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// shrink, a content-addressed compression cache for asset builds.
#[derive(Parser, Debug)]
#[command(name = "shrink", version, about = "Build-time compression cache")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `shrink.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Cache directory to use instead of the configured one.
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarize the cache and list its entries.
    Status(StatusArgs),
    /// Check whether a cached artifact can be reused for a file.
    Lookup(LookupArgs),
    /// Record an externally compressed artifact for a file.
    Store(StoreArgs),
    /// Drop the cache entry for one file.
    Invalidate {
        /// The original source file.
        file: PathBuf,
    },
    /// Drop entries whose source files no longer exist.
    Prune,
    /// Delete artifact files no entry references.
    Gc,
    /// Drop every cache entry.
    Clear,
}

/// Arguments for the `shrink status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Print the raw manifest as JSON.
    #[arg(long)]
    pub json: bool,

    /// Re-hash sources and report which entries are stale.
    #[arg(long, conflicts_with = "json")]
    pub verify: bool,
}

/// Arguments for the `shrink lookup` subcommand.
#[derive(Parser, Debug)]
pub struct LookupArgs {
    /// The original source file.
    pub file: PathBuf,

    /// How the compression settings are chosen.
    #[command(flatten)]
    pub settings: SettingsArgs,
}

/// Arguments for the `shrink store` subcommand.
#[derive(Parser, Debug)]
pub struct StoreArgs {
    /// The original source file.
    pub file: PathBuf,

    /// File holding the compressed output for `file`.
    pub artifact: PathBuf,

    /// How the compression settings are chosen.
    #[command(flatten)]
    pub settings: SettingsArgs,
}

/// Selection of the settings fingerprint for `lookup` and `store`.
///
/// Without either flag the format is inferred from the file extension and
/// its settings are resolved from `shrink.toml`.
#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// Format whose configured settings apply (e.g., `css`, `js`).
    #[arg(long, conflicts_with = "settings")]
    pub format: Option<String>,

    /// Literal settings as a JSON value, bypassing the configuration.
    #[arg(long)]
    pub settings: Option<String>,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<PathBuf>,
    /// Optional cache directory override.
    pub cache_dir: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
        cache_dir: cli.cache_dir,
    };

    init_logging(&global);

    let result = match cli.command {
        Command::Status(ref args) => status::run(args, &global),
        Command::Lookup(ref args) => lookup::run(args, &global),
        Command::Store(ref args) => store::run(args, &global),
        Command::Invalidate { ref file } => maintenance::invalidate(file, &global),
        Command::Prune => maintenance::prune(&global),
        Command::Gc => maintenance::gc(&global),
        Command::Clear => maintenance::clear(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the stderr log subscriber.
///
/// `RUST_LOG` takes precedence over the `--quiet` / `--verbose` defaults.
fn init_logging(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(global)));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn default_log_filter(global: &GlobalArgs) -> &'static str {
    if global.quiet {
        "error"
    } else if global.verbose {
        "shrink_cli=debug,shrink_cache=debug"
    } else {
        "shrink_cli=info,shrink_cache=warn"
    }
}
