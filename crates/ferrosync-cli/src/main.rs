//! ferrosync - two-way tree synchronizer
//!
//! Reconciles two directory trees, one-way (mirror or retain) or in both
//! directions with the newer side winning, and reports every decision.

mod display;
mod json_output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use ferrosync_config::{Config, ConfigLoader};
use ferrosync_store::LocalStore;
use ferrosync_sync::{synchronize, SyncOptions};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// ferrosync - two-way tree synchronizer
#[derive(Parser)]
#[command(
    name = "ferrosync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Two-way tree synchronizer",
    long_about = "ferrosync reconciles two directory trees. It copies new and changed entries,\n\
                  removes or keeps orphans, resolves bidirectional conflicts by modification\n\
                  time and can plan a run without touching either side."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize RIGHT with LEFT
    Sync {
        /// Left (source) directory
        left: PathBuf,
        /// Right (destination) directory
        right: PathBuf,
        /// Reconcile both ways; the newer side wins
        #[arg(short, long)]
        bidirectional: bool,
        /// Dry run - show what would be done
        #[arg(long)]
        dry_run: bool,
        /// Keep entries that only exist on the right
        #[arg(long)]
        retain: bool,
        /// Process one entry at a time
        #[arg(long)]
        serial: bool,
        /// Compare by size and modification time only
        #[arg(long)]
        skip_checksum: bool,
        /// Do not compare or copy permissions
        #[arg(long)]
        ignore_acl: bool,
        /// Only synchronize the top-level entries
        #[arg(long)]
        no_recurse: bool,
        /// Exclude paths matching a glob (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

/// Command-line overrides for one sync run
struct SyncFlags {
    bidirectional: bool,
    dry_run: bool,
    retain: bool,
    serial: bool,
    skip_checksum: bool,
    ignore_acl: bool,
    no_recurse: bool,
    exclude: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load_default()?,
    };

    init_logging(cli.debug, cli.quiet, cli.verbose, &config.logging.level)?;

    info!("ferrosync v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Sync {
            left,
            right,
            bidirectional,
            dry_run,
            retain,
            serial,
            skip_checksum,
            ignore_acl,
            no_recurse,
            exclude,
            json,
        } => {
            let flags = SyncFlags {
                bidirectional,
                dry_run,
                retain,
                serial,
                skip_checksum,
                ignore_acl,
                no_recurse,
                exclude,
            };
            let ok = sync_command(&config, left, right, flags, json, cli.quiet).await?;
            if !ok {
                std::process::exit(1);
            }
        }
        Commands::Config { default } => {
            config_command(&config, default)?;
        }
    }

    Ok(())
}

fn init_logging(debug: bool, quiet: bool, verbose: bool, configured: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        configured
    };

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn build_options(config: &Config, flags: SyncFlags) -> Result<SyncOptions> {
    let mut options = SyncOptions::from_config(config)?.exclude(&flags.exclude)?;
    if flags.bidirectional {
        options = options.with_bidirectional(true);
    }
    if flags.dry_run {
        options = options.dry_run(true);
    }
    if flags.retain {
        options = options.retain_orphans(true);
    }
    if flags.serial {
        options = options.serial(true);
    }
    if flags.skip_checksum {
        options = options.skip_checksum(true);
    }
    if flags.ignore_acl {
        options = options.ignore_acl(true);
    }
    if flags.no_recurse {
        options = options.recursive(false);
    }
    Ok(options)
}

async fn sync_command(
    config: &Config,
    left: PathBuf,
    right: PathBuf,
    flags: SyncFlags,
    json: bool,
    quiet: bool,
) -> Result<bool> {
    let show_progress = !quiet && !json;
    let mut options = build_options(config, flags)?;

    if show_progress {
        println!(
            "{} Synchronizing {} {} {}",
            style("⟲").blue().bold(),
            style(left.display()).cyan(),
            if options.bidirectional { "<->" } else { "->" },
            style(right.display()).cyan()
        );
        if options.dry_run {
            println!(
                "{} Dry run mode - no changes will be made",
                style("ℹ").yellow()
            );
        }
    }

    let spinner = display::create_spinner(!show_progress);
    if let Some(pb) = &spinner {
        let pb = pb.clone();
        let seen = Arc::new(AtomicU64::new(0));
        options = options.observer(move |entry| {
            let count = seen.fetch_add(1, Ordering::Relaxed) + 1;
            pb.set_message(format!("{} entries, at {}", count, entry.left_path));
        });
    }

    let left_store = Arc::new(LocalStore::new(&left));
    let right_store = Arc::new(LocalStore::new(&right));
    let report = synchronize(left_store, "", right_store, "", &options).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    if json {
        let output = json_output::SyncResultJson::new(&report, &left, &right, &options);
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !quiet {
        display::print_report(&report, options.dry_run);
    }

    Ok(!report.has_errors())
}

fn config_command(config: &Config, default: bool) -> Result<()> {
    if default {
        println!("{} Default configuration:", style("⚙").blue().bold());
        print!("{}", serde_yaml::to_string(&Config::default())?);
    } else {
        println!("{} Current configuration:", style("⚙").blue().bold());
        match ConfigLoader::config_exists() {
            Some(path) => println!("# loaded from {}", path.display()),
            None => println!("# no configuration file found, using defaults"),
        }
        print!("{}", serde_yaml::to_string(config)?);
    }
    Ok(())
}
