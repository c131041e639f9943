//! Chronicle: sync the village event log into a publishing repository.
//!
//! # Usage
//!
//! ```text
//! chronicle [--force] [--dry-run]          # sync into the current directory
//! chronicle sync [--force] [--dry-run]     # same, spelled out
//! chronicle check [--source <file>]        # validate only
//! chronicle diff                           # preview what a sync would change
//!
//! global: --dest <dir> --config <file> --upstream <url> --branch <name> --checkout-dir <dir>
//! ```
//!
//! Exit status is 0 on success (including "already up to date") and 1 on any
//! failure.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, diff::DiffArgs, sync::SyncArgs, GlobalArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "chronicle",
    version,
    about = "Sync the canonical events.json from the upstream event log",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(flatten)]
    sync: SyncArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the upstream events.json and write it if it changed (the default).
    Sync(SyncArgs),

    /// Validate the upstream (or a local) events.json without syncing.
    Check(CheckArgs),

    /// Show a unified diff of what a sync would write.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        None => cli.sync.run(&cli.global),
        Some(Commands::Sync(args)) => args.or(cli.sync).run(&cli.global),
        Some(Commands::Check(args)) => args.run(&cli.global),
        Some(Commands::Diff(args)) => args.run(&cli.global),
    }
}

fn init_logging() {
    use env_logger::Env;

    let env = Env::default().default_filter_or("warn");
    let _ = env_logger::Builder::from_env(env)
        .format_target(false)
        .format_timestamp(None)
        .try_init();
}
