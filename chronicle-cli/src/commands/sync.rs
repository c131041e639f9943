//! `chronicle`: validate the upstream event log and write it if it changed.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use chronicle_sync::{git, pipeline, SyncOutcome, SyncReport, ValidatedBy, WriteResult};

use super::GlobalArgs;

/// Arguments for the default sync command.
#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Write even if nothing changed (same as `FORCE_SYNC=true`).
    #[arg(long)]
    pub force: bool,

    /// Show what would be written without actually writing any files.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    /// Combine flags given before and after the `sync` subcommand.
    pub fn or(self, other: SyncArgs) -> SyncArgs {
        SyncArgs {
            force: self.force || other.force,
            dry_run: self.dry_run || other.dry_run,
        }
    }

    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let (dest_root, mut config) = global.resolve()?;
        if self.force {
            config.force = true;
        }

        println!("Syncing {} from {}", config.source_file, config.upstream_url);
        println!("Destination: {}", dest_root.display());

        let report = pipeline::run(&config, &dest_root, self.dry_run)
            .with_context(|| format!("sync from {} failed", config.upstream_url))?;
        print_report(&report);

        if matches!(report.outcome, SyncOutcome::Written(_)) {
            if let Some(stat) = git::diff_stat(&dest_root) {
                println!("\nChanges:\n{stat}");
            }
        }
        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    match report.validated_by {
        ValidatedBy::External => println!("{} validator passed", "✓".green()),
        ValidatedBy::Fallback(summary) => println!(
            "{} basic validation passed: {} events, {} days",
            "✓".green(),
            summary.events,
            summary.days_covered
        ),
    }

    let prefix = match report.outcome {
        SyncOutcome::UpToDate => {
            println!(
                "{} Already up to date ({} events, {})",
                "✓".green(),
                report.event_count,
                short_digest(&report.events_fingerprint)
            );
            return;
        }
        SyncOutcome::Written(reason) => {
            println!(
                "{} Synced {} events ({reason})",
                "✓".green(),
                report.event_count
            );
            ""
        }
        SyncOutcome::WouldWrite(reason) => {
            println!(
                "[dry-run] {} would sync {} events ({reason})",
                "~".yellow(),
                report.event_count
            );
            "[dry-run] "
        }
    };

    for write in &report.writes {
        match write {
            WriteResult::Written { path, digest } => {
                println!("{prefix}  ✎  {} ({})", path.display(), short_digest(digest))
            }
            WriteResult::WouldWrite { path } => println!("{prefix}  ~  {}", path.display()),
            WriteResult::Skipped { path } => println!(
                "{prefix}  {}  {} (directory not found, skipped)",
                "·".dimmed(),
                path.display()
            ),
        }
    }
    if report.date_note_patched {
        println!("{prefix}  fixed metadata date_note: 465 → 466 events");
    }
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
