//! `chronicle check`: validate an event log without syncing.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use chronicle_sync::{pipeline, validate, ValidatedBy};

use super::GlobalArgs;

/// Arguments for `chronicle check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Check a local file with the built-in checks instead of the upstream checkout.
    #[arg(long, value_name = "FILE")]
    pub source: Option<PathBuf>,
}

impl CheckArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let (_dest_root, config) = global.resolve()?;

        let verdict = match &self.source {
            Some(path) => {
                let summary = validate::check_file(path, &config.privacy)
                    .with_context(|| format!("{} failed validation", path.display()))?;
                ValidatedBy::Fallback(summary)
            }
            None => pipeline::check(&config)
                .with_context(|| format!("validation of {} failed", config.upstream_url))?,
        };

        match verdict {
            ValidatedBy::External => println!("{} validator passed", "✓".green()),
            ValidatedBy::Fallback(summary) => println!(
                "{} basic validation passed: {} events, {} days",
                "✓".green(),
                summary.events,
                summary.days_covered
            ),
        }
        Ok(())
    }
}
