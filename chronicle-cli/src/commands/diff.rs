//! `chronicle diff`: show the unified diff a sync would apply.

use anyhow::{Context, Result};
use clap::Args;

use chronicle_sync::{pipeline, preview};

use super::GlobalArgs;

/// Arguments for `chronicle diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {}

impl DiffArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let (dest_root, config) = global.resolve()?;

        let source = pipeline::load_upstream(&config)
            .with_context(|| format!("failed to load {} from upstream", config.source_file))?;
        let diff = preview(&source, &dest_root, &config).context("diff failed")?;

        let Some(diff) = diff else {
            println!("No differences for {}.", config.dest_path(&dest_root).display());
            return Ok(());
        };

        print!("{}", diff.unified_diff);
        if !diff.unified_diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
