//! Subcommand implementations and the settings they share.

pub mod check;
pub mod diff;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use chronicle_core::SyncConfig;

/// Flags accepted by every command.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Destination repository root (defaults to the current directory).
    #[arg(long, global = true, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Config file (defaults to `<dest>/.chronicle-sync.yaml` if present).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Upstream repository URL or path.
    #[arg(long, global = true, value_name = "URL")]
    pub upstream: Option<String>,

    /// Upstream branch to pull.
    #[arg(long, global = true)]
    pub branch: Option<String>,

    /// Reusable checkout directory for the upstream repository.
    #[arg(long, global = true, value_name = "DIR")]
    pub checkout_dir: Option<PathBuf>,
}

impl GlobalArgs {
    /// Destination root and fully layered config: defaults, config file,
    /// environment, then these flags.
    pub fn resolve(&self) -> Result<(PathBuf, SyncConfig)> {
        let dest_root = match &self.dest {
            Some(dest) => dest.clone(),
            None => std::env::current_dir().context("could not determine current directory")?,
        };

        let mut config = match &self.config {
            Some(path) => {
                let mut config = SyncConfig::load_file(path)
                    .with_context(|| format!("failed to load config {}", path.display()))?;
                config.apply_env();
                config
            }
            None => SyncConfig::load_at(&dest_root).context("failed to load config")?,
        };

        if let Some(upstream) = &self.upstream {
            config.upstream_url = upstream.clone();
        }
        if let Some(branch) = &self.branch {
            config.branch = branch.clone();
        }
        if let Some(checkout_dir) = &self.checkout_dir {
            config.checkout_dir = checkout_dir.clone();
        }

        Ok((dest_root, config))
    }
}
