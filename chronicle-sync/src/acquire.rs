//! Upstream checkout acquisition.
//!
//! The checkout directory is a cache: it is updated in place when possible
//! and rebuilt from a fresh clone otherwise.
//!
//! 1. Checkout with `.git` present and `origin` pointing at the configured
//!    URL → `git pull origin <branch>`.
//! 2. Pull failed, `origin` points elsewhere, or the directory is not a
//!    checkout → remove it.
//! 3. No checkout left → `git clone`. Failure here is fatal; there is no
//!    further retry.

use std::path::{Path, PathBuf};

use chronicle_core::SyncConfig;

use crate::error::{io_err, SyncError};
use crate::git;

/// Produce an up-to-date checkout at `config.checkout_dir`.
pub fn acquire(config: &SyncConfig) -> Result<PathBuf, SyncError> {
    acquire_at(&config.upstream_url, &config.branch, &config.checkout_dir)
}

/// Produce an up-to-date checkout of `url` at `checkout`.
pub fn acquire_at(url: &str, branch: &str, checkout: &Path) -> Result<PathBuf, SyncError> {
    if checkout.exists() {
        if !is_checkout(checkout) {
            tracing::warn!(
                "{} exists but is not a git checkout; replacing it",
                checkout.display()
            );
        } else if let Some(origin) = git::origin_url(checkout).filter(|origin| origin != url) {
            tracing::warn!(
                "checkout at {} tracks {origin}, not {url}; replacing it",
                checkout.display()
            );
        } else {
            match git::pull(checkout, branch) {
                Ok(()) => {
                    tracing::info!("updated checkout at {}", checkout.display());
                    return Ok(checkout.to_path_buf());
                }
                Err(err) => {
                    tracing::warn!(
                        "failed to update existing checkout at {}: {err}",
                        checkout.display()
                    );
                }
            }
        }
        remove_checkout(checkout)?;
    }

    if let Some(parent) = checkout.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    git::clone(url, checkout).map_err(|err| SyncError::Acquisition {
        url: url.to_string(),
        message: err.to_string(),
    })?;
    tracing::info!("cloned {url} into {}", checkout.display());
    Ok(checkout.to_path_buf())
}

fn is_checkout(dir: &Path) -> bool {
    dir.join(".git").exists()
}

fn remove_checkout(dir: &Path) -> Result<(), SyncError> {
    let result = if dir.is_dir() {
        std::fs::remove_dir_all(dir)
    } else {
        std::fs::remove_file(dir)
    };
    result.map_err(|e| io_err(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn clone_failure_is_acquisition_error() {
        let tmp = TempDir::new().unwrap();
        let missing_remote = tmp.path().join("no-such-remote.git");
        let checkout = tmp.path().join("cache").join("checkout");

        let err = acquire_at(
            missing_remote.to_str().unwrap(),
            "main",
            &checkout,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Acquisition { .. }), "got: {err}");
        assert!(err.to_string().contains("no-such-remote.git"));
    }

    #[test]
    fn stray_directory_is_removed_before_clone() {
        let tmp = TempDir::new().unwrap();
        let checkout = tmp.path().join("checkout");
        std::fs::create_dir_all(&checkout).unwrap();
        std::fs::write(checkout.join("leftover.txt"), "stale").unwrap();

        let missing_remote = tmp.path().join("no-such-remote.git");
        let _ = acquire_at(missing_remote.to_str().unwrap(), "main", &checkout);

        assert!(!checkout.join("leftover.txt").exists());
    }
}
