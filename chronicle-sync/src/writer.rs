//! Atomic writer for the published event log.
//!
//! ## `atomic_write`
//!
//! 1. Write to `<path>.chronicle.tmp`.
//! 2. Rename to the final path (atomic on POSIX).
//! 3. On rename failure, remove the `.tmp` and leave the original intact.
//!
//! [`publish`] writes the primary `<dest_root>/events.json` and, when the
//! publish directory already exists, an identical copy inside it.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use chronicle_core::{EventLogDocument, SyncConfig};

use crate::error::{io_err, SyncError};

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written; `digest` is the SHA-256 of the written bytes.
    Written { path: PathBuf, digest: String },
    /// `--dry-run` mode: the file *would* have been written.
    WouldWrite { path: PathBuf },
    /// The publish directory does not exist, so its copy was not written.
    Skipped { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path, .. }
            | WriteResult::WouldWrite { path }
            | WriteResult::Skipped { path } => path,
        }
    }
}

/// Serialize `document` and write it to every destination under `dest_root`.
pub fn publish(
    document: &EventLogDocument,
    dest_root: &Path,
    config: &SyncConfig,
    dry_run: bool,
) -> Result<Vec<WriteResult>, SyncError> {
    let content = document.to_pretty_json()?;
    let mut writes = Vec::with_capacity(2);

    tracing::info!(
        "writing {} ({} events)",
        config.source_file,
        document.event_count()
    );
    writes.push(atomic_write(&config.dest_path(dest_root), &content, dry_run)?);

    let publish_dir = config.publish_dir_at(dest_root);
    let publish_path = publish_dir.join(&config.source_file);
    if publish_dir.is_dir() {
        writes.push(atomic_write(&publish_path, &content, dry_run)?);
    } else {
        tracing::warn!(
            "{}/ directory not found, skipping {}",
            config.publish_dir,
            publish_path.display()
        );
        writes.push(WriteResult::Skipped { path: publish_path });
    }

    Ok(writes)
}

/// Atomically replace `path` with `content`.
pub(crate) fn atomic_write(
    path: &Path,
    content: &str,
    dry_run: bool,
) -> Result<WriteResult, SyncError> {
    let tmp = PathBuf::from(format!("{}.chronicle.tmp", path.display()));
    atomic_write_with_tmp(path, content, dry_run, &tmp)
}

fn atomic_write_with_tmp(
    path: &Path,
    content: &str,
    dry_run: bool,
    tmp: &Path,
) -> Result<WriteResult, SyncError> {
    if dry_run {
        tracing::info!("[dry-run] would write: {}", path.display());
        return Ok(WriteResult::WouldWrite {
            path: path.to_path_buf(),
        });
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
        digest: content_digest(content),
    })
}

fn content_digest(content: &str) -> String {
    let mut h = Sha256::new();
    h.update(content.as_bytes());
    hex::encode(h.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
