//! Unified diff preview for `chronicle diff`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use chronicle_core::{EventLogDocument, SyncConfig};

use crate::decision::{decide, load_destination};
use crate::{error::io_err, SyncError};

/// Bookkeeping fields carried over from the destination so that timestamps
/// do not show up as diff noise.
const STAMP_KEYS: [&str; 3] = ["last_updated", "synced_from", "synced_at"];

/// A single destination file diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Compare what a sync of `source` would write against the current primary
/// destination file.
///
/// Returns `None` whenever a sync would report "already up to date", so
/// differences confined to volatile metadata never produce a diff. Otherwise
/// the diff shows the file a sync would write, minus timestamp churn.
/// No files are written.
pub fn preview(
    source: &EventLogDocument,
    dest_root: &Path,
    config: &SyncConfig,
) -> Result<Option<FileDiff>, SyncError> {
    let path = config.dest_path(dest_root);
    let destination = load_destination(&path)?;
    if decide(source, destination.as_ref(), false)
        .write_reason()
        .is_none()
    {
        return Ok(None);
    }
    let existing = read_existing_or_empty(&path)?;

    let mut candidate = source.clone();
    if let Some(destination) = &destination {
        carry_stamps(&mut candidate, destination);
    }
    candidate.patch_date_note();
    let rendered = candidate.to_pretty_json()?;

    if existing == rendered {
        return Ok(None);
    }

    let old_header = format!("a/{}", config.source_file);
    let new_header = format!("b/{}", config.source_file);
    let unified = TextDiff::from_lines(&existing, &rendered)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();

    Ok(Some(FileDiff {
        path,
        unified_diff: unified,
    }))
}

fn carry_stamps(candidate: &mut EventLogDocument, destination: &EventLogDocument) {
    for key in STAMP_KEYS {
        match destination.metadata.get(key) {
            Some(value) => {
                candidate.metadata.insert(key.to_string(), value.clone());
            }
            None => {
                candidate.metadata.shift_remove(key);
            }
        }
    }
}

fn read_existing_or_empty(path: &Path) -> Result<String, SyncError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}
