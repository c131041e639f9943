//! Shared sync pipeline entrypoint used by every CLI command.
//!
//! acquire → locate source → validate → load source + destination → decide
//! → stamp + patch → write. Nothing under the destination root is touched
//! until acquisition and validation have both succeeded.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use chronicle_core::{EventLogDocument, SyncConfig};

use crate::decision::{decide, load_destination, ChangeReason};
use crate::validate::{validate_source, ValidatedBy};
use crate::writer::{publish, WriteResult};
use crate::{acquire, SyncError};

/// What a sync run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing changed; no file was touched.
    UpToDate,
    /// Destination files were written.
    Written(ChangeReason),
    /// `--dry-run`: destination files would have been written.
    WouldWrite(ChangeReason),
}

/// Summary of a sync run, for reporting.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    pub validated_by: ValidatedBy,
    pub event_count: usize,
    pub events_fingerprint: String,
    pub writes: Vec<WriteResult>,
    pub date_note_patched: bool,
}

/// Run the full pipeline: acquire the upstream checkout, then
/// [`sync_from_checkout`].
pub fn run(config: &SyncConfig, dest_root: &Path, dry_run: bool) -> Result<SyncReport, SyncError> {
    let checkout = acquire::acquire(config)?;
    sync_from_checkout(&checkout, config, dest_root, dry_run, Utc::now())
}

/// Acquire the upstream checkout and validate its event log without syncing.
pub fn check(config: &SyncConfig) -> Result<ValidatedBy, SyncError> {
    let checkout = acquire::acquire(config)?;
    let source = locate_source(&checkout, config)?;
    Ok(validate_source(&checkout, &source, config)?)
}

/// Acquire the upstream checkout and load its event log unvalidated, for
/// previews.
pub fn load_upstream(config: &SyncConfig) -> Result<EventLogDocument, SyncError> {
    let checkout = acquire::acquire(config)?;
    let source = locate_source(&checkout, config)?;
    Ok(EventLogDocument::load(&source)?)
}

/// Path of the event log inside `checkout`, or [`SyncError::SourceMissing`].
pub fn locate_source(checkout: &Path, config: &SyncConfig) -> Result<PathBuf, SyncError> {
    let path = config.source_path(checkout);
    if !path.is_file() {
        return Err(SyncError::SourceMissing { path });
    }
    Ok(path)
}

/// Validate the event log in `checkout` and write it under `dest_root` if
/// anything changed. `now` stamps the bookkeeping fields.
pub fn sync_from_checkout(
    checkout: &Path,
    config: &SyncConfig,
    dest_root: &Path,
    dry_run: bool,
    now: DateTime<Utc>,
) -> Result<SyncReport, SyncError> {
    let source_path = locate_source(checkout, config)?;
    let validated_by = validate_source(checkout, &source_path, config)?;

    let mut source = EventLogDocument::load(&source_path)?;
    let destination = load_destination(&config.dest_path(dest_root))?;
    if config.force {
        tracing::info!("force sync enabled, proceeding regardless of changes");
    }

    let decision = decide(&source, destination.as_ref(), config.force);
    let event_count = source.event_count();
    let events_fingerprint = source.events_fingerprint();

    let Some(reason) = decision.write_reason() else {
        tracing::info!("already up to date");
        return Ok(SyncReport {
            outcome: SyncOutcome::UpToDate,
            validated_by,
            event_count,
            events_fingerprint,
            writes: Vec::new(),
            date_note_patched: false,
        });
    };
    tracing::info!("sync needed: {reason}");

    source.stamp(now, &config.upstream_url);
    let date_note_patched = source.patch_date_note();
    if date_note_patched {
        tracing::info!("fixed metadata date_note count");
    }

    let writes = publish(&source, dest_root, config, dry_run)?;
    let outcome = if dry_run {
        SyncOutcome::WouldWrite(reason)
    } else {
        SyncOutcome::Written(reason)
    };

    Ok(SyncReport {
        outcome,
        validated_by,
        event_count,
        events_fingerprint,
        writes,
        date_note_patched,
    })
}
