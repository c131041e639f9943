//! Change detection.
//!
//! Precedence:
//! 1. `DestinationMissing` (no destination file)
//! 2. `EventsChanged` (canonical `events` text differs)
//! 3. `MetadataChanged` (metadata differs outside the volatile keys)
//! 4. `Forced` (nothing changed, but a write was requested)
//! 5. `UpToDate`

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

use chronicle_core::EventLogDocument;

use crate::SyncError;

/// Why a write is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    DestinationMissing,
    EventsChanged,
    MetadataChanged,
    Forced,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeReason::DestinationMissing => write!(f, "destination does not exist"),
            ChangeReason::EventsChanged => write!(f, "events data changed"),
            ChangeReason::MetadataChanged => write!(f, "metadata changed (non-volatile fields)"),
            ChangeReason::Forced => write!(f, "forced"),
        }
    }
}

/// Outcome of comparing source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    UpToDate,
    Write(ChangeReason),
}

impl Decision {
    /// The reason to write, or `None` when up to date.
    pub fn write_reason(self) -> Option<ChangeReason> {
        match self {
            Decision::Write(reason) => Some(reason),
            Decision::UpToDate => None,
        }
    }
}

/// Decide whether `source` must be written over `destination`.
pub fn decide(
    source: &EventLogDocument,
    destination: Option<&EventLogDocument>,
    force: bool,
) -> Decision {
    let Some(destination) = destination else {
        return Decision::Write(ChangeReason::DestinationMissing);
    };

    if source.canonical_events() != destination.canonical_events() {
        return Decision::Write(ChangeReason::EventsChanged);
    }
    tracing::debug!("no changes detected in events data");

    if source.canonical_comparable_metadata() != destination.canonical_comparable_metadata() {
        return Decision::Write(ChangeReason::MetadataChanged);
    }

    if force {
        return Decision::Write(ChangeReason::Forced);
    }
    Decision::UpToDate
}

/// Load the current destination document, or `None` if it does not exist.
///
/// An existing but unreadable or malformed destination is an error.
pub fn load_destination(path: &Path) -> Result<Option<EventLogDocument>, SyncError> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(Some(EventLogDocument::load(path)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(crate::error::io_err(path, err)),
    }
}
