//! # chronicle-sync
//!
//! Validated, change-gated sync of an upstream `events.json` into a
//! publishing repository.
//!
//! Call [`pipeline::run`] for the full flow (acquire, validate, decide,
//! write), or [`pipeline::sync_from_checkout`] when a checkout is already on
//! disk.

pub mod acquire;
pub mod decision;
pub mod diff;
pub mod error;
pub mod git;
pub mod pipeline;
pub mod validate;
pub mod writer;

pub use decision::{decide, ChangeReason, Decision};
pub use diff::{preview, FileDiff};
pub use error::SyncError;
pub use pipeline::{SyncOutcome, SyncReport};
pub use validate::{FallbackSummary, ValidatedBy, ValidationFailure};
pub use writer::WriteResult;
