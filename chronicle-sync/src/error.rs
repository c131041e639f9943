//! Error types for chronicle-sync.

use std::path::PathBuf;

use thiserror::Error;

use chronicle_core::CoreError;

use crate::validate::ValidationFailure;

/// All errors that can end a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Clone failed and no usable checkout exists.
    #[error("failed to acquire {url}: {message}")]
    Acquisition { url: String, message: String },

    /// The checkout does not contain the event log.
    #[error("{path} not found in checkout")]
    SourceMissing { path: PathBuf },

    /// The source failed validation; nothing was written.
    #[error("source validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    /// A `git` invocation failed.
    #[error("git {args} failed: {message}")]
    Git { args: String, message: String },

    /// An error loading or serializing a document or config.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
