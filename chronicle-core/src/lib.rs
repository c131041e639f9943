//! Chronicle core library: event-log document model, sync constants, config.
//!
//! Public API surface:
//! - [`document`]: [`EventLogDocument`], canonical JSON, bookkeeping edits
//! - [`config`]: [`SyncConfig`] and its layered loader
//! - [`error`]: [`CoreError`]

pub mod config;
pub mod document;
pub mod error;

pub use config::{PrivacyPolicy, SyncConfig, ValidatorConfig};
pub use document::{canonical_json, EventLogDocument, VOLATILE_METADATA_KEYS};
pub use error::CoreError;
