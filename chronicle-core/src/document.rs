//! Event-log document model.
//!
//! An `events.json` file is a JSON object with a `metadata` map and an
//! ordered `events` array. Event records are opaque beyond `id`, `day` and
//! `description`; they are carried as raw [`Value`]s so that key order and
//! unknown fields survive a load/save cycle untouched.
//!
//! All semantic comparisons go through [`canonical_json`], which sorts object
//! keys recursively and uses compact separators.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, Deserializer, Unexpected};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{io_err, CoreError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Metadata keys owned by the sync process (plus the destination-only
/// `date_note` correction). Excluded from change detection.
pub const VOLATILE_METADATA_KEYS: [&str; 5] = [
    "last_updated",
    "synced_from",
    "synced_at",
    "date_note",
    "last_updated_day",
];

// Historical one-off fix: upstream `date_note` once said "465 events" where
// the log holds 466. A literal substitution, not a rule engine.
// Remove once upstream carries the corrected note.
pub const DATE_NOTE_TYPO: &str = "465 events";
pub const DATE_NOTE_FIX: &str = "466 events";
pub const DATE_NOTE_FIXED_MARKER: &str = "466";

/// `strftime` format of `metadata.synced_at`.
pub const SYNCED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

// ---------------------------------------------------------------------------
// EventLogDocument
// ---------------------------------------------------------------------------

/// A parsed `events.json` document.
///
/// Top-level keys are written back in the order they were read. Keys the
/// source did not have follow in the order `metadata`, `events`, extras.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLogDocument {
    pub metadata: Map<String, Value>,
    pub events: Vec<Value>,
    /// Any other top-level keys, written back unchanged.
    pub extra: Map<String, Value>,
    key_order: Vec<String>,
}

impl<'de> Deserialize<'de> for EventLogDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut top = Map::<String, Value>::deserialize(deserializer)?;
        let key_order = top.keys().cloned().collect();

        let metadata = match top.shift_remove("metadata") {
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(de::Error::invalid_type(unexpected(&other), &"a metadata object"))
            }
            None => return Err(de::Error::missing_field("metadata")),
        };
        let events = match top.shift_remove("events") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(de::Error::invalid_type(unexpected(&other), &"an events array"))
            }
            None => return Err(de::Error::missing_field("events")),
        };

        Ok(Self {
            metadata,
            events,
            extra: top,
            key_order,
        })
    }
}

impl Serialize for EventLogDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.extra.len()))?;
        for key in self.top_level_keys() {
            match key {
                "metadata" => map.serialize_entry(key, &self.metadata)?,
                "events" => map.serialize_entry(key, &self.events)?,
                other => {
                    if let Some(value) = self.extra.get(other) {
                        map.serialize_entry(other, value)?;
                    }
                }
            }
        }
        map.end()
    }
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

impl EventLogDocument {
    /// Load and parse a document from `path`.
    ///
    /// Returns [`CoreError::Io`] if unreadable and [`CoreError::Parse`] (with
    /// the path) if the JSON is malformed or lacks `metadata`/`events`.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_json::from_str(&contents).map_err(|source| CoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a document from a JSON string.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Stable on-disk form: 2-space indentation, non-ASCII kept literal,
    /// key order preserved, no trailing newline.
    pub fn to_pretty_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Top-level keys in output order.
    fn top_level_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .key_order
            .iter()
            .map(String::as_str)
            .filter(|key| matches!(*key, "metadata" | "events") || self.extra.contains_key(*key))
            .collect();
        for key in ["metadata", "events"]
            .into_iter()
            .chain(self.extra.keys().map(String::as_str))
        {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Canonical text of the `events` array.
    pub fn canonical_events(&self) -> String {
        let mut out = String::new();
        write_canonical_array(&self.events, &mut out);
        out
    }

    /// SHA-256 hex digest of [`Self::canonical_events`].
    pub fn events_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_events().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Metadata with [`VOLATILE_METADATA_KEYS`] removed.
    pub fn comparable_metadata(&self) -> Map<String, Value> {
        self.metadata
            .iter()
            .filter(|(key, _)| !VOLATILE_METADATA_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Canonical text of [`Self::comparable_metadata`].
    pub fn canonical_comparable_metadata(&self) -> String {
        canonical_json(&Value::Object(self.comparable_metadata()))
    }

    /// Record when and where this copy was synced from.
    pub fn stamp(&mut self, now: DateTime<Utc>, upstream: &str) {
        self.metadata.insert(
            "last_updated".to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Micros, false)),
        );
        self.metadata.insert(
            "synced_from".to_string(),
            Value::String(upstream.to_string()),
        );
        self.metadata.insert(
            "synced_at".to_string(),
            Value::String(now.format(SYNCED_AT_FORMAT).to_string()),
        );
    }

    /// Apply the `date_note` count correction. Returns `true` if the note
    /// was rewritten.
    pub fn patch_date_note(&mut self) -> bool {
        let Some(Value::String(note)) = self.metadata.get_mut("date_note") else {
            return false;
        };
        if !note.contains(DATE_NOTE_TYPO) || note.contains(DATE_NOTE_FIXED_MARKER) {
            return false;
        }
        *note = note.replace(DATE_NOTE_TYPO, DATE_NOTE_FIX);
        true
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Deterministic JSON text: object keys sorted recursively, `,` and `:`
/// separators without whitespace.
///
/// Two values with the same content but different key insertion order produce
/// identical text. Numbers keep their serde_json form, so `1` and `1.0` differ.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => write_canonical_array(items, out),
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_canonical_array(items: &[Value], out: &mut String) {
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_canonical(item, out);
    }
    out.push(']');
}

/// Number of distinct integer `day` values. Events whose `day` is missing or
/// not an integer are not counted.
pub fn distinct_integer_days(events: &[Value]) -> usize {
    events
        .iter()
        .filter_map(|event| event.get("day"))
        .filter_map(|day| match day {
            Value::Number(n) => n
                .as_i64()
                .map(i128::from)
                .or_else(|| n.as_u64().map(i128::from)),
            _ => None,
        })
        .collect::<BTreeSet<_>>()
        .len()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
