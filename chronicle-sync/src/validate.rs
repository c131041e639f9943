//! Source validation.
//!
//! The upstream repository ships its own validator script; its exit status is
//! the primary pass/fail oracle. When the script is missing, cannot be
//! started, or fails, the in-process [`check_value`] runs instead:
//!
//! - `metadata` and `events` present with the right shapes
//! - `metadata.total_events` == number of events
//! - `metadata.days_covered` == number of distinct integer `day` values
//! - no unredacted email outside the allowed domains in any `description`
//!
//! Failures are never auto-corrected.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use chronicle_core::{document::distinct_integer_days, PrivacyPolicy, SyncConfig, ValidatorConfig};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Why a source document was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("missing '{0}' key")]
    MissingKey(&'static str),

    #[error("'{key}' must be {expected}")]
    WrongShape {
        key: &'static str,
        expected: &'static str,
    },

    #[error("event at index {index} is not an object")]
    EventNotObject { index: usize },

    #[error("metadata.total_events={declared} != len(events)={actual}")]
    TotalEventsMismatch { declared: String, actual: usize },

    #[error("metadata.days_covered={declared} != unique days={actual}")]
    DaysCoveredMismatch { declared: String, actual: usize },

    #[error("description of event {event_id} is not a string")]
    DescriptionNotString { event_id: String },

    #[error("raw external email found in event {event_id}: {email}")]
    ExternalEmail { event_id: String, email: String },

    #[error("cannot read {path}: {message}")]
    Unreadable { path: PathBuf, message: String },
}

/// Counts reported by a passing fallback check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackSummary {
    pub events: usize,
    pub days_covered: usize,
}

/// Which check accepted the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatedBy {
    External,
    Fallback(FallbackSummary),
}

/// Result of running the upstream validator script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalOutcome {
    Passed,
    Failed { status: String, stderr: String },
    Missing { path: PathBuf },
    Unavailable { message: String },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Validate `source` with the external validator, falling back to the
/// in-process check.
pub fn validate_source(
    checkout: &Path,
    source: &Path,
    config: &SyncConfig,
) -> Result<ValidatedBy, ValidationFailure> {
    match run_external(checkout, &config.validator) {
        ExternalOutcome::Passed => {
            tracing::info!("external validator passed");
            return Ok(ValidatedBy::External);
        }
        ExternalOutcome::Failed { status, stderr } => {
            tracing::warn!("external validator failed ({status}): {stderr}");
        }
        ExternalOutcome::Missing { path } => {
            tracing::warn!("validator not found at {}", path.display());
        }
        ExternalOutcome::Unavailable { message } => {
            tracing::warn!("validator could not be started: {message}");
        }
    }

    tracing::warn!("falling back to basic validation");
    let summary = check_file(source, &config.privacy)?;
    tracing::info!(
        "basic validation passed: {} events, {} days",
        summary.events,
        summary.days_covered
    );
    Ok(ValidatedBy::Fallback(summary))
}

// ---------------------------------------------------------------------------
// External validator
// ---------------------------------------------------------------------------

/// Run `<interpreter> <checkout>/<script>` with the checkout as working
/// directory. Only the exit status decides the outcome.
pub fn run_external(checkout: &Path, validator: &ValidatorConfig) -> ExternalOutcome {
    let script = checkout.join(&validator.script);
    if !script.is_file() {
        return ExternalOutcome::Missing { path: script };
    }

    let output = match Command::new(&validator.interpreter)
        .arg(&script)
        .current_dir(checkout)
        .output()
    {
        Ok(output) => output,
        Err(err) => {
            return ExternalOutcome::Unavailable {
                message: format!("{}: {err}", validator.interpreter),
            }
        }
    };

    if output.status.success() {
        ExternalOutcome::Passed
    } else {
        ExternalOutcome::Failed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Fallback check
// ---------------------------------------------------------------------------

/// Fallback check on a file. Unreadable or malformed files fail validation
/// rather than erroring.
pub fn check_file(path: &Path, policy: &PrivacyPolicy) -> Result<FallbackSummary, ValidationFailure> {
    let unreadable = |message: String| ValidationFailure::Unreadable {
        path: path.to_path_buf(),
        message,
    };
    let contents = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    let value: Value = serde_json::from_str(&contents).map_err(|e| unreadable(e.to_string()))?;
    check_value(&value, policy)
}

/// Structural and privacy checks on a raw event-log value.
pub fn check_value(value: &Value, policy: &PrivacyPolicy) -> Result<FallbackSummary, ValidationFailure> {
    let document = value.as_object().ok_or(ValidationFailure::WrongShape {
        key: "document",
        expected: "a JSON object",
    })?;
    let metadata = document
        .get("metadata")
        .ok_or(ValidationFailure::MissingKey("metadata"))?;
    let events = document
        .get("events")
        .ok_or(ValidationFailure::MissingKey("events"))?;

    let metadata = metadata.as_object().ok_or(ValidationFailure::WrongShape {
        key: "metadata",
        expected: "an object",
    })?;
    let events = events.as_array().ok_or(ValidationFailure::WrongShape {
        key: "events",
        expected: "an array",
    })?;
    if let Some(index) = events.iter().position(|event| !event.is_object()) {
        return Err(ValidationFailure::EventNotObject { index });
    }

    let total_events = metadata.get("total_events");
    if !count_matches(total_events, events.len()) {
        return Err(ValidationFailure::TotalEventsMismatch {
            declared: display_declared(total_events),
            actual: events.len(),
        });
    }

    let unique_days = distinct_integer_days(events);
    let days_covered = metadata.get("days_covered");
    if !count_matches(days_covered, unique_days) {
        return Err(ValidationFailure::DaysCoveredMismatch {
            declared: display_declared(days_covered),
            actual: unique_days,
        });
    }

    for event in events {
        let description = match event.get("description") {
            None => "",
            Some(Value::String(text)) => text.as_str(),
            Some(_) => {
                return Err(ValidationFailure::DescriptionNotString {
                    event_id: event_id(event),
                })
            }
        };
        if let Some(email) = email_re()
            .find_iter(description)
            .map(|m| m.as_str())
            .find(|email| !policy.permits(email))
        {
            return Err(ValidationFailure::ExternalEmail {
                event_id: event_id(event),
                email: email.to_string(),
            });
        }
    }

    Ok(FallbackSummary {
        events: events.len(),
        days_covered: unique_days,
    })
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
            .expect("email regex must compile")
    })
}

/// Integral JSON numbers (including `3.0`) equal to `count`.
fn count_matches(declared: Option<&Value>, count: usize) -> bool {
    let Some(Value::Number(n)) = declared else {
        return false;
    };
    match n.as_u64() {
        Some(v) => v == count as u64,
        None => n.as_f64() == Some(count as f64),
    }
}

fn display_declared(declared: Option<&Value>) -> String {
    declared.map_or_else(|| "missing".to_string(), Value::to_string)
}

fn event_id(event: &Value) -> String {
    match event.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => "<no id>".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn valid() -> Value {
        json!({
            "metadata": {"total_events": 3, "days_covered": 2},
            "events": [
                {"id": "e1", "day": 1, "description": "Kickoff"},
                {"id": "e2", "day": 1, "description": "Mail ops@agentvillage.org"},
                {"id": "e3", "day": 2, "description": "Reached [redacted-email] for review"}
            ]
        })
    }

    fn check(value: &Value) -> Result<FallbackSummary, ValidationFailure> {
        check_value(value, &PrivacyPolicy::default())
    }

    #[test]
    fn valid_document_passes_with_counts() {
        let summary = check(&valid()).unwrap();
        assert_eq!(summary, FallbackSummary { events: 3, days_covered: 2 });
    }

    #[test]
    fn missing_sections_fail() {
        let err = check(&json!({"events": []})).unwrap_err();
        assert_eq!(err, ValidationFailure::MissingKey("metadata"));

        let err = check(&json!({"metadata": {}})).unwrap_err();
        assert_eq!(err, ValidationFailure::MissingKey("events"));
    }

    #[test]
    fn total_events_mismatch_fails() {
        let mut doc = valid();
        doc["metadata"]["total_events"] = json!(4);
        let err = check(&doc).unwrap_err();
        assert_eq!(
            err,
            ValidationFailure::TotalEventsMismatch {
                declared: "4".to_string(),
                actual: 3
            }
        );
        assert_eq!(err.to_string(), "metadata.total_events=4 != len(events)=3");
    }

    #[test]
    fn missing_total_events_fails() {
        let mut doc = valid();
        doc["metadata"].as_object_mut().unwrap().remove("total_events");
        assert!(matches!(
            check(&doc),
            Err(ValidationFailure::TotalEventsMismatch { .. })
        ));
    }

    #[test]
    fn integral_float_counts_are_accepted() {
        let mut doc = valid();
        doc["metadata"]["total_events"] = json!(3.0);
        assert!(check(&doc).is_ok());
    }

    #[test]
    fn days_covered_ignores_non_integer_days() {
        let mut doc = valid();
        doc["events"]
            .as_array_mut()
            .unwrap()
            .push(json!({"id": "e4", "day": "3", "description": ""}));
        doc["metadata"]["total_events"] = json!(4);
        assert!(check(&doc).is_ok());

        doc["metadata"]["days_covered"] = json!(3);
        assert!(matches!(
            check(&doc),
            Err(ValidationFailure::DaysCoveredMismatch { actual: 2, .. })
        ));
    }

    #[test]
    fn external_email_fails() {
        let mut doc = valid();
        doc["events"][0]["description"] = json!("contact jane@external.com");
        let err = check(&doc).unwrap_err();
        assert_eq!(
            err,
            ValidationFailure::ExternalEmail {
                event_id: "e1".to_string(),
                email: "jane@external.com".to_string()
            }
        );
    }

    #[test]
    fn internal_and_redacted_emails_pass() {
        let mut doc = valid();
        doc["events"][0]["description"] = json!("contact jane@agentvillage.org");
        doc["events"][1]["description"] = json!("[redacted-email]");
        assert!(check(&doc).is_ok());
    }

    #[test]
    fn missing_description_is_empty_but_non_string_fails() {
        let mut doc = valid();
        doc["events"][0].as_object_mut().unwrap().remove("description");
        assert!(check(&doc).is_ok());

        doc["events"][0]["description"] = json!(["list"]);
        assert_eq!(
            check(&doc).unwrap_err(),
            ValidationFailure::DescriptionNotString {
                event_id: "e1".to_string()
            }
        );
    }

    #[test]
    fn non_object_event_fails() {
        let mut doc = valid();
        doc["events"][1] = json!("not an event");
        assert_eq!(
            check(&doc).unwrap_err(),
            ValidationFailure::EventNotObject { index: 1 }
        );
    }

    #[test]
    fn malformed_file_is_a_failure_not_a_crash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            check_file(&path, &PrivacyPolicy::default()),
            Err(ValidationFailure::Unreadable { .. })
        ));

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            check_file(&missing, &PrivacyPolicy::default()),
            Err(ValidationFailure::Unreadable { .. })
        ));
    }

    #[test]
    fn missing_script_is_reported_as_missing() {
        let dir = TempDir::new().unwrap();
        let outcome = run_external(dir.path(), &ValidatorConfig::default());
        assert!(matches!(outcome, ExternalOutcome::Missing { .. }));
    }

    #[test]
    fn unstartable_interpreter_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let validator = ValidatorConfig {
            script: PathBuf::from("validate.sh"),
            interpreter: "chronicle-no-such-interpreter".to_string(),
        };
        std::fs::write(dir.path().join("validate.sh"), "exit 0\n").unwrap();
        assert!(matches!(
            run_external(dir.path(), &validator),
            ExternalOutcome::Unavailable { .. }
        ));
    }

    #[test]
    #[cfg(unix)]
    fn exit_status_decides_external_outcome() {
        let dir = TempDir::new().unwrap();
        let validator = ValidatorConfig {
            script: PathBuf::from("validate.sh"),
            interpreter: "sh".to_string(),
        };

        std::fs::write(dir.path().join("validate.sh"), "test -f marker\n").unwrap();
        assert!(matches!(
            run_external(dir.path(), &validator),
            ExternalOutcome::Failed { .. }
        ));

        std::fs::write(dir.path().join("marker"), "").unwrap();
        assert_eq!(run_external(dir.path(), &validator), ExternalOutcome::Passed);
    }

    #[test]
    #[cfg(unix)]
    fn failing_external_validator_falls_back() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("validate.sh"), "echo broken >&2; exit 3\n").unwrap();
        let source = dir.path().join("events.json");
        std::fs::write(&source, valid().to_string()).unwrap();

        let config = SyncConfig {
            validator: ValidatorConfig {
                script: PathBuf::from("validate.sh"),
                interpreter: "sh".to_string(),
            },
            ..SyncConfig::default()
        };
        let verdict = validate_source(dir.path(), &source, &config).unwrap();
        assert_eq!(
            verdict,
            ValidatedBy::Fallback(FallbackSummary { events: 3, days_covered: 2 })
        );
    }
}
