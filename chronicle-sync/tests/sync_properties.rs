//! End-to-end sync behaviour against an on-disk checkout.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use chrono::{TimeZone, Utc};
use filetime::{set_file_mtime, FileTime};
use serde_json::{json, Value};
use tempfile::TempDir;

use chronicle_core::SyncConfig;
use chronicle_sync::{
    pipeline::{sync_from_checkout, SyncOutcome},
    ChangeReason, SyncError, ValidatedBy, WriteResult,
};

fn source_doc() -> Value {
    json!({
        "metadata": {
            "title": "Village Event Log",
            "total_events": 3,
            "days_covered": 2
        },
        "events": [
            {"id": "e1", "day": 1, "description": "Kickoff with ops@agentvillage.org"},
            {"id": "e2", "day": 1, "description": "Reviewed by [redacted-email]"},
            {"id": "e3", "day": 2, "description": "Wrap-up", "extra": {"z": 1, "a": 2}}
        ]
    })
}

fn write_source(checkout: &Path, doc: &Value) {
    fs::write(
        checkout.join("events.json"),
        serde_json::to_string_pretty(doc).expect("serialize"),
    )
    .expect("write source");
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read")).expect("parse")
}

fn sync(checkout: &TempDir, dest: &TempDir, config: &SyncConfig) -> chronicle_sync::SyncReport {
    let _ = env_logger::builder().is_test(true).try_init();
    sync_from_checkout(checkout.path(), config, dest.path(), false, Utc::now()).expect("sync")
}

#[test]
fn second_run_is_a_no_op() {
    let checkout = TempDir::new().expect("checkout");
    let dest = TempDir::new().expect("dest");
    fs::create_dir_all(dest.path().join("docs")).expect("docs");
    write_source(checkout.path(), &source_doc());
    let config = SyncConfig::default();

    let first = sync(&checkout, &dest, &config);
    assert_eq!(first.outcome, SyncOutcome::Written(ChangeReason::DestinationMissing));
    assert!(matches!(first.validated_by, ValidatedBy::Fallback(_)));

    let target = dest.path().join("events.json");
    let old = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(60 * 60));
    set_file_mtime(&target, old).expect("set mtime");
    let bytes_1 = fs::read(&target).expect("read");

    let second = sync(&checkout, &dest, &config);
    assert_eq!(second.outcome, SyncOutcome::UpToDate);
    assert!(second.writes.is_empty());

    let bytes_2 = fs::read(&target).expect("read");
    let mtime_2 = FileTime::from_last_modification_time(&fs::metadata(&target).expect("meta"));
    assert_eq!(bytes_1, bytes_2, "destination changed on no-op run");
    assert_eq!(mtime_2, old, "destination rewritten on no-op run");
}

#[test]
fn total_events_mismatch_aborts_without_writing() {
    let checkout = TempDir::new().expect("checkout");
    let dest = TempDir::new().expect("dest");
    fs::create_dir_all(dest.path().join("docs")).expect("docs");
    fs::write(dest.path().join("events.json"), "previous").expect("seed dest");

    let mut doc = source_doc();
    doc["metadata"]["total_events"] = json!(5);
    write_source(checkout.path(), &doc);

    let err = sync_from_checkout(
        checkout.path(),
        &SyncConfig::default(),
        dest.path(),
        false,
        Utc::now(),
    )
    .unwrap_err();

    assert!(matches!(err, SyncError::Validation(_)), "got: {err}");
    assert_eq!(
        fs::read_to_string(dest.path().join("events.json")).expect("read"),
        "previous"
    );
    assert!(!dest.path().join("docs").join("events.json").exists());
}

#[test]
fn external_email_aborts_sync() {
    let checkout = TempDir::new().expect("checkout");
    let dest = TempDir::new().expect("dest");
    let mut doc = source_doc();
    doc["events"][2]["description"] = json!("contact jane@external.com");
    write_source(checkout.path(), &doc);

    let err = sync_from_checkout(
        checkout.path(),
        &SyncConfig::default(),
        dest.path(),
        false,
        Utc::now(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("jane@external.com"), "got: {err}");
    assert!(!dest.path().join("events.json").exists());
}

#[test]
fn non_volatile_metadata_change_triggers_write() {
    let checkout = TempDir::new().expect("checkout");
    let dest = TempDir::new().expect("dest");
    write_source(checkout.path(), &source_doc());
    let config = SyncConfig::default();
    sync(&checkout, &dest, &config);

    let mut updated = source_doc();
    updated["metadata"]["title"] = json!("Village Event Log (2nd edition)");
    write_source(checkout.path(), &updated);

    let report = sync(&checkout, &dest, &config);
    assert_eq!(report.outcome, SyncOutcome::Written(ChangeReason::MetadataChanged));
    assert_eq!(
        read_json(&dest.path().join("events.json"))["metadata"]["title"],
        json!("Village Event Log (2nd edition)")
    );
}

#[test]
fn volatile_only_metadata_change_is_up_to_date() {
    let checkout = TempDir::new().expect("checkout");
    let dest = TempDir::new().expect("dest");
    write_source(checkout.path(), &source_doc());
    let config = SyncConfig::default();
    sync(&checkout, &dest, &config);

    let mut updated = source_doc();
    updated["metadata"]["last_updated"] = json!("2030-01-01T00:00:00+00:00");
    updated["metadata"]["synced_from"] = json!("elsewhere");
    updated["metadata"]["synced_at"] = json!("2030-01-01 00:00:00 UTC");
    updated["metadata"]["date_note"] = json!("anything");
    updated["metadata"]["last_updated_day"] = json!(99);
    write_source(checkout.path(), &updated);

    assert_eq!(sync(&checkout, &dest, &config).outcome, SyncOutcome::UpToDate);
}

#[test]
fn force_writes_and_restamps_when_unchanged() {
    let checkout = TempDir::new().expect("checkout");
    let dest = TempDir::new().expect("dest");
    write_source(checkout.path(), &source_doc());
    let mut config = SyncConfig::default();

    let first = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
    sync_from_checkout(checkout.path(), &config, dest.path(), false, first).expect("first");

    config.force = true;
    let later = Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap();
    let report =
        sync_from_checkout(checkout.path(), &config, dest.path(), false, later).expect("forced");

    assert_eq!(report.outcome, SyncOutcome::Written(ChangeReason::Forced));
    let metadata = &read_json(&dest.path().join("events.json"))["metadata"];
    assert_eq!(metadata["last_updated"], json!("2025-06-02T09:30:00.000000+00:00"));
    assert_eq!(metadata["synced_at"], json!("2025-06-02 09:30:00 UTC"));
    assert_eq!(metadata["synced_from"], json!(config.upstream_url));
}

#[test]
fn date_note_typo_is_corrected_on_write() {
    let checkout = TempDir::new().expect("checkout");
    let dest = TempDir::new().expect("dest");
    let mut doc = source_doc();
    doc["metadata"]["date_note"] = json!("Days 1-2, 465 events total");
    write_source(checkout.path(), &doc);

    let report = sync(&checkout, &dest, &SyncConfig::default());

    assert!(report.date_note_patched);
    assert_eq!(
        read_json(&dest.path().join("events.json"))["metadata"]["date_note"],
        json!("Days 1-2, 466 events total")
    );
    assert_eq!(
        read_json(&checkout.path().join("events.json"))["metadata"]["date_note"],
        json!("Days 1-2, 465 events total"),
        "source must not be modified"
    );
}

#[test]
fn corrected_date_note_is_left_alone() {
    let checkout = TempDir::new().expect("checkout");
    let dest = TempDir::new().expect("dest");
    let mut doc = source_doc();
    doc["metadata"]["date_note"] = json!("465 events upstream, 466 after dedup");
    write_source(checkout.path(), &doc);

    let report = sync(&checkout, &dest, &SyncConfig::default());

    assert!(!report.date_note_patched);
    assert_eq!(
        read_json(&dest.path().join("events.json"))["metadata"]["date_note"],
        json!("465 events upstream, 466 after dedup")
    );
}

#[test]
fn docs_copy_written_only_when_docs_dir_exists() {
    let checkout = TempDir::new().expect("checkout");
    write_source(checkout.path(), &source_doc());

    let with_docs = TempDir::new().expect("dest");
    fs::create_dir_all(with_docs.path().join("docs")).expect("docs");
    sync(&checkout, &with_docs, &SyncConfig::default());
    assert_eq!(
        fs::read(with_docs.path().join("events.json")).expect("root"),
        fs::read(with_docs.path().join("docs").join("events.json")).expect("docs")
    );

    let without_docs = TempDir::new().expect("dest");
    let report = sync(&checkout, &without_docs, &SyncConfig::default());
    assert!(without_docs.path().join("events.json").exists());
    assert!(!without_docs.path().join("docs").exists());
    assert!(matches!(report.writes[1], WriteResult::Skipped { .. }));
}

#[test]
fn reordered_event_keys_upstream_are_not_a_change() {
    let checkout = TempDir::new().expect("checkout");
    let dest = TempDir::new().expect("dest");
    write_source(checkout.path(), &source_doc());
    let config = SyncConfig::default();
    sync(&checkout, &dest, &config);

    let reordered = r#"{
  "metadata": {"days_covered": 2, "total_events": 3, "title": "Village Event Log"},
  "events": [
    {"description": "Kickoff with ops@agentvillage.org", "day": 1, "id": "e1"},
    {"day": 1, "id": "e2", "description": "Reviewed by [redacted-email]"},
    {"extra": {"a": 2, "z": 1}, "id": "e3", "day": 2, "description": "Wrap-up"}
  ]
}"#;
    fs::write(checkout.path().join("events.json"), reordered).expect("write");

    assert_eq!(sync(&checkout, &dest, &config).outcome, SyncOutcome::UpToDate);
}

#[test]
fn malformed_destination_is_a_terminal_error() {
    let checkout = TempDir::new().expect("checkout");
    let dest = TempDir::new().expect("dest");
    write_source(checkout.path(), &source_doc());
    fs::write(dest.path().join("events.json"), "{ truncated").expect("seed");

    let err = sync_from_checkout(
        checkout.path(),
        &SyncConfig::default(),
        dest.path(),
        false,
        Utc::now(),
    )
    .unwrap_err();
    assert!(matches!(err, SyncError::Core(_)), "got: {err}");
    assert_eq!(
        fs::read_to_string(dest.path().join("events.json")).expect("read"),
        "{ truncated"
    );
}
