//! Integration tests for the reading time series.
//!
//! Covers:
//! - Batch writes sharing one timestamp
//! - Fixed-window queries, newest-first ordering
//! - Latest-per-kind resolution
//! - Persistence across reopen

use agroboost_storage::{Reading, ReadingKind, ReadingStore, ReadingWindow};
use chrono::{Duration, Utc};
use uuid::Uuid;

#[test]
fn test_batch_shares_one_timestamp() {
    let store = ReadingStore::memory().expect("failed to create memory store");
    let kit_id = Uuid::new_v4();
    let now = Utc::now();

    let batch = vec![
        Reading::new(kit_id, "AGRO-010", now, ReadingKind::Battery, 76.0),
        Reading::new(kit_id, "AGRO-010", now, ReadingKind::WaterLevel, 40.0),
        Reading::new(kit_id, "AGRO-010", now, ReadingKind::Temp, 22.5),
    ];
    store.append_batch(&batch).expect("failed to write batch");

    let result = store
        .query("AGRO-010", None, ReadingWindow::Day)
        .expect("failed to query");

    assert_eq!(result.len(), 3);
    assert!(result.iter().all(|r| r.timestamp == now));
}

#[test]
fn test_devices_are_isolated() {
    let store = ReadingStore::memory().unwrap();
    let now = Utc::now();

    store
        .append_batch(&[
            Reading::new(Uuid::new_v4(), "AGRO-011", now, ReadingKind::Battery, 90.0),
            Reading::new(Uuid::new_v4(), "AGRO-012", now, ReadingKind::Battery, 30.0),
        ])
        .unwrap();

    let result = store
        .query("AGRO-011", Some(ReadingKind::Battery), ReadingWindow::Day)
        .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].value, 90.0);
}

#[test]
fn test_same_millisecond_events_do_not_collide() {
    let store = ReadingStore::memory().unwrap();
    let kit_id = Uuid::new_v4();
    let now = Utc::now();

    // Two separate ingestion events in the same millisecond.
    store
        .append_batch(&[Reading::new(kit_id, "AGRO-013", now, ReadingKind::Battery, 50.0)])
        .unwrap();
    store
        .append_batch(&[Reading::new(kit_id, "AGRO-013", now, ReadingKind::Battery, 49.0)])
        .unwrap();

    let result = store
        .query("AGRO-013", Some(ReadingKind::Battery), ReadingWindow::Day)
        .unwrap();
    assert_eq!(result.len(), 2);
}

#[test]
fn test_latest_ignores_window() {
    let store = ReadingStore::memory().unwrap();
    let kit_id = Uuid::new_v4();

    // A reading far older than any query window is still the latest.
    store
        .append_batch(&[Reading::new(
            kit_id,
            "AGRO-014",
            Utc::now() - Duration::days(90),
            ReadingKind::Humidity,
            61.0,
        )])
        .unwrap();

    let result = store.latest("AGRO-014", &[ReadingKind::Humidity]).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].value, 61.0);
}

#[test]
fn test_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let kit_id = Uuid::new_v4();
    let now = Utc::now();

    {
        let store = ReadingStore::open(dir.path()).expect("failed to open store");
        store
            .append_batch(&[Reading::new(kit_id, "AGRO-015", now, ReadingKind::Voltage, 12.4)])
            .unwrap();
    }

    let store = ReadingStore::open(dir.path()).expect("failed to reopen store");
    let result = store
        .query("AGRO-015", Some(ReadingKind::Voltage), ReadingWindow::Day)
        .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].value, 12.4);
    assert_eq!(result[0].unit, "V");
}
