//! JSON file store layout and behavior

use chrono::{TimeZone, Utc};
use exercise_tracker::{
    session::{RoutePoint, SessionRecord},
    store::{JsonFileStore, SessionStore},
};

fn record(id: &str, day: u32) -> SessionRecord {
    SessionRecord {
        id: id.to_string(),
        started_at: Utc.with_ymd_and_hms(2024, 5, day, 8, 0, 0).unwrap(),
        distance_km: 0.024,
        duration_seconds: 4,
        route: vec![
            RoutePoint { latitude: 31.2304, longitude: 121.4737 },
            RoutePoint { latitude: 31.2304, longitude: 121.4738 },
        ],
    }
}

#[test]
fn test_append_newest_first_and_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::new(dir.path().join("data").join("exerciseRecords.json"));

    store.append(&record("1", 1)).unwrap();
    store.append(&record("2", 2)).unwrap();
    store.append(&record("1", 1)).unwrap();

    let ids: Vec<_> = store.list().unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["2", "1"]);
    assert!(!store.path().with_extension("json.tmp").exists());
}

#[test]
fn test_on_disk_layout() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::new(dir.path().join("exerciseRecords.json"));
    store.append(&record("1714550400000", 1)).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
    let entry = &raw[0];
    assert_eq!(entry["id"], "1714550400000");
    assert_eq!(entry["distance"], 0.024);
    assert_eq!(entry["duration"], 4);
    assert!(entry["date"].as_str().unwrap().starts_with("2024-05-01T08:00:00"));
    assert_eq!(entry["route"][1]["longitude"], 121.4738);
}

#[test]
fn test_reads_camel_case_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("exerciseRecords.json"));
    std::fs::write(
        store.path(),
        r#"[{"id":"7","startedAt":"2024-05-03T07:00:00Z","distanceKm":3.1,"durationSeconds":1500}]"#,
    )
    .unwrap();

    let records = store.list().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].distance_km, 3.1);
    assert!(records[0].route.is_empty());
    assert_eq!(store.get("7").unwrap().unwrap().duration_seconds, 1500);
}

#[test]
fn test_clear() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::new(dir.path().join("exerciseRecords.json"));
    store.append(&record("1", 1)).unwrap();
    store.clear().unwrap();
    assert!(store.list().unwrap().is_empty());
    store.clear().unwrap();
}
