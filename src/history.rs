// src/history.rs
//! Derived views over saved session records

use crate::session::SessionRecord;
use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;

/// Distance a free exercise session must reach to count as a workout
pub const FREE_EXERCISE_TARGET_KM: f64 = 3.0;

/// Distance a preset-route session must reach to count as a workout
pub const PRESET_ROUTE_TARGET_KM: f64 = 2.0;

/// Format seconds as `1h 2m 3s`, dropping leading zero units
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Format a pace in minutes per km as `m'ss"`
pub fn format_pace(min_per_km: Option<f64>) -> String {
    match min_per_km {
        Some(pace) if pace.is_finite() => {
            let total = (pace * 60.0).round() as u64;
            format!("{}'{:02}\"", total / 60, total % 60)
        }
        _ => "--".to_string(),
    }
}

/// Records keyed by `(year, month)` of their start date, oldest month first.
/// Records keep their stored order within a month.
pub fn group_by_month(records: &[SessionRecord]) -> BTreeMap<(i32, u32), Vec<&SessionRecord>> {
    let mut months: BTreeMap<(i32, u32), Vec<&SessionRecord>> = BTreeMap::new();
    for record in records {
        let key = (record.started_at.year(), record.started_at.month());
        months.entry(key).or_default().push(record);
    }
    months
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistorySummary {
    pub sessions: usize,
    pub total_distance_km: f64,
    pub total_duration_seconds: u64,
    pub active_months: usize,
}

impl HistorySummary {
    pub fn from_records(records: &[SessionRecord]) -> Self {
        Self {
            sessions: records.len(),
            total_distance_km: records.iter().map(|r| r.distance_km).sum(),
            total_duration_seconds: records.iter().map(|r| r.duration_seconds).sum(),
            active_months: group_by_month(records).len(),
        }
    }

    /// Sessions per month that has at least one session
    pub fn average_sessions_per_month(&self) -> f64 {
        if self.active_months == 0 {
            0.0
        } else {
            self.sessions as f64 / self.active_months as f64
        }
    }

    pub fn average_distance_km(&self) -> f64 {
        if self.sessions == 0 {
            0.0
        } else {
            self.total_distance_km / self.sessions as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: &str, month: u32, day: u32, km: f64, secs: u64) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            started_at: Utc.with_ymd_and_hms(2024, month, day, 7, 30, 0).unwrap(),
            distance_km: km,
            duration_seconds: secs,
            route: Vec::new(),
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(60), "1m 0s");
        assert_eq!(format_duration(3_725), "1h 2m 5s");
        assert_eq!(format_duration(7_200), "2h 0m 0s");
    }

    #[test]
    fn test_format_pace() {
        assert_eq!(format_pace(Some(5.5)), "5'30\"");
        assert_eq!(format_pace(Some(6.0)), "6'00\"");
        assert_eq!(format_pace(None), "--");
    }

    #[test]
    fn test_group_by_month() {
        let records = vec![
            record("3", 6, 2, 3.2, 1_200),
            record("2", 5, 20, 1.0, 600),
            record("1", 5, 3, 2.5, 900),
        ];
        let months = group_by_month(&records);
        let keys: Vec<_> = months.keys().copied().collect();
        assert_eq!(keys, vec![(2024, 5), (2024, 6)]);

        let may: Vec<_> = months[&(2024, 5)].iter().map(|r| r.id.as_str()).collect();
        assert_eq!(may, vec!["2", "1"]);
    }

    #[test]
    fn test_summary() {
        let records = vec![
            record("3", 6, 2, 3.0, 1_200),
            record("2", 5, 20, 1.0, 600),
            record("1", 5, 3, 2.0, 900),
        ];
        let summary = HistorySummary::from_records(&records);
        assert_eq!(summary.sessions, 3);
        assert!((summary.total_distance_km - 6.0).abs() < 1e-9);
        assert_eq!(summary.total_duration_seconds, 2_700);
        assert_eq!(summary.active_months, 2);
        assert!((summary.average_sessions_per_month() - 1.5).abs() < 1e-9);
        assert!((summary.average_distance_km() - 2.0).abs() < 1e-9);

        assert!(records[0].meets_target(FREE_EXERCISE_TARGET_KM));
        assert!(!records[2].meets_target(FREE_EXERCISE_TARGET_KM));
        assert!(records[2].meets_target(PRESET_ROUTE_TARGET_KM));
    }

    #[test]
    fn test_empty_summary() {
        let summary = HistorySummary::from_records(&[]);
        assert_eq!(summary, HistorySummary::default());
        assert_eq!(summary.average_sessions_per_month(), 0.0);
    }
}
