// src/session/record.rs
//! Finalized, persistable summary of a completed session

use crate::{location::PositionSample, track::Track};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coordinate pair stored in a record's route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&PositionSample> for RoutePoint {
    fn from(sample: &PositionSample) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
        }
    }
}

/// Immutable once built. Field names on disk follow the `exerciseRecords`
/// layout read by the history views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    #[serde(rename = "date", alias = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "distance", alias = "distanceKm")]
    pub distance_km: f64,
    #[serde(rename = "duration", alias = "durationSeconds")]
    pub duration_seconds: u64,
    #[serde(default)]
    pub route: Vec<RoutePoint>,
}

impl SessionRecord {
    /// Freeze a track into a record. The id is derived from `created_at`.
    pub fn from_track(track: Track, started_at: DateTime<Utc>, created_at: DateTime<Utc>) -> Self {
        let distance_km = track.cumulative_distance_m() / 1000.0;
        let duration_seconds = track.elapsed_seconds();
        let route = track.into_points().iter().map(RoutePoint::from).collect();

        Self {
            id: created_at.timestamp_millis().to_string(),
            started_at,
            distance_km,
            duration_seconds,
            route,
        }
    }

    /// Minutes per kilometer, if any distance was covered
    pub fn pace_min_per_km(&self) -> Option<f64> {
        if self.distance_km <= 0.0 {
            return None;
        }
        Some((self.duration_seconds as f64 / 60.0) / self.distance_km)
    }

    pub fn meets_target(&self, target_km: f64) -> bool {
        self.distance_km >= target_km
    }

    pub fn start_point(&self) -> Option<&RoutePoint> {
        self.route.first()
    }

    pub fn end_point(&self) -> Option<&RoutePoint> {
        self.route.last()
    }
}
