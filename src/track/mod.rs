// src/track/mod.rs
//! In-progress track of an exercise session

pub mod geodesic;
pub mod validator;

pub use geodesic::haversine_m;
pub use validator::{Rejection, SampleValidator, Thresholds, Verdict};

use crate::location::PositionSample;
use serde::Serialize;

/// Mutable state of one session. Only ever grows while running.
#[derive(Debug, Clone, Default)]
pub struct Track {
    points: Vec<PositionSample>,
    cumulative_distance_m: f64,
    elapsed_seconds: u64,
    last_accepted: Option<PositionSample>,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `sample` through the validator and apply it if accepted.
    ///
    /// Distance is only ever added leg by leg here, never re-derived from
    /// `points`.
    pub fn offer(&mut self, sample: PositionSample, validator: &SampleValidator) -> Verdict {
        let verdict = validator.evaluate(self.last_accepted.as_ref(), &sample);
        if verdict.is_accepted() {
            self.cumulative_distance_m += verdict.distance_m();
            self.points.push(sample);
            self.last_accepted = Some(sample);
        }
        verdict
    }

    /// Advance the duration by one timer tick
    pub fn tick(&mut self) {
        self.elapsed_seconds += 1;
    }

    pub fn points(&self) -> &[PositionSample] {
        &self.points
    }

    pub fn cumulative_distance_m(&self) -> f64 {
        self.cumulative_distance_m
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn last_accepted(&self) -> Option<&PositionSample> {
        self.last_accepted.as_ref()
    }

    pub fn last_accepted_timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.last_accepted.map(|s| s.timestamp)
    }

    pub fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            cumulative_distance_m: self.cumulative_distance_m,
            elapsed_seconds: self.elapsed_seconds,
            points: self.points.clone(),
        }
    }

    pub(crate) fn into_points(self) -> Vec<PositionSample> {
        self.points
    }
}

/// Read-only view of a track for display
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackSnapshot {
    pub cumulative_distance_m: f64,
    pub elapsed_seconds: u64,
    pub points: Vec<PositionSample>,
}

impl TrackSnapshot {
    pub fn distance_km(&self) -> f64 {
        self.cumulative_distance_m / 1000.0
    }

    /// Average speed in km/h over the elapsed time
    pub fn average_speed_kmh(&self) -> Option<f64> {
        if self.elapsed_seconds == 0 {
            return None;
        }
        Some(self.cumulative_distance_m / self.elapsed_seconds as f64 * 3.6)
    }

    pub fn last_point(&self) -> Option<&PositionSample> {
        self.points.last()
    }
}
