// src/location/sample.rs
//! Raw position samples produced by location sources

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reading from a location source. Immutable once captured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters, when the source reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            timestamp,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Coordinates are finite and inside the WGS84 range
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Seconds elapsed from `earlier` to this sample. Negative if out of order.
    pub fn seconds_since(&self, earlier: &PositionSample) -> f64 {
        let delta = self.timestamp.signed_duration_since(earlier.timestamp);
        delta.num_microseconds().map_or_else(
            || delta.num_milliseconds() as f64 / 1_000.0,
            |us| us as f64 / 1_000_000.0,
        )
    }

    /// Format coordinate for display
    pub fn format_coordinate(coord: f64) -> String {
        format!("{:>12.6}°", coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_validity() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        assert!(PositionSample::new(31.2304, 121.4737, t).is_valid());
        assert!(!PositionSample::new(f64::NAN, 121.4737, t).is_valid());
        assert!(!PositionSample::new(91.0, 0.0, t).is_valid());
        assert!(!PositionSample::new(0.0, -180.5, t).is_valid());
    }

    #[test]
    fn test_seconds_since() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let a = PositionSample::new(0.0, 0.0, t);
        let b = PositionSample::new(0.0, 0.0, t + Duration::milliseconds(2_500));
        assert!((b.seconds_since(&a) - 2.5).abs() < 1e-9);
        assert!((a.seconds_since(&b) + 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_deserialize_without_accuracy() {
        let json = r#"{"latitude":31.2304,"longitude":121.4737,"timestamp":"2024-05-01T08:00:00Z"}"#;
        let sample: PositionSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.accuracy, None);
        assert_eq!(sample.latitude, 31.2304);
    }
}
