// src/track/validator.rs
//! Plausibility filter for incoming position samples
//!
//! A candidate is compared against the last accepted sample. It is kept only
//! if it moved far enough to not be jitter, and the implied speed lies
//! strictly between the standing-still floor and the teleport ceiling.
//! All three comparisons are strict: a sample sitting exactly on a threshold
//! is rejected.

use super::geodesic::haversine_m;
use crate::location::PositionSample;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tunable filter limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Displacement must exceed this (meters)
    pub min_displacement_m: f64,
    /// Speed must exceed this (m/s)
    pub min_speed_mps: f64,
    /// Speed must stay below this (m/s)
    pub max_speed_mps: f64,
}

impl Thresholds {
    pub const DEFAULT_MIN_DISPLACEMENT_M: f64 = 1.0;
    pub const DEFAULT_MIN_SPEED_MPS: f64 = 0.5;
    /// 30 km/h
    pub const DEFAULT_MAX_SPEED_MPS: f64 = 8.3;

    pub fn validate(&self) -> std::result::Result<(), String> {
        let all = [self.min_displacement_m, self.min_speed_mps, self.max_speed_mps];
        if all.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err("thresholds must be finite and non-negative".to_string());
        }
        if self.min_speed_mps >= self.max_speed_mps {
            return Err(format!(
                "min speed ({} m/s) must be below max speed ({} m/s)",
                self.min_speed_mps, self.max_speed_mps
            ));
        }
        Ok(())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_displacement_m: Self::DEFAULT_MIN_DISPLACEMENT_M,
            min_speed_mps: Self::DEFAULT_MIN_SPEED_MPS,
            max_speed_mps: Self::DEFAULT_MAX_SPEED_MPS,
        }
    }
}

/// Why a sample was dropped
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Coordinates are not finite or outside the WGS84 range
    Malformed,
    /// Timestamp is not after the reference
    NonPositiveInterval { seconds: f64 },
    Jitter { distance_m: f64 },
    TooSlow { speed_mps: f64 },
    TooFast { speed_mps: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Malformed => write!(f, "malformed coordinates"),
            Rejection::NonPositiveInterval { seconds } => {
                write!(f, "non-positive interval ({:.3}s)", seconds)
            }
            Rejection::Jitter { distance_m } => write!(f, "jitter ({:.2} m)", distance_m),
            Rejection::TooSlow { speed_mps } => write!(f, "too slow ({:.2} m/s)", speed_mps),
            Rejection::TooFast { speed_mps } => write!(f, "too fast ({:.2} m/s)", speed_mps),
        }
    }
}

/// Outcome of evaluating one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// No reference yet, accepted to seed it
    First,
    Accepted { distance_m: f64, speed_mps: f64 },
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Verdict::Rejected(_))
    }

    /// Distance to add to the running total
    pub fn distance_m(&self) -> f64 {
        match self {
            Verdict::Accepted { distance_m, .. } => *distance_m,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SampleValidator {
    thresholds: Thresholds,
}

impl SampleValidator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Judge `candidate` against the last accepted sample. Pure, no mutation.
    ///
    /// Malformed coordinates are refused even as a first sample.
    pub fn evaluate(&self, reference: Option<&PositionSample>, candidate: &PositionSample) -> Verdict {
        if !candidate.is_valid() {
            return Verdict::Rejected(Rejection::Malformed);
        }
        let Some(reference) = reference else {
            return Verdict::First;
        };

        let dt = candidate.seconds_since(reference);
        if dt <= 0.0 || !dt.is_finite() {
            return Verdict::Rejected(Rejection::NonPositiveInterval { seconds: dt });
        }

        let distance_m = haversine_m(
            reference.latitude,
            reference.longitude,
            candidate.latitude,
            candidate.longitude,
        );
        if distance_m <= self.thresholds.min_displacement_m {
            return Verdict::Rejected(Rejection::Jitter { distance_m });
        }

        let speed_mps = distance_m / dt;
        if speed_mps <= self.thresholds.min_speed_mps {
            return Verdict::Rejected(Rejection::TooSlow { speed_mps });
        }
        if speed_mps >= self.thresholds.max_speed_mps {
            return Verdict::Rejected(Rejection::TooFast { speed_mps });
        }

        Verdict::Accepted { distance_m, speed_mps }
    }
}
