// src/route.rs
//! Progress along a preset route of checkpoints

use crate::{
    error::{Result, TrackerError},
    location::PositionSample,
    session::RoutePoint,
    track::haversine_m,
};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RouteProgress {
    checkpoints: Vec<RoutePoint>,
    radius_m: f64,
    passed: usize,
}

impl RouteProgress {
    pub fn new(checkpoints: Vec<RoutePoint>, radius_m: f64) -> Self {
        Self {
            checkpoints,
            radius_m,
            passed: 0,
        }
    }

    /// Load checkpoints from a JSON array of `{latitude, longitude}`
    pub fn load(path: &Path, radius_m: f64) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let checkpoints: Vec<RoutePoint> = serde_json::from_str(&contents)
            .map_err(|e| TrackerError::Parse(format!("route file {}: {}", path.display(), e)))?;
        if checkpoints.is_empty() {
            return Err(TrackerError::Parse(format!(
                "route file {} has no checkpoints",
                path.display()
            )));
        }
        info!("Loaded {} checkpoints from {}", checkpoints.len(), path.display());
        Ok(Self::new(checkpoints, radius_m))
    }

    /// Record the current position. A checkpoint is passed when the position
    /// is strictly within the radius; the count is the 1-based index of the
    /// furthest such checkpoint and never goes down.
    pub fn update(&mut self, position: &PositionSample) -> usize {
        let reached = self
            .checkpoints
            .iter()
            .enumerate()
            .filter(|(_, cp)| {
                haversine_m(cp.latitude, cp.longitude, position.latitude, position.longitude)
                    < self.radius_m
            })
            .map(|(i, _)| i + 1)
            .max()
            .unwrap_or(0);

        if reached > self.passed {
            debug!(passed = reached, total = self.checkpoints.len(), "checkpoint reached");
            self.passed = reached;
        }
        self.passed
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn total(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_complete(&self) -> bool {
        !self.checkpoints.is_empty() && self.passed == self.checkpoints.len()
    }

    pub fn checkpoints(&self) -> &[RoutePoint] {
        &self.checkpoints
    }

    pub fn reset(&mut self) {
        self.passed = 0;
    }
}
