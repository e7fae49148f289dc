// src/session/mod.rs
//! Session state machine: Idle -> Running <-> Paused -> Ended
//!
//! `Session` owns the track outright and is driven by explicit method calls,
//! so every mutation goes through one place. The async driver lives in
//! [`crate::recorder`].

pub mod record;

pub use record::{RoutePoint, SessionRecord};

use crate::{
    error::{Result, TrackerError},
    location::PositionSample,
    track::{SampleValidator, Thresholds, Track, TrackSnapshot, Verdict},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    Ended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Ended => "ended",
        }
    }

    /// A track exists and may still change
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Running | SessionState::Paused)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
    validator: SampleValidator,
    track: Option<Track>,
    started_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            state: SessionState::Idle,
            validator: SampleValidator::new(thresholds),
            track: None,
            started_at: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    fn invalid(&self, command: &'static str) -> TrackerError {
        TrackerError::InvalidTransition {
            state: self.state.as_str(),
            command,
        }
    }

    /// Idle -> Running with a fresh, empty track
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(self.invalid("start"));
        }
        self.track = Some(Track::new());
        self.started_at = Some(now);
        self.state = SessionState::Running;
        info!(started_at = %now, "session started");
        Ok(())
    }

    /// Running -> Paused
    pub fn pause(&mut self) -> Result<()> {
        if self.state != SessionState::Running {
            return Err(self.invalid("pause"));
        }
        self.state = SessionState::Paused;
        info!("session paused");
        Ok(())
    }

    /// Paused -> Running, keeping the previous reference sample
    pub fn resume(&mut self) -> Result<()> {
        if self.state != SessionState::Paused {
            return Err(self.invalid("resume"));
        }
        self.state = SessionState::Running;
        info!("session resumed");
        Ok(())
    }

    /// Running/Paused -> Ended. The track is consumed into a record.
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<SessionRecord> {
        if !self.state.is_active() {
            return Err(self.invalid("end"));
        }
        let (Some(track), Some(started_at)) = (self.track.take(), self.started_at) else {
            return Err(TrackerError::Other("active session without a track".to_string()));
        };
        self.state = SessionState::Ended;

        let record = SessionRecord::from_track(track, started_at, now);
        info!(
            id = %record.id,
            distance_km = record.distance_km,
            duration_s = record.duration_seconds,
            points = record.route.len(),
            "session ended"
        );
        Ok(record)
    }

    /// Any state -> Idle. Drops the track without producing a record.
    /// Returns whether an unfinished track was discarded.
    pub fn abandon(&mut self) -> bool {
        let discarded = self.track.take().is_some();
        if discarded {
            info!("session abandoned, track discarded");
        }
        self.started_at = None;
        self.state = SessionState::Idle;
        discarded
    }

    /// Feed one location update. Returns `None` when not running: samples
    /// that arrive while paused are ignored without touching the track.
    pub fn on_sample(&mut self, sample: PositionSample) -> Option<Verdict> {
        if self.state != SessionState::Running {
            return None;
        }
        let track = self.track.as_mut()?;
        let verdict = track.offer(sample, &self.validator);
        match verdict {
            Verdict::Rejected(reason) => {
                debug!(lat = sample.latitude, lon = sample.longitude, %reason, "sample rejected")
            }
            _ => debug!(
                lat = sample.latitude,
                lon = sample.longitude,
                total_m = track.cumulative_distance_m(),
                "sample accepted"
            ),
        }
        Some(verdict)
    }

    /// One-second duration tick. Only counts while running.
    pub fn on_tick(&mut self) -> bool {
        if self.state != SessionState::Running {
            return false;
        }
        match self.track.as_mut() {
            Some(track) => {
                track.tick();
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> TrackSnapshot {
        self.track.as_ref().map(Track::snapshot).unwrap_or_default()
    }
}
