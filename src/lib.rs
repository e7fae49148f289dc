// src/lib.rs
//! Exercise Tracker Library
//!
//! Records a walking or running session from a GPS location source, filters
//! noisy samples, accumulates distance and duration, and keeps a local
//! history of finished sessions.

pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod history;
pub mod location;
pub mod recorder;
pub mod route;
pub mod session;
pub mod store;
pub mod track;

// Re-export main types for convenience
pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use location::{LocationSource, LocationSubscription, PositionSample};
pub use recorder::{RecorderHandle, RecorderStatus, TrackRecorder};
pub use session::{Session, SessionRecord, SessionState};
pub use store::{JsonFileStore, MemoryStore, SessionStore};
pub use track::{haversine_m, Thresholds, Track, TrackSnapshot, Verdict};
