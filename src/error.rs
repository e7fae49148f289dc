// src/error.rs
//! Error types for the exercise tracker

use crate::session::record::SessionRecord;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// The location source refused access. Starting a session is not possible.
    #[error("Location permission denied: {0}")]
    PermissionDenied(String),

    #[error("Cannot {command} while session is {state}")]
    InvalidTransition {
        state: &'static str,
        command: &'static str,
    },

    /// Appending a finished record to the store failed. The record is handed
    /// back so the caller can decide what to do with it.
    #[error("Failed to save session {}: {source}", record.id)]
    Persistence {
        record: Box<SessionRecord>,
        #[source]
        source: Box<TrackerError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Recorder task is no longer running")]
    RecorderClosed,

    /// A different record is already stored under this id
    #[error("A different session is already stored with id {0}")]
    DuplicateId(String),

    #[cfg(windows)]
    #[error("Windows error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("Error: {0}")]
    Other(String),
}

impl TrackerError {
    /// Map an IO error raised while opening a location source, turning
    /// access refusals into `PermissionDenied`.
    pub fn from_source_io(what: &str, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                TrackerError::PermissionDenied(format!("{}: {}", what, error))
            }
            _ => TrackerError::Connection(format!("{}: {}", what, error)),
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, TrackerError::PermissionDenied(_))
    }
}

impl From<anyhow::Error> for TrackerError {
    fn from(error: anyhow::Error) -> Self {
        TrackerError::Other(error.to_string())
    }
}
