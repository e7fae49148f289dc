// src/store.rs
//! Persistence of finished session records
//!
//! Records are kept as one JSON array, newest first, the layout the history
//! views read.

use crate::{
    error::{Result, TrackerError},
    session::SessionRecord,
};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{debug, info};

/// Append-only list of records with a full clear.
pub trait SessionStore: Send + 'static {
    /// Insert at the front. Re-appending an identical record is a no-op; a
    /// different record under an existing id is `DuplicateId`.
    fn append(&mut self, record: &SessionRecord) -> Result<()>;

    /// All records, newest first
    fn list(&self) -> Result<Vec<SessionRecord>>;

    fn clear(&mut self) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.list()?.into_iter().find(|r| r.id == id))
    }
}

/// Whether `record` is already present. An id clash with different content
/// is an error.
fn is_stored(records: &[SessionRecord], record: &SessionRecord) -> Result<bool> {
    match records.iter().find(|r| r.id == record.id) {
        Some(existing) if existing == record => Ok(true),
        Some(_) => Err(TrackerError::DuplicateId(record.id.clone())),
        None => Ok(false),
    }
}

/// Store backed by a single JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<SessionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Replace the file atomically via a sibling temporary file
    fn write_all(&self, records: &[SessionRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string(records)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for JsonFileStore {
    fn append(&mut self, record: &SessionRecord) -> Result<()> {
        let mut records = self.read_all()?;
        if is_stored(&records, record)? {
            debug!(id = %record.id, "record already stored");
            return Ok(());
        }
        records.insert(0, record.clone());
        self.write_all(&records)?;
        info!(id = %record.id, total = records.len(), "record saved to {}", self.path.display());
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionRecord>> {
        self.read_all()
    }

    fn clear(&mut self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        info!("cleared records at {}", self.path.display());
        Ok(())
    }
}

/// In-memory store. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<Vec<SessionRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<SessionRecord>>> {
        self.records
            .lock()
            .map_err(|_| TrackerError::Other("memory store lock poisoned".to_string()))
    }
}

impl SessionStore for MemoryStore {
    fn append(&mut self, record: &SessionRecord) -> Result<()> {
        let mut records = self.lock()?;
        if !is_stored(&records, record)? {
            records.insert(0, record.clone());
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionRecord>> {
        Ok(self.lock()?.clone())
    }

    fn clear(&mut self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}
