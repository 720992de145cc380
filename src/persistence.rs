//! Durable timer storage
//!
//! The store is a single JSON file holding the full ordered list of
//! timer records. It is read wholesale at startup and written wholesale
//! on every durable mutation. `remaining` is deliberately not part of
//! the schema: a reloaded timer starts over from its full duration, the
//! registry rehydrates it on load.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::state::timer::{TimerRecord, TimerStatus};

/// On-disk shape of one timer.
///
/// Schema: `{id, name, duration, category, status, completedAt?}` with
/// ISO-8601 timestamps. Field names are part of the format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTimer {
    pub id: u64,
    pub name: String,
    pub duration: u32,
    pub category: String,
    pub status: TimerStatus,
    #[serde(rename = "completedAt", skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&TimerRecord> for StoredTimer {
    fn from(record: &TimerRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            duration: record.duration,
            category: record.category.clone(),
            status: record.status,
            completed_at: record.completed_at,
        }
    }
}

impl StoredTimer {
    /// Lift into a runtime record. `remaining` is rehydrated from the
    /// status; further normalization (demoting `Running`, dropping
    /// malformed rows) is the registry's job.
    pub fn into_record(self) -> TimerRecord {
        let remaining = if self.status == TimerStatus::Completed {
            0
        } else {
            self.duration
        };
        TimerRecord {
            id: self.id,
            name: self.name,
            duration: self.duration,
            category: self.category,
            status: self.status,
            remaining,
            completed_at: self.completed_at,
        }
    }
}

/// JSON-file backed timer store.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole collection. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<TimerRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| EngineError::Persistence(format!("read {}: {e}", self.path.display())))?;
        let stored: Vec<StoredTimer> = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Persistence(format!("parse {}: {e}", self.path.display())))?;
        Ok(stored.into_iter().map(StoredTimer::into_record).collect())
    }

    /// Write the whole collection.
    pub fn save(&self, records: &[TimerRecord]) -> Result<()> {
        let stored: Vec<StoredTimer> = records.iter().map(StoredTimer::from).collect();
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| EngineError::Persistence(format!("serialize timers: {e}")))?;
        fs::write(&self.path, json)
            .map_err(|e| EngineError::Persistence(format!("write {}: {e}", self.path.display())))
    }
}
