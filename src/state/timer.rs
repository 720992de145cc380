//! Timer record and lifecycle status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Lifecycle status of a single timer.
///
/// Serialized variant names are part of the storage schema, do not
/// rename them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerStatus {
    Paused,
    Running,
    Completed,
}

/// One countdown timer.
///
/// `remaining` is runtime state only: the durable store keeps the
/// original duration and a reloaded timer starts over from it (see
/// `persistence::StoredTimer`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerRecord {
    pub id: u64,
    pub name: String,
    /// Total duration in seconds, immutable after creation.
    pub duration: u32,
    pub category: String,
    pub status: TimerStatus,
    /// Seconds left; only decremented while `Running`.
    pub remaining: u32,
    /// Set exactly once, on the transition into `Completed`.
    #[serde(rename = "completedAt", skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TimerRecord {
    /// Validate and build a fresh record. New timers always start
    /// `Paused` at full duration.
    pub fn new(id: u64, name: String, duration: u32, category: String) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidRecord("name must not be empty".into()));
        }
        if category.trim().is_empty() {
            return Err(EngineError::InvalidRecord(
                "category must not be empty".into(),
            ));
        }
        if duration == 0 {
            return Err(EngineError::InvalidRecord(
                "duration must be a positive number of seconds".into(),
            ));
        }

        Ok(Self {
            id,
            name,
            duration,
            category,
            status: TimerStatus::Paused,
            remaining: duration,
            completed_at: None,
        })
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn is_completed(&self) -> bool {
        self.status == TimerStatus::Completed
    }

    /// Restore the record to a fresh paused state at full duration.
    pub fn restore(&mut self) {
        self.status = TimerStatus::Paused;
        self.remaining = self.duration;
        self.completed_at = None;
    }
}
