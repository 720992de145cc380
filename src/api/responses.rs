//! API response structures

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{BulkOutcome, CompletionEvent, StatusCounts, TimerRecord};

/// Request body for creating a timer.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTimerRequest {
    pub name: String,
    /// Total duration in seconds.
    pub duration: u32,
    pub category: String,
}

/// Response envelope for single-timer commands.
#[derive(Debug, Clone, Serialize)]
pub struct TimerResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerRecord,
}

impl TimerResponse {
    pub fn ok(message: impl Into<String>, timer: TimerRecord) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            timestamp: Utc::now(),
            timer,
        }
    }
}

/// Response envelope for category-wide commands.
#[derive(Debug, Clone, Serialize)]
pub struct BulkResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: BulkOutcome,
}

impl BulkResponse {
    pub fn from_outcome(message: impl Into<String>, outcome: BulkOutcome) -> Self {
        let status = if outcome.errors.is_empty() {
            "ok"
        } else {
            "partial"
        };
        Self {
            status: status.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
            outcome,
        }
    }
}

/// Timers grouped by category, for the list and history views.
#[derive(Debug, Clone, Serialize)]
pub struct GroupedResponse {
    pub categories: BTreeMap<String, Vec<TimerRecord>>,
}

/// Engine status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub counts: StatusCounts,
    pub active_tickers: usize,
    pub last_completion: Option<CompletionEvent>,
    /// True while a failed tick-path write is awaiting retry.
    pub store_dirty: bool,
    pub uptime: String,
    pub port: u16,
    pub host: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
