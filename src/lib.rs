//! Timer Rack - A state-managed HTTP server for categorized countdown timers
//!
//! This library implements the timer scheduling and state engine: an
//! in-memory registry of categorized countdown timers, one cancellable
//! ticking task per running timer, a lifecycle command surface with
//! write-through JSON persistence, and deduplicated completion
//! notifications.

pub mod api;
pub mod config;
pub mod error;
pub mod persistence;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use error::EngineError;
pub use persistence::JsonStore;
pub use state::{AppState, CompletionEvent, TimerRecord, TimerStatus};
pub use tasks::persist_retry_task;
pub use utils::signals::shutdown_signal;
