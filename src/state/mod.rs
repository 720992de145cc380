//! State management module
//!
//! The timer records, the in-memory registry they live in, the
//! completion notifier, and the application state that ties them to the
//! scheduler and the durable store.

pub mod app_state;
pub mod notifier;
pub mod registry;
pub mod timer;

// Re-export main types
pub use app_state::{AppState, BulkError, BulkOutcome, TickOutcome};
pub use notifier::{CompletionEvent, CompletionNotifier};
pub use registry::{Registry, StatusCounts, TickStep};
pub use timer::{TimerRecord, TimerStatus};
