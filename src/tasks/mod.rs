//! Background tasks module
//!
//! The per-timer countdown tasks, the arena that owns their handles,
//! and the persistence retry loop that runs alongside the HTTP server.

pub mod countdown;
pub mod retry_flush;
pub mod scheduler;

// Re-export main entry points
pub use countdown::{countdown_task, TICK_PERIOD};
pub use retry_flush::persist_retry_task;
pub use scheduler::Scheduler;
