//! Utility module

pub mod signals;

pub use signals::shutdown_signal;
