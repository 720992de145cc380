//! Engine error types

use thiserror::Error;

/// Errors surfaced by the timer engine.
///
/// None of these are fatal to the process: `NotFound` and
/// `InvalidRecord` are reported to the caller, `Persistence` is rolled
/// back on the command path and retried on the tick path.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("timer {0} not found")]
    NotFound(u64),

    #[error("invalid timer record: {0}")]
    InvalidRecord(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("state lock poisoned: {0}")]
    Poisoned(String),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
