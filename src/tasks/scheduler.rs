//! Ticker arena
//!
//! Tracks the one cancellable tokio task allowed per running timer,
//! keyed by timer id. Start is idempotent so a timer can never be
//! driven by two tickers at once.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{EngineError, Result};

pub struct Scheduler {
    tickers: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tickers: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<u64, JoinHandle<()>>>> {
        self.tickers
            .lock()
            .map_err(|e| EngineError::Poisoned(e.to_string()))
    }

    /// Spawn a ticker for `id` unless a live one already exists.
    ///
    /// Returns `true` if a task was spawned. A handle whose task has
    /// already finished (the timer completed on its own) is replaced in
    /// place.
    pub fn start_with<F>(&self, id: u64, spawn: F) -> Result<bool>
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        let mut tickers = self.lock()?;
        match tickers.entry(id) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_finished() {
                    entry.insert(spawn());
                    Ok(true)
                } else {
                    debug!(id, "ticker already active, not spawning another");
                    Ok(false)
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(spawn());
                Ok(true)
            }
        }
    }

    /// Cancel the ticker for `id` if one exists. Idempotent.
    ///
    /// Aborting alone does not fence an in-flight tick; callers rely on
    /// the registry's status guard for that. This only tears the task
    /// down.
    pub fn stop(&self, id: u64) -> Result<bool> {
        let handle = self.lock()?.remove(&id);
        match handle {
            Some(handle) => {
                handle.abort();
                debug!(id, "ticker cancelled");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether a live ticker exists for `id`.
    pub fn is_ticking(&self, id: u64) -> Result<bool> {
        Ok(self
            .lock()?
            .get(&id)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false))
    }

    /// Number of live tickers.
    pub fn active(&self) -> Result<usize> {
        Ok(self
            .lock()?
            .values()
            .filter(|handle| !handle.is_finished())
            .count())
    }

    /// Drop entries whose task already finished on its own, so the map
    /// does not accumulate one dead handle per completed timer. Returns
    /// how many entries were dropped. Safe against concurrent restarts:
    /// a respawned ticker holds an unfinished handle and is kept.
    pub fn reap(&self) -> Result<usize> {
        let mut tickers = self.lock()?;
        let before = tickers.len();
        tickers.retain(|_, handle| !handle.is_finished());
        Ok(before - tickers.len())
    }

    /// Abort every ticker; used on shutdown.
    pub fn stop_all(&self) -> Result<()> {
        for (_, handle) in self.lock()?.drain() {
            handle.abort();
        }
        Ok(())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
