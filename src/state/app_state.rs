//! Application state and the timer command surface
//!
//! `AppState` wires the registry, the durable store, the ticker
//! scheduler and the completion notifier together, and exposes the
//! lifecycle commands the HTTP layer calls. Command-path transitions
//! are write-through: the in-memory mutation is rolled back if the
//! durable write fails. Tick-path writes are best-effort and retried by
//! the background flush task.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::persistence::JsonStore;
use crate::state::notifier::{CompletionEvent, CompletionNotifier};
use crate::state::registry::{Registry, StatusCounts, TickStep};
use crate::state::timer::{TimerRecord, TimerStatus};
use crate::tasks::countdown::countdown_task;
use crate::tasks::scheduler::Scheduler;

/// What one scheduler tick did to a timer.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    Ticked { remaining: u32 },
    Finished(CompletionEvent),
    /// The timer left the `Running` state; the ticker should exit.
    Halted,
}

/// Per-item error from a bulk operation.
#[derive(Debug, Clone, Serialize)]
pub struct BulkError {
    pub id: u64,
    pub error: String,
}

/// Aggregated result of a category-wide operation. One member failing
/// never blocks the others.
#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub category: String,
    pub applied: Vec<u64>,
    pub skipped: Vec<u64>,
    pub errors: Vec<BulkError>,
}

impl BulkOutcome {
    fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            applied: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn record_err(&mut self, id: u64, error: EngineError) {
        self.errors.push(BulkError {
            id,
            error: error.to_string(),
        });
    }
}

/// Shared state behind every handler and background task.
pub struct AppState {
    pub registry: Registry,
    pub scheduler: Scheduler,
    pub notifier: CompletionNotifier,
    store: JsonStore,
    /// Set when a tick-path write failed; the retry task flushes it.
    dirty: AtomicBool,
    /// Monotonic id allocator, seeded from the clock and the store.
    next_id: AtomicU64,
    /// Self-handle so lifecycle commands can hand the state to the
    /// countdown tasks they spawn.
    me: Weak<AppState>,
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
}

impl AppState {
    /// Load the store and build the engine state around it.
    pub fn new(store: JsonStore, port: u16, host: String) -> Result<Arc<Self>> {
        let records = store.load()?;
        let registry = Registry::new();
        let loaded = registry.load(records)?;
        info!(loaded, store = %store.path().display(), "timer store loaded");

        let max_id = registry
            .snapshot()?
            .iter()
            .map(|t| t.id)
            .max()
            .unwrap_or(0);
        let seed = (Utc::now().timestamp_millis() as u64).max(max_id + 1);

        Ok(Arc::new_cyclic(|me| Self {
            registry,
            scheduler: Scheduler::new(),
            notifier: CompletionNotifier::new(),
            store,
            dirty: AtomicBool::new(false),
            next_id: AtomicU64::new(seed),
            me: me.clone(),
            start_time: Instant::now(),
            port,
            host,
        }))
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Write the full registry snapshot through to the store.
    pub fn persist(&self) -> Result<()> {
        let snapshot = self.registry.snapshot()?;
        self.store.save(&snapshot)?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn persist_best_effort(&self) {
        if let Err(e) = self.persist() {
            warn!(error = %e, "tick-path persist failed, deferring to retry task");
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    // ── Creation ────────────────────────────────────────────────────

    /// Validate and register a new timer; always starts `Paused` at
    /// full duration.
    pub fn create_timer(
        &self,
        name: String,
        duration: u32,
        category: String,
    ) -> Result<TimerRecord> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = TimerRecord::new(id, name, duration, category)?;

        self.registry.upsert(record.clone())?;
        if let Err(e) = self.persist() {
            self.registry.remove(id)?;
            return Err(e);
        }
        info!(id, name = %record.name, duration = record.duration, "timer created");
        Ok(record)
    }

    // ── Lifecycle commands ──────────────────────────────────────────

    /// `Paused -> Running`; idempotent when already running. Completed
    /// timers only leave that state via reset.
    pub fn start_timer(&self, id: u64) -> Result<TimerRecord> {
        let prior = self.registry.get(id)?;
        match prior.status {
            TimerStatus::Completed => Ok(prior),
            TimerStatus::Running => {
                // Idempotent: ensure a ticker exists, never a second one.
                self.spawn_ticker(id)?;
                Ok(prior)
            }
            TimerStatus::Paused => {
                let updated = self
                    .registry
                    .update(id, |t| t.status = TimerStatus::Running)?;
                if let Err(e) = self.persist() {
                    self.registry
                        .update(id, |t| t.status = TimerStatus::Paused)?;
                    return Err(e);
                }
                self.spawn_ticker(id)?;
                info!(id, remaining = updated.remaining, "timer started");
                Ok(updated)
            }
        }
    }

    /// `Running -> Paused`, remaining time frozen. No-op otherwise.
    pub fn pause_timer(&self, id: u64) -> Result<TimerRecord> {
        let prior = self.registry.get(id)?;
        if !prior.is_running() {
            return Ok(prior);
        }

        // Flip the status first: any in-flight tick that acquires the
        // registry lock after this point halts without mutating.
        let updated = self
            .registry
            .update(id, |t| t.status = TimerStatus::Paused)?;
        if let Err(e) = self.persist() {
            self.registry
                .update(id, |t| t.status = TimerStatus::Running)?;
            return Err(e);
        }
        self.scheduler.stop(id)?;
        info!(id, remaining = updated.remaining, "timer paused");
        Ok(updated)
    }

    /// Any state -> `Paused` at full duration, completion timestamp
    /// cleared.
    pub fn reset_timer(&self, id: u64) -> Result<TimerRecord> {
        let prior = self.registry.get(id)?;
        self.scheduler.stop(id)?;

        let updated = self.registry.update(id, TimerRecord::restore)?;
        if let Err(e) = self.persist() {
            let rollback = prior.clone();
            self.registry.update(id, move |t| *t = rollback)?;
            if prior.is_running() {
                // The rollback re-implies a ticking process.
                self.spawn_ticker(id)?;
            }
            return Err(e);
        }
        info!(id, "timer reset");
        Ok(updated)
    }

    // ── Bulk commands ───────────────────────────────────────────────

    /// Start every paused timer in a category; running and completed
    /// members are skipped.
    pub fn start_all(&self, category: &str) -> Result<BulkOutcome> {
        let mut outcome = BulkOutcome::new(category);
        for id in self.registry.ids_in_category(category)? {
            match self.registry.get(id) {
                Ok(t) if t.status != TimerStatus::Paused => outcome.skipped.push(id),
                Ok(_) => match self.start_timer(id) {
                    Ok(_) => outcome.applied.push(id),
                    Err(e) => outcome.record_err(id, e),
                },
                Err(e) => outcome.record_err(id, e),
            }
        }
        info!(
            category,
            applied = outcome.applied.len(),
            skipped = outcome.skipped.len(),
            errors = outcome.errors.len(),
            "start-all finished"
        );
        Ok(outcome)
    }

    /// Pause every running timer in a category.
    pub fn pause_all(&self, category: &str) -> Result<BulkOutcome> {
        let mut outcome = BulkOutcome::new(category);
        for id in self.registry.ids_in_category(category)? {
            match self.registry.get(id) {
                Ok(t) if !t.is_running() => outcome.skipped.push(id),
                Ok(_) => match self.pause_timer(id) {
                    Ok(_) => outcome.applied.push(id),
                    Err(e) => outcome.record_err(id, e),
                },
                Err(e) => outcome.record_err(id, e),
            }
        }
        info!(
            category,
            applied = outcome.applied.len(),
            skipped = outcome.skipped.len(),
            errors = outcome.errors.len(),
            "pause-all finished"
        );
        Ok(outcome)
    }

    /// Reset every timer in a category, completed ones included.
    pub fn reset_all(&self, category: &str) -> Result<BulkOutcome> {
        let mut outcome = BulkOutcome::new(category);
        for id in self.registry.ids_in_category(category)? {
            match self.reset_timer(id) {
                Ok(_) => outcome.applied.push(id),
                Err(e) => outcome.record_err(id, e),
            }
        }
        info!(
            category,
            applied = outcome.applied.len(),
            errors = outcome.errors.len(),
            "reset-all finished"
        );
        Ok(outcome)
    }

    // ── Scheduler glue ──────────────────────────────────────────────

    fn spawn_ticker(&self, id: u64) -> Result<()> {
        // Upgrade always succeeds while a command is executing; the
        // engine is only dropped after the server stops.
        let Some(state) = self.me.upgrade() else {
            return Ok(());
        };
        self.scheduler
            .start_with(id, move || tokio::spawn(countdown_task(state, id)))?;
        Ok(())
    }

    /// Advance one timer by one tick. Called only from countdown tasks.
    pub fn apply_tick(&self, id: u64) -> Result<TickOutcome> {
        match self.registry.apply_tick(id, Utc::now())? {
            TickStep::Halted => Ok(TickOutcome::Halted),
            TickStep::Ticked { remaining } => {
                self.persist_best_effort();
                Ok(TickOutcome::Ticked { remaining })
            }
            TickStep::Finished { name, completed_at } => {
                self.persist_best_effort();
                let event = CompletionEvent {
                    id,
                    name,
                    completed_at,
                };
                self.notifier.publish(event.clone());
                Ok(TickOutcome::Finished(event))
            }
        }
    }

    // ── Views ───────────────────────────────────────────────────────

    pub fn get_timer(&self, id: u64) -> Result<TimerRecord> {
        self.registry.get(id)
    }

    pub fn grouped_timers(&self) -> Result<BTreeMap<String, Vec<TimerRecord>>> {
        self.registry.grouped()
    }

    /// Completed timers by category; the export side reads this.
    pub fn completed_timers(&self) -> Result<BTreeMap<String, Vec<TimerRecord>>> {
        self.registry.completed_by_category()
    }

    pub fn counts(&self) -> Result<StatusCounts> {
        self.registry.counts()
    }

    pub fn last_completion(&self) -> Option<CompletionEvent> {
        self.notifier.last()
    }

    /// Server uptime as a human-readable string.
    pub fn uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{hours}h {minutes}m {seconds}s")
        } else if minutes > 0 {
            format!("{minutes}m {seconds}s")
        } else {
            format!("{seconds}s")
        }
    }
}
