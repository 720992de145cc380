//! In-memory timer registry
//!
//! Single source of truth for the timer collection. Holds the records
//! in insertion order and maintains an incremental category index so
//! grouped views and bulk operations never rescan the whole list.
//! Every mutation happens under one mutex and either fully applies or
//! leaves the prior state untouched.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::state::timer::{TimerRecord, TimerStatus};

/// Result of applying one tick to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickStep {
    /// Decremented, still running.
    Ticked { remaining: u32 },
    /// Hit zero on this tick: transitioned into `Completed`.
    Finished {
        name: String,
        completed_at: DateTime<Utc>,
    },
    /// Record is no longer `Running`; nothing was mutated.
    Halted,
}

/// Status counts for the status view.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub running: usize,
    pub paused: usize,
    pub completed: usize,
}

#[derive(Default)]
struct RegistryInner {
    /// Insertion-ordered records.
    records: Vec<TimerRecord>,
    /// id -> position in `records`.
    by_id: HashMap<u64, usize>,
    /// category -> member ids, insertion-ordered. Derived from the
    /// records, rebuilt on load and maintained on every upsert/remove.
    by_category: HashMap<String, Vec<u64>>,
}

impl RegistryInner {
    fn index(&mut self, id: u64, position: usize, category: &str) {
        self.by_id.insert(id, position);
        self.by_category
            .entry(category.to_string())
            .or_default()
            .push(id);
    }

    fn unindex_category(&mut self, id: u64, category: &str) {
        if let Some(members) = self.by_category.get_mut(category) {
            members.retain(|&m| m != id);
            if members.is_empty() {
                self.by_category.remove(category);
            }
        }
    }
}

/// The authoritative in-memory timer collection.
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RegistryInner>> {
        self.inner
            .lock()
            .map_err(|e| EngineError::Poisoned(e.to_string()))
    }

    /// Replace the whole collection and rebuild both indexes.
    ///
    /// Normalizes records coming from storage: `remaining` is
    /// rehydrated from the status, stored `Running` records are demoted
    /// to `Paused` (no ticking process exists for them yet), and
    /// malformed records are skipped with a warning. Returns how many
    /// records were accepted.
    pub fn load(&self, records: Vec<TimerRecord>) -> Result<usize> {
        let mut inner = self.lock()?;
        inner.records.clear();
        inner.by_id.clear();
        inner.by_category.clear();

        for mut record in records {
            if record.duration == 0 {
                warn!(id = record.id, "skipping stored timer with zero duration");
                continue;
            }
            if record.is_completed() && record.completed_at.is_none() {
                warn!(
                    id = record.id,
                    "skipping completed timer without completion timestamp"
                );
                continue;
            }
            if !record.is_completed() && record.completed_at.is_some() {
                warn!(id = record.id, "clearing stray completion timestamp");
                record.completed_at = None;
            }
            if record.is_running() {
                debug!(id = record.id, "demoting stored running timer to paused");
                record.status = TimerStatus::Paused;
            }
            record.remaining = if record.is_completed() {
                0
            } else {
                record.duration
            };

            if inner.by_id.contains_key(&record.id) {
                warn!(id = record.id, "skipping duplicate timer id in store");
                continue;
            }
            let position = inner.records.len();
            let (id, category) = (record.id, record.category.clone());
            inner.records.push(record);
            inner.index(id, position, &category);
        }

        Ok(inner.records.len())
    }

    /// Clone of the full collection, in insertion order.
    pub fn snapshot(&self) -> Result<Vec<TimerRecord>> {
        Ok(self.lock()?.records.clone())
    }

    pub fn get(&self, id: u64) -> Result<TimerRecord> {
        let inner = self.lock()?;
        inner
            .by_id
            .get(&id)
            .map(|&pos| inner.records[pos].clone())
            .ok_or(EngineError::NotFound(id))
    }

    /// Replace-or-insert, preserving insertion order for replacements.
    pub fn upsert(&self, record: TimerRecord) -> Result<()> {
        let mut inner = self.lock()?;
        match inner.by_id.get(&record.id).copied() {
            Some(pos) => {
                let old_category = inner.records[pos].category.clone();
                if old_category != record.category {
                    let id = record.id;
                    inner.unindex_category(id, &old_category);
                    inner
                        .by_category
                        .entry(record.category.clone())
                        .or_default()
                        .push(id);
                }
                inner.records[pos] = record;
            }
            None => {
                let position = inner.records.len();
                let (id, category) = (record.id, record.category.clone());
                inner.records.push(record);
                inner.index(id, position, &category);
            }
        }
        Ok(())
    }

    /// Remove a record, returning it if present.
    pub fn remove(&self, id: u64) -> Result<Option<TimerRecord>> {
        let mut inner = self.lock()?;
        let Some(pos) = inner.by_id.remove(&id) else {
            return Ok(None);
        };
        let record = inner.records.remove(pos);
        inner.unindex_category(id, &record.category);
        // Positions after the removed slot shifted down by one.
        let inner = &mut *inner;
        for later in &inner.records[pos..] {
            if let Some(entry) = inner.by_id.get_mut(&later.id) {
                *entry -= 1;
            }
        }
        Ok(Some(record))
    }

    /// Apply a mutation to one record under the lock and return the
    /// updated clone. The closure must not change `id`.
    pub fn update<F>(&self, id: u64, mutate: F) -> Result<TimerRecord>
    where
        F: FnOnce(&mut TimerRecord),
    {
        let mut inner = self.lock()?;
        let pos = *inner.by_id.get(&id).ok_or(EngineError::NotFound(id))?;
        let old_category = inner.records[pos].category.clone();
        mutate(&mut inner.records[pos]);
        let updated = inner.records[pos].clone();
        if updated.category != old_category {
            inner.unindex_category(id, &old_category);
            inner
                .by_category
                .entry(updated.category.clone())
                .or_default()
                .push(id);
        }
        Ok(updated)
    }

    /// Advance a running record by one tick.
    ///
    /// The status check and the mutation happen under the same lock, so
    /// a command that has already moved the record out of `Running`
    /// makes this a guaranteed no-op, and the `Running -> Completed`
    /// transition can only ever fire once per completion.
    pub fn apply_tick(&self, id: u64, now: DateTime<Utc>) -> Result<TickStep> {
        let mut inner = self.lock()?;
        let pos = *inner.by_id.get(&id).ok_or(EngineError::NotFound(id))?;
        let record = &mut inner.records[pos];

        if !record.is_running() {
            return Ok(TickStep::Halted);
        }

        record.remaining = record.remaining.saturating_sub(1);
        if record.remaining == 0 {
            record.status = TimerStatus::Completed;
            record.completed_at = Some(now);
            Ok(TickStep::Finished {
                name: record.name.clone(),
                completed_at: now,
            })
        } else {
            Ok(TickStep::Ticked {
                remaining: record.remaining,
            })
        }
    }

    /// Member ids of one category, in insertion order.
    pub fn ids_in_category(&self, category: &str) -> Result<Vec<u64>> {
        Ok(self
            .lock()?
            .by_category
            .get(category)
            .cloned()
            .unwrap_or_default())
    }

    /// All timers grouped by category.
    pub fn grouped(&self) -> Result<BTreeMap<String, Vec<TimerRecord>>> {
        let inner = self.lock()?;
        let mut grouped: BTreeMap<String, Vec<TimerRecord>> = BTreeMap::new();
        for (category, ids) in &inner.by_category {
            let members = ids
                .iter()
                .filter_map(|id| inner.by_id.get(id).map(|&pos| inner.records[pos].clone()))
                .collect();
            grouped.insert(category.clone(), members);
        }
        Ok(grouped)
    }

    /// Completed timers grouped by category; the read-only view the
    /// history/export side consumes.
    pub fn completed_by_category(&self) -> Result<BTreeMap<String, Vec<TimerRecord>>> {
        let mut grouped = self.grouped()?;
        grouped.retain(|_, members| {
            members.retain(|t| t.is_completed());
            !members.is_empty()
        });
        Ok(grouped)
    }

    pub fn counts(&self) -> Result<StatusCounts> {
        let inner = self.lock()?;
        let mut counts = StatusCounts {
            total: inner.records.len(),
            ..Default::default()
        };
        for record in &inner.records {
            match record.status {
                TimerStatus::Running => counts.running += 1,
                TimerStatus::Paused => counts.paused += 1,
                TimerStatus::Completed => counts.completed += 1,
            }
        }
        Ok(counts)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(id: u64, category: &str, duration: u32) -> TimerRecord {
        TimerRecord::new(id, format!("timer-{id}"), duration, category.into()).unwrap()
    }

    #[test]
    fn upsert_preserves_insertion_order() {
        let registry = Registry::new();
        registry.upsert(timer(1, "Work", 60)).unwrap();
        registry.upsert(timer(2, "Work", 30)).unwrap();
        registry.upsert(timer(3, "Home", 10)).unwrap();

        // Replacing an existing record must not move it.
        let mut replacement = timer(1, "Work", 60);
        replacement.name = "renamed".into();
        registry.upsert(replacement).unwrap();

        let ids: Vec<u64> = registry.snapshot().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(registry.get(1).unwrap().name, "renamed");
    }

    #[test]
    fn category_index_follows_category_changes() {
        let registry = Registry::new();
        registry.upsert(timer(1, "Work", 60)).unwrap();
        registry.upsert(timer(2, "Work", 30)).unwrap();

        registry.update(1, |t| t.category = "Home".into()).unwrap();

        assert_eq!(registry.ids_in_category("Work").unwrap(), vec![2]);
        assert_eq!(registry.ids_in_category("Home").unwrap(), vec![1]);
    }

    #[test]
    fn remove_fixes_positions() {
        let registry = Registry::new();
        registry.upsert(timer(1, "Work", 60)).unwrap();
        registry.upsert(timer(2, "Work", 30)).unwrap();
        registry.upsert(timer(3, "Work", 10)).unwrap();

        let removed = registry.remove(2).unwrap().unwrap();
        assert_eq!(removed.id, 2);
        assert_eq!(registry.get(3).unwrap().id, 3);
        assert_eq!(registry.ids_in_category("Work").unwrap(), vec![1, 3]);
        assert!(registry.remove(2).unwrap().is_none());
    }

    #[test]
    fn tick_completes_exactly_once() {
        let registry = Registry::new();
        registry.upsert(timer(1, "Work", 2)).unwrap();
        registry
            .update(1, |t| t.status = TimerStatus::Running)
            .unwrap();

        let now = Utc::now();
        assert_eq!(
            registry.apply_tick(1, now).unwrap(),
            TickStep::Ticked { remaining: 1 }
        );
        assert!(matches!(
            registry.apply_tick(1, now).unwrap(),
            TickStep::Finished { .. }
        ));
        // Completed records never tick again.
        assert_eq!(registry.apply_tick(1, now).unwrap(), TickStep::Halted);

        let record = registry.get(1).unwrap();
        assert_eq!(record.status, TimerStatus::Completed);
        assert_eq!(record.remaining, 0);
        assert!(record.completed_at.is_some());
    }

    #[test]
    fn tick_on_paused_record_is_inert() {
        let registry = Registry::new();
        registry.upsert(timer(1, "Work", 5)).unwrap();
        assert_eq!(registry.apply_tick(1, Utc::now()).unwrap(), TickStep::Halted);
        assert_eq!(registry.get(1).unwrap().remaining, 5);
    }

    #[test]
    fn load_normalizes_stored_records() {
        let registry = Registry::new();

        let mut running = timer(1, "Work", 60);
        running.status = TimerStatus::Running;
        running.remaining = 0; // storage carries no remaining

        let mut completed = timer(2, "Work", 30);
        completed.status = TimerStatus::Completed;
        completed.completed_at = Some(Utc::now());

        let mut orphan = timer(3, "Work", 30);
        orphan.status = TimerStatus::Completed; // no timestamp: malformed

        let loaded = registry.load(vec![running, completed, orphan]).unwrap();
        assert_eq!(loaded, 2);

        let rehydrated = registry.get(1).unwrap();
        assert_eq!(rehydrated.status, TimerStatus::Paused);
        assert_eq!(rehydrated.remaining, 60);

        let done = registry.get(2).unwrap();
        assert_eq!(done.remaining, 0);
        assert!(registry.get(3).is_err());
    }

    #[test]
    fn completed_view_only_holds_completed() {
        let registry = Registry::new();
        registry.upsert(timer(1, "Work", 60)).unwrap();
        let mut done = timer(2, "Work", 30);
        done.status = TimerStatus::Completed;
        done.remaining = 0;
        done.completed_at = Some(Utc::now());
        registry.upsert(done).unwrap();
        registry.upsert(timer(3, "Home", 10)).unwrap();

        let history = registry.completed_by_category().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history["Work"].len(), 1);
        assert_eq!(history["Work"][0].id, 2);
    }
}
