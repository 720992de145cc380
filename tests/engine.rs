//! Engine integration tests
//!
//! Countdown scenarios run on tokio's paused clock: sleeping past a
//! tick deadline deterministically fires the countdown tasks, so the
//! 1-second cadence costs no wall time. Sleeps land 50 ms after a tick
//! boundary to keep wake-up ordering unambiguous.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::sleep;

use timer_rack::persistence::JsonStore;
use timer_rack::state::{AppState, TimerStatus};
use timer_rack::tasks::persist_retry_task;
use timer_rack::EngineError;

fn new_state(dir: &TempDir) -> Arc<AppState> {
    let store = JsonStore::new(dir.path().join("timers.json"));
    AppState::new(store, 0, "127.0.0.1".into()).unwrap()
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test(start_paused = true)]
async fn timer_runs_to_completion_with_one_event() {
    let dir = TempDir::new().unwrap();
    let state = new_state(&dir);
    let mut completions = state.notifier.subscribe();

    let timer = state
        .create_timer("Deep work".into(), 5, "Work".into())
        .unwrap();
    state.start_timer(timer.id).unwrap();

    sleep(ms(5_050)).await;

    let done = state.get_timer(timer.id).unwrap();
    assert_eq!(done.status, TimerStatus::Completed);
    assert_eq!(done.remaining, 0);
    assert!(done.completed_at.is_some());
    assert!(!state.scheduler.is_ticking(timer.id).unwrap());

    // Exactly one completion event, carrying the timer's name.
    completions.changed().await.unwrap();
    let event = completions.borrow_and_update().clone().unwrap();
    assert_eq!(event.id, timer.id);
    assert_eq!(event.name, "Deep work");
    assert!(!completions.has_changed().unwrap());

    // The terminal transition was written through to the store.
    let raw = std::fs::read_to_string(dir.path().join("timers.json")).unwrap();
    assert!(raw.contains("\"Completed\""));
    assert!(raw.contains("\"completedAt\""));
}

#[tokio::test(start_paused = true)]
async fn completed_timer_does_not_restart_or_refire() {
    let dir = TempDir::new().unwrap();
    let state = new_state(&dir);
    let mut completions = state.notifier.subscribe();

    let timer = state.create_timer("Egg".into(), 2, "Kitchen".into()).unwrap();
    state.start_timer(timer.id).unwrap();
    sleep(ms(2_050)).await;

    completions.changed().await.unwrap();
    completions.borrow_and_update();

    // Start on a completed timer is a no-op; only reset leaves Completed.
    let unchanged = state.start_timer(timer.id).unwrap();
    assert_eq!(unchanged.status, TimerStatus::Completed);
    sleep(ms(2_050)).await;

    assert_eq!(
        state.get_timer(timer.id).unwrap().status,
        TimerStatus::Completed
    );
    assert!(!completions.has_changed().unwrap());
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_and_start_resumes() {
    let dir = TempDir::new().unwrap();
    let state = new_state(&dir);

    let timer = state.create_timer("Tea".into(), 5, "Kitchen".into()).unwrap();
    state.start_timer(timer.id).unwrap();
    sleep(ms(2_050)).await;

    let paused = state.pause_timer(timer.id).unwrap();
    assert_eq!(paused.status, TimerStatus::Paused);
    assert_eq!(paused.remaining, 3);

    // Frozen while paused, no ticker alive.
    sleep(ms(3_000)).await;
    assert_eq!(state.get_timer(timer.id).unwrap().remaining, 3);
    assert!(!state.scheduler.is_ticking(timer.id).unwrap());

    // Resuming continues from 3, not from the full duration.
    state.start_timer(timer.id).unwrap();
    sleep(ms(1_050)).await;
    assert_eq!(state.get_timer(timer.id).unwrap().remaining, 2);
}

#[tokio::test(start_paused = true)]
async fn starting_a_running_timer_does_not_double_tick() {
    let dir = TempDir::new().unwrap();
    let state = new_state(&dir);

    let timer = state.create_timer("Focus".into(), 10, "Work".into()).unwrap();
    state.start_timer(timer.id).unwrap();
    sleep(ms(1_050)).await;

    // Second start must not spawn a second ticker.
    let again = state.start_timer(timer.id).unwrap();
    assert_eq!(again.status, TimerStatus::Running);
    sleep(ms(2_000)).await;

    // 3 seconds elapsed in total: exactly 3 decrements.
    assert_eq!(state.get_timer(timer.id).unwrap().remaining, 7);
}

#[tokio::test(start_paused = true)]
async fn reset_restores_full_duration_from_any_state() {
    let dir = TempDir::new().unwrap();
    let state = new_state(&dir);

    // Reset while running.
    let timer = state.create_timer("Laps".into(), 5, "Sport".into()).unwrap();
    state.start_timer(timer.id).unwrap();
    sleep(ms(2_050)).await;

    let fresh = state.reset_timer(timer.id).unwrap();
    assert_eq!(fresh.status, TimerStatus::Paused);
    assert_eq!(fresh.remaining, 5);
    sleep(ms(2_000)).await;
    assert_eq!(state.get_timer(timer.id).unwrap().remaining, 5);

    // Reset out of Completed clears the timestamp.
    let short = state.create_timer("Sprint".into(), 2, "Sport".into()).unwrap();
    state.start_timer(short.id).unwrap();
    sleep(ms(2_050)).await;
    assert_eq!(
        state.get_timer(short.id).unwrap().status,
        TimerStatus::Completed
    );

    let back = state.reset_timer(short.id).unwrap();
    assert_eq!(back.status, TimerStatus::Paused);
    assert_eq!(back.remaining, 2);
    assert!(back.completed_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn bulk_operations_apply_per_category() {
    let dir = TempDir::new().unwrap();
    let state = new_state(&dir);

    let done = state.create_timer("Warmup".into(), 1, "Work".into()).unwrap();
    let short = state.create_timer("Short".into(), 3, "Work".into()).unwrap();
    let long = state.create_timer("Long".into(), 10, "Work".into()).unwrap();
    let other = state.create_timer("Other".into(), 8, "Home".into()).unwrap();

    // Run one category member to completion first.
    let mut completions = state.notifier.subscribe();
    state.start_timer(done.id).unwrap();
    sleep(ms(1_050)).await;
    assert_eq!(state.get_timer(done.id).unwrap().status, TimerStatus::Completed);
    completions.changed().await.unwrap();
    completions.borrow_and_update();

    // Start-all moves the paused members and leaves the completed one.
    let started = state.start_all("Work").unwrap();
    assert_eq!(started.applied, vec![short.id, long.id]);
    assert_eq!(started.skipped, vec![done.id]);
    assert!(started.errors.is_empty());

    // Second start-all skips members already running too.
    let repeated = state.start_all("Work").unwrap();
    assert!(repeated.applied.is_empty());
    assert_eq!(repeated.skipped, vec![done.id, short.id, long.id]);

    sleep(ms(1_050)).await;

    let paused = state.pause_all("Work").unwrap();
    assert_eq!(paused.applied, vec![short.id, long.id]);
    assert_eq!(paused.skipped, vec![done.id]);
    assert_eq!(state.get_timer(short.id).unwrap().remaining, 2);
    assert_eq!(state.get_timer(long.id).unwrap().remaining, 9);
    assert_eq!(state.get_timer(done.id).unwrap().status, TimerStatus::Completed);

    // The other category never moved.
    let untouched = state.get_timer(other.id).unwrap();
    assert_eq!(untouched.status, TimerStatus::Paused);
    assert_eq!(untouched.remaining, 8);

    // Reset-all takes everyone, the completed member included, and the
    // completion it already announced is never re-fired.
    let reset = state.reset_all("Work").unwrap();
    assert_eq!(reset.applied, vec![done.id, short.id, long.id]);
    assert_eq!(state.get_timer(short.id).unwrap().remaining, 3);
    assert_eq!(state.get_timer(long.id).unwrap().remaining, 10);
    let revived = state.get_timer(done.id).unwrap();
    assert_eq!(revived.status, TimerStatus::Paused);
    assert_eq!(revived.remaining, 1);
    assert!(revived.completed_at.is_none());
    assert!(!completions.has_changed().unwrap());

    // Unknown category is an empty, error-free outcome.
    let empty = state.start_all("Nowhere").unwrap();
    assert!(empty.applied.is_empty() && empty.skipped.is_empty() && empty.errors.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_tick_persist_is_retried_until_flushed() {
    let dir = TempDir::new().unwrap();
    let sub = dir.path().join("store");
    std::fs::create_dir_all(&sub).unwrap();
    let state =
        AppState::new(JsonStore::new(sub.join("timers.json")), 0, "127.0.0.1".into()).unwrap();
    tokio::spawn(persist_retry_task(Arc::clone(&state)));

    let timer = state.create_timer("Flaky".into(), 2, "Work".into()).unwrap();
    state.start_timer(timer.id).unwrap();
    sleep(ms(1_050)).await;

    // Break the store: the completion tick cannot write through.
    std::fs::remove_dir_all(&sub).unwrap();
    sleep(ms(1_100)).await;

    let done = state.get_timer(timer.id).unwrap();
    assert_eq!(done.status, TimerStatus::Completed);
    assert!(state.is_dirty());

    // Once the store recovers, the retry task flushes the snapshot.
    std::fs::create_dir_all(&sub).unwrap();
    sleep(ms(5_100)).await;

    assert!(!state.is_dirty());
    let raw = std::fs::read_to_string(sub.join("timers.json")).unwrap();
    assert!(raw.contains("\"Completed\""));

    // The same pass reaped the finished ticker's handle.
    assert!(!state.scheduler.stop(timer.id).unwrap());
}

#[tokio::test(start_paused = true)]
async fn command_rolls_back_when_the_store_rejects_the_write() {
    let dir = TempDir::new().unwrap();
    let sub = dir.path().join("store");
    std::fs::create_dir_all(&sub).unwrap();
    let state =
        AppState::new(JsonStore::new(sub.join("timers.json")), 0, "127.0.0.1".into()).unwrap();

    let timer = state.create_timer("Rollback".into(), 5, "Work".into()).unwrap();

    // Break the store, then try to start: the in-memory transition must
    // be rolled back and no ticker may survive.
    std::fs::remove_dir_all(&sub).unwrap();
    let err = state.start_timer(timer.id).unwrap_err();
    assert!(matches!(err, EngineError::Persistence(_)));

    let record = state.get_timer(timer.id).unwrap();
    assert_eq!(record.status, TimerStatus::Paused);
    assert_eq!(record.remaining, 5);
    assert!(!state.scheduler.is_ticking(timer.id).unwrap());

    // Creation is rolled back the same way.
    let err = state
        .create_timer("Ghost".into(), 5, "Work".into())
        .unwrap_err();
    assert!(matches!(err, EngineError::Persistence(_)));
    assert_eq!(state.counts().unwrap().total, 1);
}

#[test]
fn store_reload_rehydrates_remaining_time() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("timers.json");

    {
        let state = AppState::new(JsonStore::new(&path), 0, "127.0.0.1".into()).unwrap();
        state.create_timer("One".into(), 60, "Work".into()).unwrap();
        state.create_timer("Two".into(), 30, "Home".into()).unwrap();
    }

    let reloaded = AppState::new(JsonStore::new(&path), 0, "127.0.0.1".into()).unwrap();
    let grouped = reloaded.grouped_timers().unwrap();
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped["Work"][0].remaining, 60);
    assert_eq!(grouped["Home"][0].remaining, 30);
    assert!(grouped.values().flatten().all(|t| t.status == TimerStatus::Paused));
}

#[test]
fn stored_running_timer_loads_paused_at_full_duration() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("timers.json");
    std::fs::write(
        &path,
        r#"[
            {"id": 1, "name": "Left running", "duration": 40, "category": "Work", "status": "Running"},
            {"id": 2, "name": "Done", "duration": 20, "category": "Work", "status": "Completed",
             "completedAt": "2026-08-01T10:00:00Z"}
        ]"#,
    )
    .unwrap();

    let state = AppState::new(JsonStore::new(&path), 0, "127.0.0.1".into()).unwrap();

    let orphaned = state.get_timer(1).unwrap();
    assert_eq!(orphaned.status, TimerStatus::Paused);
    assert_eq!(orphaned.remaining, 40);

    let done = state.get_timer(2).unwrap();
    assert_eq!(done.status, TimerStatus::Completed);
    assert_eq!(done.remaining, 0);

    let history = state.completed_timers().unwrap();
    assert_eq!(history["Work"].len(), 1);
    assert_eq!(history["Work"][0].id, 2);
}

#[test]
fn unknown_ids_and_invalid_records_are_reported() {
    let dir = TempDir::new().unwrap();
    let state = new_state(&dir);

    assert!(matches!(
        state.pause_timer(999).unwrap_err(),
        EngineError::NotFound(999)
    ));
    assert!(matches!(
        state.create_timer("No time".into(), 0, "Work".into()).unwrap_err(),
        EngineError::InvalidRecord(_)
    ));
    assert!(matches!(
        state.create_timer("".into(), 10, "Work".into()).unwrap_err(),
        EngineError::InvalidRecord(_)
    ));
    // Nothing invalid ever entered the registry.
    assert_eq!(state.counts().unwrap().total, 0);
}
