//! Per-timer countdown task
//!
//! One of these runs for every timer in the `Running` state. Each task
//! owns nothing but the timer's id; every mutation goes through the
//! registry so a concurrent command can always win the race under the
//! lock.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace};

use crate::state::{AppState, TickOutcome};

/// Fixed countdown cadence.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Tick the timer once per second until it completes or a command
/// halts it.
pub async fn countdown_task(state: Arc<AppState>, id: u64) {
    debug!(id, "countdown task started");

    let mut ticks = interval(TICK_PERIOD);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick resolves immediately; the decrements
    // start one period from now.
    ticks.tick().await;

    loop {
        ticks.tick().await;
        match state.apply_tick(id) {
            Ok(TickOutcome::Ticked { remaining }) => {
                trace!(id, remaining, "tick");
            }
            Ok(TickOutcome::Finished(event)) => {
                info!(id, name = %event.name, "timer completed");
                break;
            }
            Ok(TickOutcome::Halted) => {
                debug!(id, "timer no longer running, countdown task exiting");
                break;
            }
            Err(e) => {
                error!(id, error = %e, "countdown task stopping");
                break;
            }
        }
    }
}
