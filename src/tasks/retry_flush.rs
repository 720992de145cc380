//! Persistence retry and scheduler housekeeping task

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::state::AppState;

const RETRY_PERIOD: Duration = Duration::from_secs(5);

/// Background task that re-attempts durable writes that failed on the
/// tick path. Tick-driven persistence is best-effort; this loop keeps
/// retrying until the store accepts a write, so memory and disk cannot
/// diverge for longer than the retry period once the store recovers.
/// Each pass also reaps the handles of tickers that completed on their
/// own.
pub async fn persist_retry_task(state: Arc<AppState>) {
    info!("starting persistence retry task");

    let mut ticks = interval(RETRY_PERIOD);

    loop {
        ticks.tick().await;

        match state.scheduler.reap() {
            Ok(0) => {}
            Ok(reaped) => debug!(reaped, "dropped finished ticker handles"),
            Err(e) => warn!(error = %e, "ticker reap failed"),
        }

        if !state.is_dirty() {
            continue;
        }

        match state.persist() {
            Ok(()) => info!("deferred timer state flushed to store"),
            Err(e) => warn!(error = %e, "store still unavailable, will retry"),
        }
    }
}
