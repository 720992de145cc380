//! Signal handling for graceful shutdown

use futures::stream::StreamExt;
use signal_hook::consts::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook_tokio::Signals;
use tracing::info;

/// Resolve once a shutdown signal (SIGTERM, SIGINT, SIGQUIT) arrives.
pub async fn shutdown_signal() {
    let mut signals =
        Signals::new([SIGTERM, SIGINT, SIGQUIT]).expect("Failed to create signal handler");

    if let Some(signal) = signals.next().await {
        info!("Received signal {signal}, shutting down");
    }
}
