//! Timer Rack - A state-managed HTTP server for categorized countdown timers
//!
//! This is the main entry point for the timer-rack daemon.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use timer_rack::{
    api::create_router, config::Config, persistence::JsonStore, state::AppState,
    tasks::persist_retry_task, utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "timer_rack={},tower_http=info",
            config.log_level()
        ))
        .init();

    info!("Starting timer-rack v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, store={}",
        config.host,
        config.port,
        config.data_file.display()
    );

    // Make sure the store directory exists before the first write
    if let Some(dir) = config.data_file.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    // Load the durable store and build the engine state
    let store = JsonStore::new(&config.data_file);
    let state = AppState::new(store, config.port, config.host.clone())?;

    // Start the persistence retry background task
    let retry_state = Arc::clone(&state);
    tokio::spawn(async move {
        persist_retry_task(retry_state).await;
    });

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /timers                             - Create a timer");
    info!("  GET  /timers                             - Timers grouped by category");
    info!("  GET  /timers/:id                         - One timer");
    info!("  POST /timers/:id/start|pause|reset       - Lifecycle commands");
    info!("  POST /categories/:category/start-all     - Start a whole category");
    info!("  POST /categories/:category/pause-all     - Pause a whole category");
    info!("  POST /categories/:category/reset-all     - Reset a whole category");
    info!("  GET  /history                            - Completed timers by category");
    info!("  GET  /status                             - Engine status");
    info!("  GET  /health                             - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    // Stop tickers and flush any deferred write before exiting
    if let Err(e) = state.scheduler.stop_all() {
        error!("Failed to stop tickers: {}", e);
    }
    if state.is_dirty() {
        if let Err(e) = state.persist() {
            error!("Final flush failed, timer state may be stale on disk: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
