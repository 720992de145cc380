//! HTTP API module
//!
//! The command and view surface of the engine. Handlers only translate
//! between HTTP and `AppState`; all state machine logic lives behind
//! the state module.

pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timers", post(create_timer_handler).get(list_timers_handler))
        .route("/timers/:id", get(get_timer_handler))
        .route("/timers/:id/start", post(start_timer_handler))
        .route("/timers/:id/pause", post(pause_timer_handler))
        .route("/timers/:id/reset", post(reset_timer_handler))
        .route("/categories/:category/start-all", post(start_all_handler))
        .route("/categories/:category/pause-all", post(pause_all_handler))
        .route("/categories/:category/reset-all", post(reset_all_handler))
        .route("/history", get(history_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
