//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{error, info};

use super::responses::{
    BulkResponse, CreateTimerRequest, GroupedResponse, HealthResponse, StatusResponse,
    TimerResponse,
};
use crate::error::EngineError;
use crate::state::AppState;

/// Map engine errors onto HTTP status codes.
fn status_for(error: &EngineError) -> StatusCode {
    match error {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidRecord(_) => StatusCode::BAD_REQUEST,
        EngineError::Persistence(_) | EngineError::Poisoned(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn reject(context: &str, error: EngineError) -> (StatusCode, String) {
    error!(%error, "{context} failed");
    (status_for(&error), error.to_string())
}

/// Handle POST /timers - create a new timer
pub async fn create_timer_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTimerRequest>,
) -> Result<(StatusCode, Json<TimerResponse>), (StatusCode, String)> {
    match state.create_timer(request.name, request.duration, request.category) {
        Ok(timer) => {
            info!(id = timer.id, "timer created via API");
            Ok((
                StatusCode::CREATED,
                Json(TimerResponse::ok("timer created", timer)),
            ))
        }
        Err(e) => Err(reject("create timer", e)),
    }
}

/// Handle POST /timers/:id/start
pub async fn start_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<TimerResponse>, (StatusCode, String)> {
    match state.start_timer(id) {
        Ok(timer) => Ok(Json(TimerResponse::ok("timer started", timer))),
        Err(e) => Err(reject("start timer", e)),
    }
}

/// Handle POST /timers/:id/pause
pub async fn pause_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<TimerResponse>, (StatusCode, String)> {
    match state.pause_timer(id) {
        Ok(timer) => Ok(Json(TimerResponse::ok("timer paused", timer))),
        Err(e) => Err(reject("pause timer", e)),
    }
}

/// Handle POST /timers/:id/reset
pub async fn reset_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<TimerResponse>, (StatusCode, String)> {
    match state.reset_timer(id) {
        Ok(timer) => Ok(Json(TimerResponse::ok("timer reset", timer))),
        Err(e) => Err(reject("reset timer", e)),
    }
}

/// Handle GET /timers/:id
pub async fn get_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<TimerResponse>, (StatusCode, String)> {
    match state.get_timer(id) {
        Ok(timer) => Ok(Json(TimerResponse::ok("timer", timer))),
        Err(e) => Err(reject("get timer", e)),
    }
}

/// Handle POST /categories/:category/start-all
pub async fn start_all_handler(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> Result<Json<BulkResponse>, (StatusCode, String)> {
    match state.start_all(&category) {
        Ok(outcome) => Ok(Json(BulkResponse::from_outcome("start-all", outcome))),
        Err(e) => Err(reject("start-all", e)),
    }
}

/// Handle POST /categories/:category/pause-all
pub async fn pause_all_handler(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> Result<Json<BulkResponse>, (StatusCode, String)> {
    match state.pause_all(&category) {
        Ok(outcome) => Ok(Json(BulkResponse::from_outcome("pause-all", outcome))),
        Err(e) => Err(reject("pause-all", e)),
    }
}

/// Handle POST /categories/:category/reset-all
pub async fn reset_all_handler(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> Result<Json<BulkResponse>, (StatusCode, String)> {
    match state.reset_all(&category) {
        Ok(outcome) => Ok(Json(BulkResponse::from_outcome("reset-all", outcome))),
        Err(e) => Err(reject("reset-all", e)),
    }
}

/// Handle GET /timers - all timers grouped by category
pub async fn list_timers_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GroupedResponse>, (StatusCode, String)> {
    match state.grouped_timers() {
        Ok(categories) => Ok(Json(GroupedResponse { categories })),
        Err(e) => Err(reject("list timers", e)),
    }
}

/// Handle GET /history - completed timers grouped by category
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GroupedResponse>, (StatusCode, String)> {
    match state.completed_timers() {
        Ok(categories) => Ok(Json(GroupedResponse { categories })),
        Err(e) => Err(reject("history", e)),
    }
}

/// Handle GET /status - engine status snapshot
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let counts = state.counts().map_err(|e| reject("status", e))?;
    let active_tickers = state
        .scheduler
        .active()
        .map_err(|e| reject("status", e))?;

    Ok(Json(StatusResponse {
        counts,
        active_tickers,
        last_completion: state.last_completion(),
        store_dirty: state.is_dirty(),
        uptime: state.uptime(),
        port: state.port,
        host: state.host.clone(),
    }))
}

/// Handle GET /health - health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
