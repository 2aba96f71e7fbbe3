//! Liveness and readiness probes.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::EngineStats;

use super::super::AppState;

/// Liveness body: `{ uptime, message, date }`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Process uptime in seconds.
    pub uptime: f64,
    pub message: &'static str,
    pub date: DateTime<Utc>,
}

/// `GET /health` - always 200, whatever the engine is doing.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        uptime: state.started_at.elapsed().as_secs_f64(),
        message: "Ok",
        date: Utc::now(),
    })
}

/// `GET /ready` - 200 once the engine can take work, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<EngineStats>) {
    let stats = state.engine.stats();
    let status = if stats.state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(stats))
}
