//! `GET /health` — liveness plus a database round-trip.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::models::response::HealthResponse;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = if state.health.is_healthy().await { "up" } else { "down" };

    Json(HealthResponse {
        status: "ok",
        version: state.version.clone(),
        timestamp: Utc::now().timestamp(),
        database,
    })
}
