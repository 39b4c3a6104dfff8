use axum::{extract::State, Json};
use tracing::{debug, instrument};

use crate::api::AppState;

/// Readiness probe: true as soon as the server answers
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is serving requests", body = bool)
    ),
    tag = "health"
)]
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<bool> {
    debug!("Health check requested");
    Json(state.health.readiness())
}

/// Liveness probe: whether Redis answers a ping
#[utoipa::path(
    get,
    path = "/liveness",
    responses(
        (status = 200, description = "Result of the Redis ping", body = bool)
    ),
    tag = "health"
)]
#[instrument(skip(state))]
pub async fn liveness(State(state): State<AppState>) -> Json<bool> {
    Json(state.health.liveness().await)
}
