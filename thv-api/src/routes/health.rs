//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use thv_services::ServiceHealth;

use crate::AppState;

/// Service health; 503 once the background loops are stopped
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<ServiceHealth>) {
    let health = state.service.health();
    let code = if health.running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(health))
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
