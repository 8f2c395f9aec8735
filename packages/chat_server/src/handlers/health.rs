use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;
use crate::metrics;

/// How long a delivery failure keeps `/health` degraded
const FAILURE_WINDOW: std::time::Duration = std::time::Duration::from_secs(60);

/// Health check endpoint - returns server status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.hub.registry();
    let online_users = registry.user_count().await as u64;
    let connections = registry.connection_count().await as u64;
    let snapshot = state.metrics.snapshot();

    let status = if state.metrics.failed_within(FAILURE_WINDOW) {
        "degraded"
    } else {
        "healthy"
    };

    Json(metrics::HealthStatus {
        status: status.to_string(),
        online_users,
        connections,
        uptime_secs: snapshot.uptime_secs,
    })
}

/// Metrics endpoint - returns detailed server metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}
