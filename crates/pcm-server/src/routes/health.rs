//! Health check endpoint.

use axum::{Json, Router, extract::State, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Active store backend ("mongo" or "memory").
    pub backend: String,
    /// Deployment environment.
    pub environment: String,
    /// Time the check was answered.
    pub timestamp: DateTime<Utc>,
}

/// GET /health - Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        backend: state.backend_name().to_string(),
        environment: state.config().environment.to_string(),
        timestamp: Utc::now(),
    })
}

/// Build health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
