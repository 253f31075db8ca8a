//! Health check endpoints.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    session_backend: &'static str,
}

/// Readiness check (is the session store reachable?)
pub async fn ready_check(
    State(state): State<AppState>,
) -> Result<Json<ReadyResponse>, StatusCode> {
    if state.sessions.ping().await {
        Ok(Json(ReadyResponse {
            status: "ready",
            session_backend: state.sessions.backend_name(),
        }))
    } else {
        // Return 503 if not ready
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[derive(Serialize)]
pub struct MetricsResponse {
    live_otps: usize,
    live_sessions: Option<usize>,
    session_backend: &'static str,
}

/// Metrics endpoint (for monitoring)
pub async fn metrics(
    State(state): State<AppState>,
) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        live_otps: state.otps.len(),
        live_sessions: state.sessions.live_sessions(),
        session_backend: state.sessions.backend_name(),
    })
}
