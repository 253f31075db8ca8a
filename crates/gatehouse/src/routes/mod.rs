//! HTTP route handlers for the gatehouse.

use axum::{
    Json, Router,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use flashnotes_common::GatehouseError;

use crate::config::SessionConfig;
use crate::session::new_session_id;
use crate::state::AppState;

mod captcha;
mod health;
mod otp;
mod password;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/metrics", get(health::metrics))

        // CAPTCHA endpoints
        .route("/captcha", get(captcha::get_challenge))
        .route("/captcha/verify", post(captcha::verify_challenge))

        // Password reset
        .route("/forgot", post(password::request_reset))
        .route("/reset_password/{token}", get(password::open_reset_link))

        // Mobile OTP
        .route("/send_otp", post(otp::send_otp))
        .route("/verify_otp", post(otp::verify_otp))
        .route("/otp/{mobile}", get(otp::peek_otp))

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error returned by handlers, rendered as `{"error": ...}`
pub struct ApiError(GatehouseError);

impl From<GatehouseError> for ApiError {
    fn from(err: GatehouseError) -> Self {
        Self(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(GatehouseError::Internal(format!("{:#}", err)))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self.0, retryable = self.0.is_retryable(), "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Session-store failures become 503s rather than generic 500s
pub(crate) fn session_error(err: anyhow::Error) -> ApiError {
    ApiError(GatehouseError::Session(format!("{:#}", err)))
}

/// Trimmed form field, or 400 if it is empty
pub(crate) fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(GatehouseError::InvalidInput(format!("{} is required", field)).into());
    }
    Ok(value)
}

/// Trimmed email form field; 400 if empty or without an `@`
pub(crate) fn required_email(value: &str) -> Result<&str, ApiError> {
    let email = required(value, "email")?;
    if !email.contains('@') {
        return Err(GatehouseError::InvalidInput("email address is malformed".to_string()).into());
    }
    Ok(email)
}

/// Session ID from the request's cookies, if any
pub(crate) fn session_id(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Existing session ID, or a new one plus the cookie that establishes it
pub(crate) fn session_or_new(
    headers: &HeaderMap,
    config: &SessionConfig,
) -> Result<(String, Option<HeaderValue>), ApiError> {
    if let Some(id) = session_id(headers, &config.cookie_name) {
        return Ok((id, None));
    }

    let id = new_session_id();
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.cookie_name, id, config.ttl_secs
    );
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|e| GatehouseError::Internal(format!("bad session cookie: {}", e)))?;

    tracing::debug!(session = %id, "New session");
    Ok((id, Some(cookie)))
}
