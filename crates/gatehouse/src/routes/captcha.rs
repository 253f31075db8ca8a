//! CAPTCHA generation and verification endpoints.

use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use flashnotes_common::{ChallengeRejection, GatehouseError, VerifyResult};

use super::{ApiError, session_error, session_id, session_or_new};
use crate::state::AppState;

/// Serve a new challenge image and remember its answer in the session
pub async fn get_challenge(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (session, set_cookie) = session_or_new(&headers, &state.config.session)?;

    // ThreadRng must not live across an await
    let challenge = {
        let mut rng = rand::rng();
        state.captcha_generator.generate(&mut rng)
    }
    .map_err(|e| GatehouseError::Captcha(format!("{:#}", e)))?;

    state
        .captcha_verifier
        .store_challenge(&session, &challenge.text)
        .await
        .map_err(session_error)?;

    tracing::debug!(session = %session, "Served CAPTCHA challenge");

    let mut response = (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        challenge.png,
    )
        .into_response();
    if let Some(cookie) = set_cookie {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }

    Ok(response)
}

#[derive(Deserialize)]
pub struct VerifyForm {
    #[serde(default)]
    captcha: String,
}

/// Verify a CAPTCHA response
pub async fn verify_challenge(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<VerifyForm>,
) -> Result<Json<VerifyResult>, ApiError> {
    let session = session_id(&headers, &state.config.session.cookie_name);
    let outcome = gate(&state, session.as_deref(), &form.captcha).await?;
    Ok(Json(outcome.into()))
}

/// Check a submitted CAPTCHA for the request's session. Clears the answer
/// after a pass when `consume_on_success` is set.
pub(crate) async fn gate(
    state: &AppState,
    session: Option<&str>,
    submitted: &str,
) -> Result<Result<(), ChallengeRejection>, ApiError> {
    let Some(session) = session else {
        return Ok(Err(ChallengeRejection::Absent));
    };

    let verifier = &state.captcha_verifier;
    let outcome = verifier
        .check_challenge(session, submitted.trim())
        .await
        .map_err(session_error)?;

    if outcome.is_ok() && state.config.captcha.consume_on_success {
        verifier.clear_challenge(session).await.map_err(session_error)?;
    }

    Ok(outcome)
}
