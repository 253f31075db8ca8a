//! Mobile OTP endpoints.

use axum::{
    Form, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use flashnotes_common::{GatehouseError, OtpDispatch, VerifyResult};

use super::{ApiError, captcha, required, required_email, session_id};
use crate::mail::otp_mail;
use crate::otp::generate_secret;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SendOtpForm {
    #[serde(default)]
    mobile: String,
    /// Address registered for the number; the code is delivered there
    #[serde(default)]
    email: String,
    #[serde(default)]
    captcha: String,
}

/// Issue an OTP for a mobile number, behind the CAPTCHA
pub async fn send_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SendOtpForm>,
) -> Result<Response, ApiError> {
    let mobile = required(&form.mobile, "mobile")?;
    let email = required_email(&form.email)?;

    let session = session_id(&headers, &state.config.session.cookie_name);
    if let Err(rejection) = captcha::gate(&state, session.as_deref(), &form.captcha).await? {
        return Ok((StatusCode::FORBIDDEN, Json(VerifyResult::rejected(rejection))).into_response());
    }

    let otp = generate_secret(&mut rand::rng());
    let validity = state.config.otp.validity_secs;
    state.otps.issue(mobile, &otp, validity);

    let mail = otp_mail(&state.config.mail.sender, email, &otp, validity);
    let sent = match state.mailer.send(&mail).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(identifier = %mobile, error = %e, "Failed to deliver OTP");
            false
        }
    };

    Ok(Json(OtpDispatch {
        sent,
        valid_for_secs: validity,
        dev_otp: state.config.otp.dev_echo.then_some(otp),
    })
    .into_response())
}

#[derive(Deserialize)]
pub struct VerifyOtpForm {
    #[serde(default)]
    mobile: String,
    #[serde(default)]
    otp: String,
}

/// Redeem an OTP
pub async fn verify_otp(
    State(state): State<AppState>,
    Form(form): Form<VerifyOtpForm>,
) -> Result<Json<VerifyResult>, ApiError> {
    let mobile = required(&form.mobile, "mobile")?;
    let otp = required(&form.otp, "otp")?;

    Ok(Json(state.otps.check(mobile, otp).into()))
}

#[derive(Serialize)]
pub struct PeekResponse {
    mobile: String,
    otp: String,
}

/// Show the live OTP for a number (development only)
pub async fn peek_otp(
    State(state): State<AppState>,
    Path(mobile): Path<String>,
) -> Result<Json<PeekResponse>, ApiError> {
    if !state.config.otp.dev_echo {
        return Err(GatehouseError::NotFound("no such route".to_string()).into());
    }

    let otp = state
        .otps
        .peek(&mobile)
        .ok_or_else(|| GatehouseError::NotFound(format!("no OTP for {}", mobile)))?;

    Ok(Json(PeekResponse { mobile, otp }))
}
