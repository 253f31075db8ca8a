//! Password reset: email a signed link, then open it.
//!
//! Account lookup and the password update itself belong to the notes
//! application; these handlers only mint and check the link.

use axum::{
    Form, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use flashnotes_common::constants::salts::RESET_PASSWORD;
use flashnotes_common::{GatehouseError, ResetLink, ResetRequested, TokenRejection, VerifyResult};

use super::{ApiError, required_email};
use crate::mail::reset_password_mail;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ForgotForm {
    #[serde(default)]
    email: String,
}

/// Mint a reset token for `email` and mail the link
pub async fn request_reset(
    State(state): State<AppState>,
    Form(form): Form<ForgotForm>,
) -> Result<(StatusCode, Json<ResetRequested>), ApiError> {
    let email = required_email(&form.email)?;

    let token = state.tokens.issue(email, RESET_PASSWORD);
    let max_age = state.config.token.max_age_secs;
    let mail = reset_password_mail(
        &state.config.mail.sender,
        email,
        &state.config.mail.public_base_url,
        &token,
        max_age,
    );

    state
        .mailer
        .send(&mail)
        .await
        .map_err(|e| GatehouseError::Mail(format!("{:#}", e)))?;

    tracing::info!(purpose = RESET_PASSWORD, "Reset link sent");

    Ok((
        StatusCode::ACCEPTED,
        Json(ResetRequested {
            valid_for_secs: max_age,
        }),
    ))
}

/// Open a reset link
///
/// Returns:
/// - 200: Valid link, with the account email
/// - 410: Signature fine but the link is too old
/// - 400: Tampered, malformed, or minted for another purpose
pub async fn open_reset_link(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ResetLink>, (StatusCode, Json<VerifyResult>)> {
    match state
        .tokens
        .verify(&token, RESET_PASSWORD, state.config.token.max_age_secs)
    {
        Ok(email) => Ok(Json(ResetLink { email })),
        Err(rejection) => {
            let status = match rejection {
                TokenRejection::Expired => StatusCode::GONE,
                TokenRejection::Invalid => StatusCode::BAD_REQUEST,
            };
            tracing::debug!(?rejection, "Reset link refused");
            Err((status, Json(VerifyResult::rejected(rejection))))
        }
    }
}
