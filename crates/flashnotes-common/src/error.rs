//! Rejections and error types for Flash Notes components.
//!
//! Rejections are ordinary verification outcomes and carry the message shown
//! to the user. `GatehouseError` is for failures of the service itself.

use thiserror::Error;

/// Why a submitted CAPTCHA was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChallengeRejection {
    /// No challenge stored for the session (never requested, or session gone)
    #[error("No CAPTCHA was requested for this session")]
    Absent,

    #[error("Incorrect CAPTCHA. Try again.")]
    Mismatch,
}

/// Why a signed token was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    /// Signature is valid but the token is older than its max age
    #[error("Link expired. Please request a new one.")]
    Expired,

    /// Malformed token, tampered payload, wrong salt or wrong key
    #[error("Invalid link")]
    Invalid,
}

/// Why a submitted OTP was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpRejection {
    #[error("No OTP was issued for this number")]
    Absent,

    /// The record was found expired and has been removed
    #[error("OTP expired")]
    Expired,

    #[error("Invalid OTP")]
    Mismatch,
}

/// Errors surfaced by the gatehouse service
#[derive(Debug, Error)]
pub enum GatehouseError {
    /// Session store (redis) error
    #[error("Session store error: {0}")]
    Session(String),

    /// Challenge rendering error
    #[error("CAPTCHA error: {0}")]
    Captcha(String),

    /// Outbound mail error
    #[error("Mail error: {0}")]
    Mail(String),

    /// Invalid input/request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatehouseError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Session(_) => 503,
            Self::Captcha(_) => 500,
            Self::Mail(_) => 502,
            Self::InvalidInput(_) => 400,
            Self::NotFound(_) => 404,
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Session(_) | Self::Mail(_))
    }
}
