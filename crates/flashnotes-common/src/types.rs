//! Wire types returned by the gatehouse endpoints.

use serde::{Deserialize, Serialize};

use crate::error::{ChallengeRejection, OtpRejection};

/// Outcome of a CAPTCHA or OTP verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl VerifyResult {
    pub fn passed() -> Self {
        Self {
            success: true,
            error_message: None,
        }
    }

    pub fn rejected(reason: impl ToString) -> Self {
        Self {
            success: false,
            error_message: Some(reason.to_string()),
        }
    }
}

impl From<Result<(), ChallengeRejection>> for VerifyResult {
    fn from(outcome: Result<(), ChallengeRejection>) -> Self {
        match outcome {
            Ok(()) => Self::passed(),
            Err(rejection) => Self::rejected(rejection),
        }
    }
}

impl From<Result<(), OtpRejection>> for VerifyResult {
    fn from(outcome: Result<(), OtpRejection>) -> Self {
        match outcome {
            Ok(()) => Self::passed(),
            Err(rejection) => Self::rejected(rejection),
        }
    }
}

/// Response to an OTP request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpDispatch {
    /// Whether the OTP was handed to the mailer
    pub sent: bool,

    /// Seconds the OTP stays valid
    pub valid_for_secs: u64,

    /// The OTP itself, only in development mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_otp: Option<String>,
}

/// Response to a password reset request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetRequested {
    /// Seconds the emailed link stays valid
    pub valid_for_secs: u64,
}

/// A reset link that verified successfully
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetLink {
    /// Account email carried by the token
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_result_serialization() {
        let passed = serde_json::to_value(VerifyResult::passed()).unwrap();
        assert_eq!(passed, serde_json::json!({ "success": true }));

        let rejected: VerifyResult = Err(ChallengeRejection::Mismatch).into();
        assert!(!rejected.success);
        assert_eq!(
            rejected.error_message.as_deref(),
            Some("Incorrect CAPTCHA. Try again.")
        );
    }

    #[test]
    fn test_dev_otp_hidden_when_absent() {
        let dispatch = OtpDispatch {
            sent: true,
            valid_for_secs: 300,
            dev_otp: None,
        };
        let json = serde_json::to_string(&dispatch).unwrap();
        assert!(!json.contains("dev_otp"));
    }
}
