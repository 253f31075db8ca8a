//! Application state and shared resources.

use anyhow::Result;
use std::sync::Arc;

use crate::captcha::{CaptchaGenerator, CaptchaVerifier};
use crate::config::{AppConfig, SessionBackend};
use crate::mail::Mailer;
use crate::otp::OtpStore;
use crate::session::SessionStore;
use crate::token::TokenSigner;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Per-browser session state
    pub sessions: SessionStore,

    /// CAPTCHA generator
    pub captcha_generator: Arc<CaptchaGenerator>,

    /// CAPTCHA verifier
    pub captcha_verifier: Arc<CaptchaVerifier>,

    /// Reset token signer
    pub tokens: Arc<TokenSigner>,

    /// Live OTPs
    pub otps: Arc<OtpStore>,

    /// Outbound mail
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Create new application state, connecting the session backend
    pub async fn new(config: AppConfig, otps: Arc<OtpStore>, mailer: Arc<dyn Mailer>) -> Result<Self> {
        let sessions = match config.session.backend {
            SessionBackend::Memory => SessionStore::memory(config.session.ttl_secs),
            SessionBackend::Redis => {
                SessionStore::connect_redis(&config.session.redis_url, config.session.ttl_secs).await?
            }
        };
        let captcha_generator = Arc::new(CaptchaGenerator::new(&config.captcha));

        Ok(Self::from_parts(config, sessions, captcha_generator, otps, mailer))
    }

    /// Assemble state from already-built services
    pub fn from_parts(
        config: AppConfig,
        sessions: SessionStore,
        captcha_generator: Arc<CaptchaGenerator>,
        otps: Arc<OtpStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let captcha_verifier = Arc::new(CaptchaVerifier::new(sessions.clone()));
        let tokens = Arc::new(TokenSigner::new(config.secret_key.as_bytes()));

        Self {
            config: Arc::new(config),
            sessions,
            captcha_generator,
            captcha_verifier,
            tokens,
            otps,
            mailer,
        }
    }
}
