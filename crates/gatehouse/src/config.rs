//! Configuration management for the gatehouse.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use flashnotes_common::constants::{
    DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, DEFAULT_CHALLENGE_LENGTH, DEFAULT_LISTEN_ADDR,
    DEFAULT_NOISE_DOTS, DEFAULT_REDIS_URL, DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT, DEV_SECRET_KEY,
    OTP_SWEEP_INTERVAL_SECS, OTP_VALIDITY_SECS, RESET_TOKEN_MAX_AGE_SECS, SESSION_COOKIE,
    SESSION_SWEEP_INTERVAL_SECS, SESSION_TTL_SECS,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Key for signing tokens
    #[serde(default = "default_secret_key")]
    pub secret_key: String,

    #[serde(default)]
    pub captcha: CaptchaConfig,

    #[serde(default)]
    pub token: TokenConfig,

    #[serde(default)]
    pub otp: OtpConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub mail: MailConfig,
}

/// CAPTCHA-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    /// Characters per challenge
    #[serde(default = "default_text_length")]
    pub text_length: usize,

    /// Canvas width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Canvas height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Noise pixels scattered over each image
    #[serde(default = "default_noise_dots")]
    pub noise_dots: u32,

    /// Path to font file for CAPTCHA text
    #[serde(default = "default_font_path")]
    pub font_path: String,

    /// Clear the stored challenge once it has been solved
    #[serde(default)]
    pub consume_on_success: bool,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            text_length: default_text_length(),
            width: default_width(),
            height: default_height(),
            noise_dots: default_noise_dots(),
            font_path: default_font_path(),
            consume_on_success: false,
        }
    }
}

/// Signed token configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Reset link validity in seconds
    #[serde(default = "default_token_max_age")]
    pub max_age_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_token_max_age(),
        }
    }
}

/// OTP configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    /// OTP validity in seconds
    #[serde(default = "default_otp_validity")]
    pub validity_secs: u64,

    /// How often expired OTPs are swept, 0 disables the sweeper
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Return issued OTPs in responses and expose the peek endpoint.
    /// Development only.
    #[serde(default)]
    pub dev_echo: bool,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            validity_secs: default_otp_validity(),
            sweep_interval_secs: default_sweep_interval(),
            dev_echo: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    Redis,
}

/// Session store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_backend")]
    pub backend: SessionBackend,

    /// Redis connection URL (redis backend only)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Session lifetime in seconds, counted from the last write
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// How often idle memory sessions are evicted, 0 disables the sweeper
    #[serde(default = "default_session_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: default_session_backend(),
            redis_url: default_redis_url(),
            ttl_secs: default_session_ttl(),
            sweep_interval_secs: default_session_sweep_interval(),
            cookie_name: default_cookie_name(),
        }
    }
}

/// Outbound mail configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// From address
    #[serde(default = "default_sender")]
    pub sender: String,

    /// Base URL reset links point at
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// SMTP relay, STARTTLS on submission
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// SMTP login. Without one, mail is only logged.
    #[serde(default)]
    pub smtp_username: Option<String>,

    #[serde(default)]
    pub smtp_password: Option<String>,
}

impl MailConfig {
    /// SMTP credentials, if a non-empty username is configured
    pub fn smtp_credentials(&self) -> Option<(&str, &str)> {
        let username = self.smtp_username.as_deref().filter(|u| !u.trim().is_empty())?;
        Some((username, self.smtp_password.as_deref().unwrap_or_default()))
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
            public_base_url: default_public_base_url(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
        }
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_secret_key() -> String { DEV_SECRET_KEY.to_string() }
fn default_text_length() -> usize { DEFAULT_CHALLENGE_LENGTH }
fn default_width() -> u32 { DEFAULT_CANVAS_WIDTH }
fn default_height() -> u32 { DEFAULT_CANVAS_HEIGHT }
fn default_noise_dots() -> u32 { DEFAULT_NOISE_DOTS }
fn default_font_path() -> String { "assets/fonts/DejaVuSans-Bold.ttf".to_string() }
fn default_token_max_age() -> u64 { RESET_TOKEN_MAX_AGE_SECS }
fn default_otp_validity() -> u64 { OTP_VALIDITY_SECS }
fn default_sweep_interval() -> u64 { OTP_SWEEP_INTERVAL_SECS }
fn default_session_backend() -> SessionBackend { SessionBackend::Memory }
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_session_ttl() -> u64 { SESSION_TTL_SECS } // 7 days
fn default_session_sweep_interval() -> u64 { SESSION_SWEEP_INTERVAL_SECS }
fn default_cookie_name() -> String { SESSION_COOKIE.to_string() }
fn default_sender() -> String { "Flash Notes <noreply@flashnotes.local>".to_string() }
fn default_public_base_url() -> String { "http://127.0.0.1:8888".to_string() }
fn default_smtp_host() -> String { DEFAULT_SMTP_HOST.to_string() }
fn default_smtp_port() -> u16 { DEFAULT_SMTP_PORT }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(ref redis_url) = args.redis_url {
            config.session.redis_url = redis_url.clone();
        }
        if let Some(ref secret) = args.secret_key {
            config.secret_key = secret.clone();
        }
        if let Some(ref username) = args.smtp_username {
            config.mail.smtp_username = Some(username.clone());
        }
        if let Some(ref password) = args.smtp_password {
            config.mail.smtp_password = Some(password.clone());
        }

        config.validate()?;

        if config.secret_key == DEV_SECRET_KEY {
            tracing::warn!("Using development secret key, set GATEHOUSE_SECRET in production");
        }

        Ok(config)
    }

    /// Reject settings that would make challenges unusable
    pub fn validate(&self) -> Result<()> {
        if self.secret_key.is_empty() {
            anyhow::bail!("secret_key must not be empty");
        }
        if self.captcha.text_length == 0 {
            anyhow::bail!("captcha text_length must be at least 1");
        }
        if self.captcha.width == 0 || self.captcha.height == 0 {
            anyhow::bail!(
                "captcha canvas must be non-empty (got {}x{})",
                self.captcha.width,
                self.captcha.height
            );
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            secret_key: default_secret_key(),
            captcha: CaptchaConfig::default(),
            token: TokenConfig::default(),
            otp: OtpConfig::default(),
            session: SessionConfig::default(),
            mail: MailConfig::default(),
        }
    }
}
