//! Shared constants for Flash Notes components.

/// Default gatehouse HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8888";

/// Default Redis connection URL (only used by the redis session backend)
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Development signing key, used when no secret is configured
pub const DEV_SECRET_KEY: &str = "dev_secret_please_change";

/// Characters a challenge is drawn from: 26 upper, 26 lower, 10 digits
pub const CHALLENGE_ALPHABET: &[u8; 62] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Default challenge text length
pub const DEFAULT_CHALLENGE_LENGTH: usize = 6;

/// Default challenge canvas size in pixels
pub const DEFAULT_CANVAS_WIDTH: u32 = 160;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 60;

/// Single-pixel noise dots scattered over every challenge image
pub const DEFAULT_NOISE_DOTS: u32 = 150;

/// Reset token validity (5 minutes)
pub const RESET_TOKEN_MAX_AGE_SECS: u64 = 300;

/// OTP validity (5 minutes)
pub const OTP_VALIDITY_SECS: u64 = 300;

/// OTP sweep interval
pub const OTP_SWEEP_INTERVAL_SECS: u64 = 60;

/// Browser session lifetime (7 days)
pub const SESSION_TTL_SECS: u64 = 604_800;

/// Idle memory session sweep interval
pub const SESSION_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default SMTP relay and submission port
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Session cookie name
pub const SESSION_COOKIE: &str = "flashnotes_session";

/// Token salts. A token minted for one purpose never verifies for another.
pub mod salts {
    pub const RESET_PASSWORD: &str = "reset-password";
}

/// Session-scoped keys
pub mod session_keys {
    /// Text of the most recently served challenge
    pub const CAPTCHA_TEXT: &str = "captcha_text";
}

/// Redis key prefixes
pub mod redis_keys {
    /// Session hash: session:{session_id}
    pub const SESSION_PREFIX: &str = "session:";
}
