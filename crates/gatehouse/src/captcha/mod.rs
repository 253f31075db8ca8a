//! CAPTCHA generation and verification.
//!
//! Text challenges from a 62-symbol alphabet, rendered to a noisy PNG and
//! checked case-insensitively against the copy kept in the caller's session.

mod generator;
mod glyphs;
mod verifier;

pub use generator::CaptchaGenerator;
pub use glyphs::GlyphSet;
pub use verifier::CaptchaVerifier;
