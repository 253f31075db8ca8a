//! Signed, time-limited tokens.
//!
//! A token carries its payload and issue time in the clear and an
//! HMAC-SHA256 over both, keyed by the application secret and a purpose
//! salt. Nothing is stored server-side; verification recomputes the MAC.
//!
//! Token format: b64(payload).b64(issued_at).b64(mac), all URL-safe
//! base64 without padding.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use flashnotes_common::TokenRejection;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies signed tokens
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Sign `payload` for `salt`, stamped with the current time
    pub fn issue(&self, payload: &str, salt: &str) -> String {
        self.issue_at(payload, salt, now())
    }

    /// Sign `payload` for `salt` as if issued at `issued_at` (unix seconds)
    pub fn issue_at(&self, payload: &str, salt: &str, issued_at: i64) -> String {
        let body = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(issued_at.to_be_bytes())
        );

        let mut mac = self.mac(salt);
        mac.update(body.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        tracing::debug!(salt = %salt, issued_at = issued_at, "Issued signed token");

        format!("{}.{}", body, signature)
    }

    /// Recover the payload if `token` was signed for `salt` no more than
    /// `max_age` seconds ago
    pub fn verify(&self, token: &str, salt: &str, max_age: u64) -> Result<String, TokenRejection> {
        self.verify_at(token, salt, max_age, now())
    }

    pub fn verify_at(
        &self,
        token: &str,
        salt: &str,
        max_age: u64,
        now: i64,
    ) -> Result<String, TokenRejection> {
        // body is everything up to the last '.', the MAC covers it verbatim
        let (body, signature) = token.rsplit_once('.').ok_or(TokenRejection::Invalid)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenRejection::Invalid)?;

        let mut mac = self.mac(salt);
        mac.update(body.as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenRejection::Invalid)?;

        let (payload, issued_at) = body.split_once('.').ok_or(TokenRejection::Invalid)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or(TokenRejection::Invalid)?;
        let issued_at: [u8; 8] = URL_SAFE_NO_PAD
            .decode(issued_at)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(TokenRejection::Invalid)?;
        let issued_at = i64::from_be_bytes(issued_at);

        // A token from the future is treated like one from the distant past
        let age = now.saturating_sub(issued_at);
        if age < 0 || age as u64 > max_age {
            tracing::debug!(salt = %salt, age = age, max_age = max_age, "Signed token expired");
            return Err(TokenRejection::Expired);
        }

        Ok(payload)
    }

    /// MAC keyed for one purpose: the key is SHA-256(salt || "signer" || secret)
    fn mac(&self, salt: &str) -> HmacSha256 {
        let key = Sha256::new()
            .chain_update(salt.as_bytes())
            .chain_update(b"signer")
            .chain_update(&self.secret)
            .finalize();
        HmacSha256::new_from_slice(&key).expect("HMAC accepts keys of any length")
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashnotes_common::constants::salts::RESET_PASSWORD;

    const T0: i64 = 1_700_000_000;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret")
    }

    #[test]
    fn test_roundtrip_within_max_age() {
        let signer = signer();
        let token = signer.issue_at("ada@example.com", RESET_PASSWORD, T0);

        assert_eq!(
            signer.verify_at(&token, RESET_PASSWORD, 300, T0).as_deref(),
            Ok("ada@example.com")
        );
        assert_eq!(
            signer.verify_at(&token, RESET_PASSWORD, 300, T0 + 300).as_deref(),
            Ok("ada@example.com")
        );
        // Not single-use: verifying again still works
        assert!(signer.verify_at(&token, RESET_PASSWORD, 300, T0 + 10).is_ok());
    }

    #[test]
    fn test_expired_after_max_age() {
        let signer = signer();
        let token = signer.issue_at("ada@example.com", RESET_PASSWORD, T0);
        assert_eq!(
            signer.verify_at(&token, RESET_PASSWORD, 300, T0 + 301),
            Err(TokenRejection::Expired)
        );
    }

    #[test]
    fn test_issued_in_future_is_expired() {
        let signer = signer();
        let token = signer.issue_at("ada@example.com", RESET_PASSWORD, T0 + 60);
        assert_eq!(
            signer.verify_at(&token, RESET_PASSWORD, 300, T0),
            Err(TokenRejection::Expired)
        );
    }

    #[test]
    fn test_salt_isolation() {
        let signer = signer();
        let token = signer.issue_at("ada@example.com", RESET_PASSWORD, T0);
        assert_eq!(
            signer.verify_at(&token, "confirm-email", 300, T0),
            Err(TokenRejection::Invalid)
        );
    }

    #[test]
    fn test_wrong_key_is_invalid() {
        let token = signer().issue_at("ada@example.com", RESET_PASSWORD, T0);
        let other = TokenSigner::new("another-secret");
        assert_eq!(
            other.verify_at(&token, RESET_PASSWORD, 300, T0),
            Err(TokenRejection::Invalid)
        );
    }

    #[test]
    fn test_tampering_is_invalid() {
        let signer = signer();
        let token = signer.issue_at("ada@example.com", RESET_PASSWORD, T0);
        let (_, rest) = token.split_once('.').unwrap();

        let forged_payload = URL_SAFE_NO_PAD.encode("eve@example.com");
        let forged = format!("{}.{}", forged_payload, rest);
        assert_eq!(
            signer.verify_at(&forged, RESET_PASSWORD, 300, T0),
            Err(TokenRejection::Invalid)
        );

        // Pushing the timestamp forward breaks the signature too
        let parts: Vec<&str> = token.split('.').collect();
        let later = URL_SAFE_NO_PAD.encode((T0 + 1000).to_be_bytes());
        let forged = format!("{}.{}.{}", parts[0], later, parts[2]);
        assert_eq!(
            signer.verify_at(&forged, RESET_PASSWORD, 300, T0 + 1000),
            Err(TokenRejection::Invalid)
        );
    }

    #[test]
    fn test_expired_forgery_is_invalid() {
        let signer = signer();
        let token = signer.issue_at("ada@example.com", RESET_PASSWORD, T0);
        let forged = format!("{}x", token);
        assert_eq!(
            signer.verify_at(&forged, RESET_PASSWORD, 300, T0 + 10_000),
            Err(TokenRejection::Invalid)
        );
    }

    #[test]
    fn test_malformed_tokens() {
        let signer = signer();
        for token in ["", ".", "..", "abc", "a.b.c", "!!!.???.###"] {
            assert_eq!(
                signer.verify_at(token, RESET_PASSWORD, 300, T0),
                Err(TokenRejection::Invalid),
                "token {:?}",
                token
            );
        }
    }

    #[test]
    fn test_token_is_url_safe() {
        let token = signer().issue("someone+tag@example.com", RESET_PASSWORD);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        );
        assert!(signer().verify(&token, RESET_PASSWORD, 300).is_ok());
    }
}
