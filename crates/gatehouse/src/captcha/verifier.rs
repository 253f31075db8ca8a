//! Session-bound CAPTCHA storage and verification.

use anyhow::Result;
use flashnotes_common::ChallengeRejection;
use flashnotes_common::constants::session_keys::CAPTCHA_TEXT;

use crate::session::SessionStore;

/// Compare a submission against the stored answer, ignoring case.
/// An empty stored answer counts as no challenge.
pub fn compare(stored: Option<&str>, submitted: &str) -> Result<(), ChallengeRejection> {
    match stored {
        None | Some("") => Err(ChallengeRejection::Absent),
        Some(answer) if answer.to_lowercase() == submitted.to_lowercase() => Ok(()),
        Some(_) => Err(ChallengeRejection::Mismatch),
    }
}

/// CAPTCHA verifier service
///
/// Holds at most one live challenge per session. Checking a submission does
/// not consume it; a solved image stays valid until the session fetches a
/// new one or the caller clears it.
pub struct CaptchaVerifier {
    sessions: SessionStore,
}

impl CaptchaVerifier {
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }

    /// Remember `text` as the session's answer, replacing any previous one
    pub async fn store_challenge(&self, session_id: &str, text: &str) -> Result<()> {
        self.sessions.set(session_id, CAPTCHA_TEXT, text).await
    }

    /// Check a submission, reporting why it was rejected
    pub async fn check_challenge(
        &self,
        session_id: &str,
        submitted: &str,
    ) -> Result<Result<(), ChallengeRejection>> {
        let stored = self.sessions.get(session_id, CAPTCHA_TEXT).await?;
        let outcome = compare(stored.as_deref(), submitted);

        match outcome {
            Ok(()) => tracing::debug!(session = %session_id, "CAPTCHA passed"),
            Err(reason) => tracing::debug!(session = %session_id, ?reason, "CAPTCHA rejected"),
        }

        Ok(outcome)
    }

    /// True iff the submission matches the stored answer
    pub async fn verify_challenge(&self, session_id: &str, submitted: &str) -> Result<bool> {
        Ok(self.check_challenge(session_id, submitted).await?.is_ok())
    }

    /// Drop the session's answer so it cannot be replayed
    pub async fn clear_challenge(&self, session_id: &str) -> Result<()> {
        self.sessions.remove(session_id, CAPTCHA_TEXT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare() {
        assert_eq!(compare(None, "abc"), Err(ChallengeRejection::Absent));
        assert_eq!(compare(None, ""), Err(ChallengeRejection::Absent));
        assert_eq!(compare(Some(""), ""), Err(ChallengeRejection::Absent));
        assert_eq!(compare(Some(""), "abc"), Err(ChallengeRejection::Absent));
        assert_eq!(compare(Some("aB3xYz"), "Ab3XyZ"), Ok(()));
        assert_eq!(compare(Some("aB3xYz"), "aB3xY"), Err(ChallengeRejection::Mismatch));
        assert_eq!(compare(Some("aB3xYz"), " aB3xYz"), Err(ChallengeRejection::Mismatch));
    }

    #[tokio::test]
    async fn test_verify_without_challenge() {
        let verifier = CaptchaVerifier::new(SessionStore::memory(3600));
        assert!(!verifier.verify_challenge("s1", "anything").await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_case_insensitive() {
        let verifier = CaptchaVerifier::new(SessionStore::memory(3600));
        verifier.store_challenge("s1", "Qw3rTy").await.unwrap();

        assert!(verifier.verify_challenge("s1", "QW3RTY").await.unwrap());
        assert!(verifier.verify_challenge("s1", "qw3rty").await.unwrap());
        // Other sessions see nothing
        assert!(!verifier.verify_challenge("s2", "qw3rty").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_answers_do_not_mutate() {
        let verifier = CaptchaVerifier::new(SessionStore::memory(3600));
        verifier.store_challenge("s1", "Qw3rTy").await.unwrap();

        for _ in 0..3 {
            let outcome = verifier.check_challenge("s1", "nope").await.unwrap();
            assert_eq!(outcome, Err(ChallengeRejection::Mismatch));
        }
        assert!(verifier.verify_challenge("s1", "qw3rty").await.unwrap());
        // Solved challenge stays until replaced or cleared
        assert!(verifier.verify_challenge("s1", "qw3rty").await.unwrap());
    }

    #[tokio::test]
    async fn test_new_challenge_overwrites_and_clear_consumes() {
        let verifier = CaptchaVerifier::new(SessionStore::memory(3600));
        verifier.store_challenge("s1", "first1").await.unwrap();
        verifier.store_challenge("s1", "second").await.unwrap();

        assert!(!verifier.verify_challenge("s1", "first1").await.unwrap());
        assert!(verifier.verify_challenge("s1", "second").await.unwrap());

        verifier.clear_challenge("s1").await.unwrap();
        let outcome = verifier.check_challenge("s1", "second").await.unwrap();
        assert_eq!(outcome, Err(ChallengeRejection::Absent));
    }
}
