//! One-time passcodes held server-side.
//!
//! One live record per identifier; issuing again overwrites. A record is
//! deleted by the verification that either matches it or finds it expired.
//! Wrong guesses inside the window leave it in place.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use flashnotes_common::OtpRejection;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Generate a 4-digit secret, uniform over 1000..=9999
pub fn generate_secret<R: Rng>(rng: &mut R) -> String {
    rng.random_range(1000..=9999u16).to_string()
}

#[derive(Debug, Clone)]
struct OtpRecord {
    secret: String,
    created_at: DateTime<Utc>,
    validity: TimeDelta,
}

impl OtpRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > self.validity
    }
}

/// Process-wide OTP store
///
/// Backed by a sharded map, so the check-and-delete in `check_at` runs under
/// the lock of the identifier's shard and a secret is redeemed at most once.
#[derive(Default)]
pub struct OtpStore {
    records: DashMap<String, OtpRecord>,
}

impl OtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, identifier: &str, secret: &str, validity_secs: u64) {
        self.issue_at(identifier, secret, validity_secs, Utc::now());
    }

    pub fn issue_at(&self, identifier: &str, secret: &str, validity_secs: u64, now: DateTime<Utc>) {
        let validity = i64::try_from(validity_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        self.records.insert(
            identifier.to_string(),
            OtpRecord {
                secret: secret.to_string(),
                created_at: now,
                validity,
            },
        );
        tracing::debug!(identifier = %identifier, validity_secs = validity_secs, "OTP issued");
    }

    /// True iff `submitted` redeems the live secret for `identifier`
    pub fn verify(&self, identifier: &str, submitted: &str) -> bool {
        self.check_at(identifier, submitted, Utc::now()).is_ok()
    }

    pub fn check(&self, identifier: &str, submitted: &str) -> Result<(), OtpRejection> {
        self.check_at(identifier, submitted, Utc::now())
    }

    pub fn check_at(
        &self,
        identifier: &str,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OtpRejection> {
        let removed = self.records.remove_if(identifier, |_, record| {
            record.is_expired(now) || record.secret == submitted
        });

        let outcome = match removed {
            Some((_, record)) if record.is_expired(now) => Err(OtpRejection::Expired),
            Some(_) => Ok(()),
            None if self.records.contains_key(identifier) => Err(OtpRejection::Mismatch),
            None => Err(OtpRejection::Absent),
        };

        match outcome {
            Ok(()) => tracing::info!(identifier = %identifier, "OTP verified"),
            Err(reason) => tracing::debug!(identifier = %identifier, ?reason, "OTP rejected"),
        }

        outcome
    }

    /// Currently stored secret, without consuming it
    pub fn peek(&self, identifier: &str) -> Option<String> {
        self.records.get(identifier).map(|r| r.secret.clone())
    }

    /// Drop every expired record, returning how many went
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        before.saturating_sub(self.records.len())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Background worker that evicts expired OTPs nobody came back for
pub async fn otp_sweeper(
    store: Arc<OtpStore>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "OTP sweeper started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let swept = store.sweep_expired(Utc::now());
                if swept > 0 {
                    tracing::debug!(swept = swept, remaining = store.len(), "Swept expired OTPs");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("OTP sweeper shutting down...");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const PHONE: &str = "+15550100";

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_generate_secret_range() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..1000 {
            let secret = generate_secret(&mut rng);
            assert_eq!(secret.len(), 4);
            let value: u16 = secret.parse().unwrap();
            assert!((1000..=9999).contains(&value));
        }
    }

    #[test]
    fn test_single_use() {
        let store = OtpStore::new();
        store.issue(PHONE, "1234", 300);
        assert!(store.verify(PHONE, "1234"));
        assert!(!store.verify(PHONE, "1234"));
        assert_eq!(store.check(PHONE, "1234"), Err(OtpRejection::Absent));
    }

    #[test]
    fn test_expiry_removes_record() {
        let store = OtpStore::new();
        store.issue_at(PHONE, "1234", 0, t0());

        let later = t0() + TimeDelta::milliseconds(1);
        assert_eq!(store.check_at(PHONE, "1234", later), Err(OtpRejection::Expired));
        assert_eq!(store.peek(PHONE), None);
    }

    #[test]
    fn test_boundary_is_still_valid() {
        let store = OtpStore::new();
        store.issue_at(PHONE, "1234", 300, t0());
        assert_eq!(store.check_at(PHONE, "1234", t0() + TimeDelta::seconds(300)), Ok(()));
    }

    #[test]
    fn test_expired_wrong_guess_also_removes() {
        let store = OtpStore::new();
        store.issue_at(PHONE, "1234", 300, t0());
        let later = t0() + TimeDelta::seconds(301);
        assert_eq!(store.check_at(PHONE, "0000", later), Err(OtpRejection::Expired));
        assert!(store.is_empty());
    }

    #[test]
    fn test_wrong_guess_allows_retry() {
        let store = OtpStore::new();
        store.issue(PHONE, "1234", 300);
        assert_eq!(store.check(PHONE, "0000"), Err(OtpRejection::Mismatch));
        assert_eq!(store.peek(PHONE).as_deref(), Some("1234"));
        assert!(store.verify(PHONE, "1234"));
    }

    #[test]
    fn test_reissue_overwrites() {
        let store = OtpStore::new();
        store.issue(PHONE, "1111", 300);
        store.issue(PHONE, "2222", 300);
        assert_eq!(store.len(), 1);
        assert!(!store.verify(PHONE, "1111"));
        assert!(store.verify(PHONE, "2222"));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let store = OtpStore::new();
        assert_eq!(store.peek(PHONE), None);
        store.issue(PHONE, "4321", 300);
        assert_eq!(store.peek(PHONE).as_deref(), Some("4321"));
        assert_eq!(store.peek(PHONE).as_deref(), Some("4321"));
        assert!(store.verify(PHONE, "4321"));
    }

    #[test]
    fn test_sweep_expired() {
        let store = OtpStore::new();
        store.issue_at("a", "1000", 10, t0());
        store.issue_at("b", "2000", 600, t0());
        assert_eq!(store.sweep_expired(t0() + TimeDelta::seconds(60)), 1);
        assert_eq!(store.peek("a"), None);
        assert_eq!(store.peek("b").as_deref(), Some("2000"));
    }

    #[test]
    fn test_concurrent_verify_redeems_once() {
        let store = Arc::new(OtpStore::new());
        store.issue(PHONE, "1234", 300);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.verify(PHONE, "1234"))
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let store = Arc::new(OtpStore::new());
        let (tx, rx) = tokio::sync::broadcast::channel(1);
        let worker = tokio::spawn(otp_sweeper(store, Duration::from_secs(3600), rx));
        tx.send(()).unwrap();
        worker.await.unwrap();
    }
}
