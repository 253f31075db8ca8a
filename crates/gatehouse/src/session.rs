//! Session-scoped key-value state.
//!
//! Each browser session owns a small string map. The memory backend keeps
//! it in-process and forgets sessions idle for longer than the TTL; the redis
//! backend keeps one hash per session and refreshes its TTL on every write.

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use rand::Rng;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use flashnotes_common::constants::redis_keys::SESSION_PREFIX;

/// Session store, cheap to clone
#[derive(Clone)]
pub enum SessionStore {
    /// In-process sessions with idle expiry
    Memory(Arc<MemorySessions>),
    /// Redis hashes at session:{session_id}
    Redis {
        conn: ConnectionManager,
        ttl_secs: u64,
    },
}

#[derive(Debug)]
struct MemorySession {
    values: HashMap<String, String>,
    touched_at: DateTime<Utc>,
}

/// In-process map: session_id -> (key -> value)
///
/// A session expires once `ttl` has passed since its last write. Expired
/// sessions read as empty and are dropped on read or by `sweep_expired`.
#[derive(Debug)]
pub struct MemorySessions {
    entries: DashMap<String, MemorySession>,
    ttl: TimeDelta,
}

impl MemorySessions {
    fn new(ttl_secs: u64) -> Self {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    fn is_expired(&self, session: &MemorySession, now: DateTime<Utc>) -> bool {
        now - session.touched_at > self.ttl
    }

    fn get_at(&self, session_id: &str, key: &str, now: DateTime<Utc>) -> Option<String> {
        {
            let entry = self.entries.get(session_id)?;
            if !self.is_expired(entry.value(), now) {
                return entry.value().values.get(key).cloned();
            }
        }
        // Read guard must be gone before remove_if takes the shard write lock
        self.entries
            .remove_if(session_id, |_, session| self.is_expired(session, now));
        None
    }

    fn set_at(&self, session_id: &str, key: &str, value: &str, now: DateTime<Utc>) {
        let mut entry = self
            .entries
            .entry(session_id.to_string())
            .or_insert_with(|| MemorySession {
                values: HashMap::new(),
                touched_at: now,
            });
        if self.is_expired(entry.value(), now) {
            entry.values.clear();
        }
        entry.touched_at = now;
        entry.values.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, session_id: &str, key: &str) {
        if let Some(mut entry) = self.entries.get_mut(session_id) {
            entry.values.remove(key);
        }
    }

    /// Drop every expired session, returning how many went
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, session| !self.is_expired(session, now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl SessionStore {
    pub fn memory(ttl_secs: u64) -> Self {
        Self::Memory(Arc::new(MemorySessions::new(ttl_secs)))
    }

    /// Connect to Redis with a connection manager (handles reconnection)
    pub async fn connect_redis(url: &str, ttl_secs: u64) -> Result<Self> {
        let client = redis::Client::open(url).context("Failed to create Redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self::Redis { conn, ttl_secs })
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis { .. } => "redis",
        }
    }

    pub async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        match self {
            Self::Memory(sessions) => Ok(sessions.get_at(session_id, key, Utc::now())),
            Self::Redis { conn, .. } => {
                let mut conn = conn.clone();
                let value: Option<String> = conn
                    .hget(session_key(session_id), key)
                    .await
                    .context("Failed to read session")?;
                Ok(value)
            }
        }
    }

    pub async fn set(&self, session_id: &str, key: &str, value: &str) -> Result<()> {
        match self {
            Self::Memory(sessions) => sessions.set_at(session_id, key, value, Utc::now()),
            Self::Redis { conn, ttl_secs } => {
                let mut conn = conn.clone();
                let redis_key = session_key(session_id);
                let _: () = conn
                    .hset(&redis_key, key, value)
                    .await
                    .context("Failed to write session")?;
                let _: () = conn
                    .expire(&redis_key, *ttl_secs as i64)
                    .await
                    .context("Failed to refresh session TTL")?;
            }
        }
        Ok(())
    }

    pub async fn remove(&self, session_id: &str, key: &str) -> Result<()> {
        match self {
            Self::Memory(sessions) => sessions.remove(session_id, key),
            Self::Redis { conn, .. } => {
                let mut conn = conn.clone();
                let _: () = conn
                    .hdel(session_key(session_id), key)
                    .await
                    .context("Failed to update session")?;
            }
        }
        Ok(())
    }

    /// Drop expired memory sessions. Redis expires its own keys.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        match self {
            Self::Memory(sessions) => sessions.sweep_expired(now),
            Self::Redis { .. } => 0,
        }
    }

    /// Sessions held in process; redis does not report a count
    pub fn live_sessions(&self) -> Option<usize> {
        match self {
            Self::Memory(sessions) => Some(sessions.len()),
            Self::Redis { .. } => None,
        }
    }

    /// Is the backend reachable?
    pub async fn ping(&self) -> bool {
        match self {
            Self::Memory(_) => true,
            Self::Redis { conn, .. } => {
                let mut conn = conn.clone();
                let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
                result.is_ok()
            }
        }
    }
}

fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, session_id)
}

/// Generate a cryptographically random session ID
pub fn new_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Background task evicting idle memory sessions
pub async fn session_sweeper(
    store: SessionStore,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Session sweeper started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let swept = store.sweep_expired(Utc::now());
                if swept > 0 {
                    tracing::debug!(swept = swept, "Swept idle sessions");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Session sweeper shutting down...");
                break;
            }
        }
    }
}
