//! Rate limit storage.
//!
//! The store is injected into every limiter so tests can inspect it and a
//! networked backend can replace it. The counting step is a single store
//! operation ([`RateLimitStore::hit`]) so that a backend can make
//! lookup → reset-or-increment atomic per key.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

/// Counter for one key in its current window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitEntry {
    pub key: String,
    pub count: u64,
    /// Milliseconds since epoch at which the window closes.
    pub window_reset_at: u64,
}

impl RateLimitEntry {
    /// An entry at or past its reset time is logically absent.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.window_reset_at <= now_ms
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("rate limit store unavailable: {0}")]
    Unavailable(String),
}

/// Shared key → entry mapping.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one request for `key`, atomically with respect to other hits on it.
    ///
    /// A missing or expired entry is replaced by `{count: 1, window_reset_at: now + window}`;
    /// a live entry is incremented. Returns the entry after the update.
    async fn hit(&self, key: &str, window: Duration, now_ms: u64) -> Result<RateLimitEntry, StoreError>;

    /// Live entry for `key`; expired entries read as `None`.
    async fn get(&self, key: &str, now_ms: u64) -> Result<Option<RateLimitEntry>, StoreError>;

    /// Delete every entry expired at `now_ms`. Returns how many were removed.
    async fn sweep(&self, now_ms: u64) -> Result<usize, StoreError>;

    /// Snapshot of all stored entries, expired or not.
    async fn entries(&self) -> Result<Vec<RateLimitEntry>, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;
}

/// Process-local store. Per-key atomicity comes from DashMap's shard locks.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(&self, key: &str, window: Duration, now_ms: u64) -> Result<RateLimitEntry, StoreError> {
        let reset_at = now_ms.saturating_add(window.as_millis() as u64);

        // The shard stays write-locked until `entry` drops.
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry {
                key: key.to_string(),
                count: 0,
                window_reset_at: reset_at,
            });

        if entry.is_expired(now_ms) {
            entry.count = 0;
            entry.window_reset_at = reset_at;
        }
        entry.count = entry.count.saturating_add(1);

        Ok(entry.value().clone())
    }

    async fn get(&self, key: &str, now_ms: u64) -> Result<Option<RateLimitEntry>, StoreError> {
        Ok(self
            .entries
            .get(key)
            .filter(|e| !e.is_expired(now_ms))
            .map(|e| e.value().clone()))
    }

    async fn sweep(&self, now_ms: u64) -> Result<usize, StoreError> {
        let mut removed = 0;
        // The expiry check runs under the shard lock, so a concurrent hit
        // either lands before (and is seen) or after (on a fresh entry).
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now_ms);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    async fn entries(&self) -> Result<Vec<RateLimitEntry>, StoreError> {
        Ok(self.entries.iter().map(|e| e.value().clone()).collect())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_first_hit_opens_window() {
        let store = InMemoryRateLimitStore::new();
        let entry = store.hit("k", WINDOW, 1_000).await.unwrap();
        assert_eq!(
            entry,
            RateLimitEntry {
                key: "k".into(),
                count: 1,
                window_reset_at: 61_000
            }
        );
    }

    #[tokio::test]
    async fn test_hits_in_window_increment() {
        let store = InMemoryRateLimitStore::new();
        store.hit("k", WINDOW, 1_000).await.unwrap();
        store.hit("k", WINDOW, 2_000).await.unwrap();
        let entry = store.hit("k", WINDOW, 60_999).await.unwrap();
        assert_eq!(entry.count, 3);
        assert_eq!(entry.window_reset_at, 61_000);
    }

    #[tokio::test]
    async fn test_expired_entry_is_replaced_not_read() {
        let store = InMemoryRateLimitStore::new();
        for _ in 0..10 {
            store.hit("k", WINDOW, 1_000).await.unwrap();
        }
        assert_eq!(store.get("k", 61_000).await.unwrap(), None);

        let entry = store.hit("k", WINDOW, 61_000).await.unwrap();
        assert_eq!(entry.count, 1);
        assert_eq!(entry.window_reset_at, 121_000);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = InMemoryRateLimitStore::new();
        store.hit("old", WINDOW, 0).await.unwrap();
        store.hit("new", WINDOW, 30_000).await.unwrap();

        // "old" resets at 60_000, "new" at 90_000.
        assert_eq!(store.sweep(59_999).await.unwrap(), 0);
        assert_eq!(store.sweep(60_000).await.unwrap(), 1);
        assert_eq!(store.len().await.unwrap(), 1);
        assert!(store.get("new", 60_000).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweep_keeps_entry_renewed_after_expiry() {
        let store = InMemoryRateLimitStore::new();
        store.hit("k", WINDOW, 0).await.unwrap();
        // Expired at 60_000 but renewed by a hit before the sweep runs.
        store.hit("k", WINDOW, 70_000).await.unwrap();
        assert_eq!(store.sweep(70_000).await.unwrap(), 0);
        assert_eq!(store.get("k", 70_000).await.unwrap().unwrap().count, 1);
    }
}
