//! Fixed-window limiter and the registry of named instances.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use serde::Serialize;

use crate::config::{LimiterConfig, RateLimitConfig};
use crate::rate_limit::clock::Clock;
use crate::rate_limit::key::{extractor_for, KeyExtractor};
use crate::rate_limit::store::{RateLimitStore, StoreError};

/// Outcome of a limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Milliseconds since epoch at which the window closes.
    pub reset_at_ms: u64,
}

impl Decision {
    /// Reset time in epoch seconds, rounded up.
    pub fn reset_epoch_secs(&self) -> u64 {
        self.reset_at_ms.div_ceil(1000)
    }

    /// Whole seconds until the window closes, at least one.
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_at_ms.saturating_sub(now_ms).div_ceil(1000).max(1)
    }
}

/// One independently configured fixed-window limiter.
///
/// Entries are stored under `"{name}:{key}"`, so limiters sharing a store
/// never see each other's counts.
pub struct FixedWindowLimiter {
    name: String,
    window: Duration,
    max_requests: u64,
    message: String,
    key: Arc<dyn KeyExtractor>,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    pub fn new(
        name: impl Into<String>,
        config: &LimiterConfig,
        key: Arc<dyn KeyExtractor>,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            window: Duration::from_millis(config.window_ms),
            max_requests: config.max_requests,
            message: config.message.clone(),
            key,
            store,
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Key for a request under this limiter's extractor.
    pub fn key_for(&self, request: &Request) -> String {
        self.key.key(request)
    }

    fn store_key(&self, key: &str) -> String {
        format!("{}:{}", self.name, key)
    }

    /// Count a request for `key` and decide.
    ///
    /// A denied request has already been counted; denial adds nothing further.
    pub async fn check(&self, key: &str) -> Result<Decision, StoreError> {
        let now = self.clock.now_ms();
        let entry = self.store.hit(&self.store_key(key), self.window, now).await?;

        Ok(Decision {
            allowed: entry.count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.count),
            reset_at_ms: entry.window_reset_at,
        })
    }

    /// Live keys counted by this limiter.
    pub async fn active_keys(&self) -> Result<usize, StoreError> {
        let prefix = format!("{}:", self.name);
        let now = self.clock.now_ms();
        Ok(self
            .store
            .entries()
            .await?
            .iter()
            .filter(|e| e.key.starts_with(&prefix) && !e.is_expired(now))
            .count())
    }
}

/// Summary of a limiter for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct LimiterStats {
    pub name: String,
    pub window_ms: u64,
    pub max_requests: u64,
    pub active_keys: usize,
}

/// Named limiters sharing one store and clock.
#[derive(Clone)]
pub struct RateLimiters {
    limiters: BTreeMap<String, Arc<FixedWindowLimiter>>,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiters {
    pub fn from_config(
        config: &RateLimitConfig,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let limiters = config
            .limiters
            .iter()
            .map(|(name, limiter)| {
                let key = extractor_for(limiter.key, config.trust_forwarded_for);
                let built = FixedWindowLimiter::new(name, limiter, key, store.clone(), clock.clone());
                (name.clone(), Arc::new(built))
            })
            .collect();

        Self {
            limiters,
            store,
            clock,
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<FixedWindowLimiter>> {
        self.limiters.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.limiters.keys().map(String::as_str)
    }

    pub fn store(&self) -> Arc<dyn RateLimitStore> {
        self.store.clone()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub async fn stats(&self) -> Result<Vec<LimiterStats>, StoreError> {
        let mut stats = Vec::with_capacity(self.limiters.len());
        for limiter in self.limiters.values() {
            stats.push(LimiterStats {
                name: limiter.name().to_string(),
                window_ms: limiter.window().as_millis() as u64,
                max_requests: limiter.max_requests(),
                active_keys: limiter.active_keys().await?,
            });
        }
        Ok(stats)
    }
}
