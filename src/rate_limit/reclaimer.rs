//! Background reclamation of expired rate limit entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::observability::metrics;
use crate::rate_limit::clock::Clock;
use crate::rate_limit::store::{RateLimitStore, StoreError};

/// Periodic sweep over the store, independent of request traffic.
pub struct Reclaimer {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl Reclaimer {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self { store, clock, interval }
    }

    /// Remove every entry expired now. Returns the number removed.
    pub async fn sweep_once(&self) -> Result<usize, StoreError> {
        let removed = self.store.sweep(self.clock.now_ms()).await?;
        let remaining = self.store.len().await?;

        metrics::record_reclaimed(removed, remaining);
        if removed > 0 {
            tracing::debug!(removed, remaining, "Reclaimed expired rate limit entries");
        }
        Ok(removed)
    }

    /// Sweep every interval until shutdown is signalled.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.interval.as_secs(), "Rate limit reclaimer started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::warn!(error = %e, "Rate limit sweep failed");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Rate limit reclaimer stopped");
    }

    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
