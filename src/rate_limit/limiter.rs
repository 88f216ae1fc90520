//! Rate limiter front-end
//!
//! Dispatches checks to the configured algorithm over a pluggable store.
//! Callers consult the limiter before routing; a rejection is a caller
//! decision point, never retried by the core itself.

use super::store::{MemoryStore, RateLimitStore};
use super::types::RateLimitDecision;
use crate::config::{RateLimitAlgorithm, RateLimitConfig};
use crate::error::{CoreError, Result};
use crate::observability::{MetricEvent, Telemetry};
use crate::ticker::Ticker;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Admission gate over a per-key request budget
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn RateLimitStore>,
    telemetry: Telemetry,
}

impl RateLimiter {
    /// Limiter with process-local state
    pub fn in_memory(config: RateLimitConfig, telemetry: Telemetry) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()), telemetry)
    }

    /// Limiter over an explicit store (e.g. a shared Redis backend)
    pub fn with_store(
        config: RateLimitConfig,
        store: Arc<dyn RateLimitStore>,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            config,
            store,
            telemetry,
        }
    }

    /// Check and consume one admission for `key` under the limiter's
    /// own configuration
    pub async fn check(&self, key: &str) -> Result<RateLimitDecision> {
        self.check_with(key, &self.config).await
    }

    /// Check and consume one admission for `key` under an explicit
    /// configuration (per-provider or per-tier overrides)
    pub async fn check_with(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitDecision> {
        let decision = match config.algorithm {
            RateLimitAlgorithm::SlidingWindow => {
                self.store
                    .check_sliding_window(key, config.window(), config.max_requests)
                    .await?
            }
            // Leaky bucket drains at the same constant rate a token bucket
            // refills at; both admit the same stream here
            RateLimitAlgorithm::TokenBucket | RateLimitAlgorithm::LeakyBucket => {
                self.store
                    .check_token_bucket(key, config.capacity(), config.refill_per_sec())
                    .await?
            }
        };

        if !decision.allowed {
            debug!(
                "rate limit exceeded for '{}' (limit {}, retry in {}ms)",
                key, decision.limit, decision.retry_after_ms
            );
            self.telemetry.metric(
                MetricEvent::new("rate_limiter.rejected", 1.0).with_tag("key", key),
            );
        }

        Ok(decision)
    }

    /// Like [`check`](Self::check) but maps a rejection into
    /// [`CoreError::RateLimited`] for call sites that propagate errors
    pub async fn enforce(&self, key: &str) -> Result<()> {
        let decision = self.check(key).await?;
        if decision.allowed {
            Ok(())
        } else {
            Err(CoreError::RateLimited {
                key: key.to_string(),
                retry_after_ms: decision.retry_after_ms,
            })
        }
    }

    /// Start periodic expiry of stale keys. The returned ticker owns the
    /// task; dropping it stops the cleanup.
    pub fn start_cleanup(&self, period: Duration) -> Ticker {
        let store = self.store.clone();
        let window = self.config.window();
        Ticker::start("rate-limit-cleanup", period, move || {
            let store = store.clone();
            async move {
                match store.purge_expired(window).await {
                    Ok(removed) if removed > 0 => {
                        debug!("rate limiter purged {} stale keys", removed);
                    }
                    Ok(_) => {}
                    Err(err) => debug!("rate limiter cleanup failed: {}", err),
                }
            }
        })
    }

    /// Configured admission limit
    pub fn limit(&self) -> u32 {
        self.config.max_requests
    }
}
