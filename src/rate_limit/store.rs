//! Rate-limit state storage
//!
//! The limiter is agnostic to where its counters live. The in-memory store
//! here serves a single process; the Redis-backed store (feature `redis`)
//! shares state across processes behind the same trait. Every check is a
//! single atomic check-and-consume: two concurrent callers racing for the
//! last admission slot cannot both win.

use super::types::{RateEntry, RateLimitDecision};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Backend holding per-key admission state
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Sliding-window check: admit and record, or reject with a retry hint
    async fn check_sliding_window(
        &self,
        key: &str,
        window: Duration,
        max_requests: u32,
    ) -> Result<RateLimitDecision>;

    /// Token-bucket check: refill by elapsed time, then consume one token
    /// on admission
    async fn check_token_bucket(
        &self,
        key: &str,
        capacity: u32,
        refill_per_sec: f64,
    ) -> Result<RateLimitDecision>;

    /// Drop records that can no longer influence a decision.
    /// Returns how many keys were removed.
    async fn purge_expired(&self, window: Duration) -> Result<usize>;
}

/// Single-process store; one write lock per check keeps check+consume atomic
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, RateEntry>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently tracked
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether any key is tracked
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn check_sliding_window(
        &self,
        key: &str,
        window: Duration,
        max_requests: u32,
    ) -> Result<RateLimitDecision> {
        let now = Instant::now();

        let mut entries = self.entries.write().await;
        let entry = if let Some(e) = entries.get_mut(key) {
            e
        } else {
            entries.entry(key.to_string()).or_insert_with(RateEntry::sliding)
        };

        entry
            .timestamps
            .retain(|&t| now.duration_since(t) < window);

        let count = entry.timestamps.len() as u32;
        if count >= max_requests {
            // The slot frees when the oldest admission leaves the window
            let retry_after = entry
                .timestamps
                .first()
                .map(|&oldest| window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(window);
            return Ok(RateLimitDecision::rejected(
                max_requests,
                retry_after.as_millis() as u64,
            ));
        }

        entry.timestamps.push(now);
        Ok(RateLimitDecision::admitted(
            max_requests - count - 1,
            max_requests,
        ))
    }

    async fn check_token_bucket(
        &self,
        key: &str,
        capacity: u32,
        refill_per_sec: f64,
    ) -> Result<RateLimitDecision> {
        let now = Instant::now();

        let mut entries = self.entries.write().await;
        let entry = if let Some(e) = entries.get_mut(key) {
            e
        } else {
            entries
                .entry(key.to_string())
                .or_insert_with(|| RateEntry::bucket(capacity))
        };

        let elapsed = now.duration_since(entry.last_refill);
        entry.tokens = (entry.tokens + elapsed.as_secs_f64() * refill_per_sec)
            .min(capacity as f64);
        entry.last_refill = now;

        if entry.tokens < 1.0 {
            let retry_after_ms = if refill_per_sec > 0.0 {
                ((1.0 - entry.tokens) / refill_per_sec * 1000.0).ceil() as u64
            } else {
                u64::MAX
            };
            return Ok(RateLimitDecision::rejected(capacity, retry_after_ms));
        }

        entry.tokens -= 1.0;
        Ok(RateLimitDecision::admitted(entry.tokens as u32, capacity))
    }

    async fn purge_expired(&self, window: Duration) -> Result<usize> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| {
            entry.timestamps.retain(|&t| now.duration_since(t) < window);
            // Keep keys that still carry signal: live timestamps, or a
            // bucket that has not fully refilled since its last use
            !entry.timestamps.is_empty() || now.duration_since(entry.last_refill) < window
        });
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sliding_window_counts_per_key() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);

        for _ in 0..3 {
            let d = store.check_sliding_window("a", window, 3).await.unwrap();
            assert!(d.allowed);
        }
        let d = store.check_sliding_window("a", window, 3).await.unwrap();
        assert!(!d.allowed);

        // Another key is unaffected
        let d = store.check_sliding_window("b", window, 3).await.unwrap();
        assert!(d.allowed);
    }

    #[tokio::test]
    async fn test_sliding_window_remaining_decreases() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);

        let d = store.check_sliding_window("a", window, 3).await.unwrap();
        assert_eq!(d.remaining, 2);
        let d = store.check_sliding_window("a", window, 3).await.unwrap();
        assert_eq!(d.remaining, 1);
        let d = store.check_sliding_window("a", window, 3).await.unwrap();
        assert_eq!(d.remaining, 0);
    }

    #[tokio::test]
    async fn test_token_bucket_consumes_then_refills() {
        let store = MemoryStore::new();

        // Drain a two-token bucket
        assert!(store.check_token_bucket("a", 2, 10.0).await.unwrap().allowed);
        assert!(store.check_token_bucket("a", 2, 10.0).await.unwrap().allowed);
        let d = store.check_token_bucket("a", 2, 10.0).await.unwrap();
        assert!(!d.allowed);
        assert!(d.retry_after_ms > 0);

        // 10 tokens/sec refills one within ~100ms
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.check_token_bucket("a", 2, 10.0).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_token_bucket_never_exceeds_capacity() {
        let store = MemoryStore::new();
        let capacity = 5;

        // Consume one token, then idle well past a full refill interval
        store.check_token_bucket("a", capacity, 100.0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Capacity admissions, not capacity plus the refilled surplus
        let mut admitted = 0;
        for _ in 0..capacity + 3 {
            if store
                .check_token_bucket("a", capacity, 0.0)
                .await
                .unwrap()
                .allowed
            {
                admitted += 1;
            }
        }
        assert_eq!(admitted, capacity);
    }

    #[tokio::test]
    async fn test_purge_drops_stale_keys() {
        let store = MemoryStore::new();
        let window = Duration::from_millis(50);

        store.check_sliding_window("a", window, 5).await.unwrap();
        store.check_sliding_window("b", window, 5).await.unwrap();
        assert_eq!(store.len().await, 2);

        tokio::time::sleep(Duration::from_millis(120)).await;
        let removed = store.purge_expired(window).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.is_empty().await);
    }
}
