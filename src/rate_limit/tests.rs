//! Rate limiter behavior tests

use super::limiter::RateLimiter;
use crate::config::{RateLimitAlgorithm, RateLimitConfig};
use crate::error::CoreError;
use crate::observability::Telemetry;
use std::time::Duration;

fn limiter(config: RateLimitConfig) -> RateLimiter {
    RateLimiter::in_memory(config, Telemetry::disabled())
}

fn sliding(window_ms: u64, max_requests: u32) -> RateLimitConfig {
    RateLimitConfig {
        window_ms,
        max_requests,
        algorithm: RateLimitAlgorithm::SlidingWindow,
        burst_limit: None,
    }
}

// ==================== Sliding window ====================

#[tokio::test]
async fn test_sliding_window_admits_up_to_limit_then_rejects() {
    let limiter = limiter(sliding(1_000, 5));

    for n in 1..=5 {
        let decision = limiter.check("user-1").await.unwrap();
        assert!(decision.allowed, "call {} should be admitted", n);
        assert_eq!(decision.remaining, 5 - n);
    }

    let decision = limiter.check("user-1").await.unwrap();
    assert!(!decision.allowed);
    assert!(decision.retry_after_ms > 0);
    assert!(decision.retry_after_ms <= 1_000);
}

#[tokio::test]
async fn test_sliding_window_recovers_after_window_elapses() {
    let limiter = limiter(sliding(300, 5));

    for _ in 0..5 {
        limiter.check("user-1").await.unwrap();
    }
    assert!(!limiter.check("user-1").await.unwrap().allowed);

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(limiter.check("user-1").await.unwrap().allowed);
}

#[tokio::test]
async fn test_keys_are_isolated() {
    let limiter = limiter(sliding(1_000, 2));

    limiter.check("a").await.unwrap();
    limiter.check("a").await.unwrap();
    assert!(!limiter.check("a").await.unwrap().allowed);
    assert!(limiter.check("b").await.unwrap().allowed);
}

// ==================== Token bucket ====================

#[tokio::test]
async fn test_token_bucket_burst_up_to_capacity() {
    let limiter = limiter(RateLimitConfig {
        window_ms: 60_000,
        max_requests: 60,
        algorithm: RateLimitAlgorithm::TokenBucket,
        burst_limit: Some(3),
    });

    for _ in 0..3 {
        assert!(limiter.check("k").await.unwrap().allowed);
    }
    let decision = limiter.check("k").await.unwrap();
    assert!(!decision.allowed);
    assert!(decision.retry_after_ms > 0);
}

#[tokio::test]
async fn test_leaky_bucket_behaves_as_constant_rate_bucket() {
    let limiter = limiter(RateLimitConfig {
        window_ms: 1_000,
        max_requests: 10,
        algorithm: RateLimitAlgorithm::LeakyBucket,
        burst_limit: Some(2),
    });

    assert!(limiter.check("k").await.unwrap().allowed);
    assert!(limiter.check("k").await.unwrap().allowed);
    assert!(!limiter.check("k").await.unwrap().allowed);

    // 10 req/s drains in: one slot frees after ~100ms
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(limiter.check("k").await.unwrap().allowed);
}

// ==================== Per-call configuration ====================

#[tokio::test]
async fn test_check_with_overrides_limiter_config() {
    let limiter = limiter(sliding(60_000, 1_000));
    let tight = sliding(60_000, 1);

    assert!(limiter.check_with("k", &tight).await.unwrap().allowed);
    assert!(!limiter.check_with("k", &tight).await.unwrap().allowed);
}

// ==================== Enforcement ====================

#[tokio::test]
async fn test_enforce_maps_rejection_to_error() {
    let limiter = limiter(sliding(60_000, 1));

    limiter.enforce("k").await.unwrap();
    match limiter.enforce("k").await {
        Err(CoreError::RateLimited {
            key,
            retry_after_ms,
        }) => {
            assert_eq!(key, "k");
            assert!(retry_after_ms > 0);
        }
        other => panic!("expected RateLimited, got {:?}", other.err()),
    }
}

// ==================== Cleanup ====================

#[tokio::test]
async fn test_cleanup_ticker_lifecycle() {
    let limiter = limiter(sliding(50, 5));
    limiter.check("ephemeral").await.unwrap();

    let mut ticker = limiter.start_cleanup(Duration::from_millis(40));
    assert!(ticker.is_running());

    tokio::time::sleep(Duration::from_millis(150)).await;
    ticker.stop();
    assert!(!ticker.is_running());
}
