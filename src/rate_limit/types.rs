//! Rate limiter types and data structures

use std::time::Instant;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDecision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// Requests (or tokens) left before throttling
    pub remaining: u32,
    /// Configured admission limit
    pub limit: u32,
    /// Milliseconds until the next request could be admitted;
    /// zero when `allowed`
    pub retry_after_ms: u64,
}

impl RateLimitDecision {
    pub(super) fn admitted(remaining: u32, limit: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            limit,
            retry_after_ms: 0,
        }
    }

    pub(super) fn rejected(limit: u32, retry_after_ms: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            limit,
            // A zero hint would invite an immediate retry of a rejected call
            retry_after_ms: retry_after_ms.max(1),
        }
    }
}

/// Per-key record held by the in-memory store
#[derive(Debug, Clone)]
pub(super) struct RateEntry {
    /// Admission timestamps for the sliding window
    pub(super) timestamps: Vec<Instant>,
    /// Available tokens for the token bucket
    pub(super) tokens: f64,
    /// Last refill instant for the token bucket
    pub(super) last_refill: Instant,
}

impl RateEntry {
    pub(super) fn sliding() -> Self {
        Self {
            timestamps: Vec::new(),
            tokens: 0.0,
            last_refill: Instant::now(),
        }
    }

    pub(super) fn bucket(capacity: u32) -> Self {
        Self {
            timestamps: Vec::new(),
            tokens: capacity as f64,
            last_refill: Instant::now(),
        }
    }
}
