//! Rate limiting and abuse-detection configuration

use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Admission algorithm used by the rate limiter
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitAlgorithm {
    /// Timestamps within a rolling window
    #[default]
    SlidingWindow,
    /// Refilling token pool with burst tolerance up to its capacity
    TokenBucket,
    /// Constant-rate admission. Implemented as a token bucket whose steady
    /// refill rate equals the drain rate, which admits the same request
    /// stream; kept as a distinct name for configuration compatibility.
    LeakyBucket,
}

/// Rate limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length (milliseconds)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Requests admitted per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Admission algorithm
    #[serde(default)]
    pub algorithm: RateLimitAlgorithm,
    /// Bucket capacity for token/leaky bucket; defaults to `max_requests`
    #[serde(default)]
    pub burst_limit: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
            algorithm: RateLimitAlgorithm::default(),
            burst_limit: None,
        }
    }
}

impl RateLimitConfig {
    /// Window length as a `Duration`
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Effective bucket capacity
    pub fn capacity(&self) -> u32 {
        self.burst_limit.unwrap_or(self.max_requests)
    }

    /// Steady refill rate in tokens per second
    pub fn refill_per_sec(&self) -> f64 {
        if self.window_ms == 0 {
            return 0.0;
        }
        self.max_requests as f64 * 1000.0 / self.window_ms as f64
    }

    /// Overlay another configuration on top of this one
    pub fn merge(mut self, other: Self) -> Self {
        if other.window_ms != default_window_ms() {
            self.window_ms = other.window_ms;
        }
        if other.max_requests != default_max_requests() {
            self.max_requests = other.max_requests;
        }
        self.algorithm = other.algorithm;
        if other.burst_limit.is_some() {
            self.burst_limit = other.burst_limit;
        }
        self
    }
}

/// Abuse-detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbuseConfig {
    /// Enable the suspicion-scoring layer
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Sub-window used to detect rapid-fire bursts (milliseconds)
    #[serde(default = "default_rapid_window_ms")]
    pub rapid_window_ms: u64,
    /// Requests within the sub-window that count as a burst
    #[serde(default = "default_rapid_threshold")]
    pub rapid_threshold: u32,
    /// Score added for each observed burst
    #[serde(default = "default_rapid_score")]
    pub rapid_score: u32,
    /// Score added for a user agent matching an automation signature
    #[serde(default = "default_agent_score")]
    pub agent_score: u32,
    /// Accumulated score at which the source is blocklisted
    #[serde(default = "default_suspicious_threshold")]
    pub suspicious_threshold: u32,
    /// How long a blocklisted source stays blocked (milliseconds)
    #[serde(default = "default_block_duration_ms")]
    pub block_duration_ms: u64,
    /// Additional user-agent signatures beyond the built-in denylist
    #[serde(default)]
    pub extra_agent_signatures: Vec<String>,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rapid_window_ms: default_rapid_window_ms(),
            rapid_threshold: default_rapid_threshold(),
            rapid_score: default_rapid_score(),
            agent_score: default_agent_score(),
            suspicious_threshold: default_suspicious_threshold(),
            block_duration_ms: default_block_duration_ms(),
            extra_agent_signatures: Vec::new(),
        }
    }
}

impl AbuseConfig {
    /// Block duration as a `Duration`
    pub fn block_duration(&self) -> Duration {
        Duration::from_millis(self.block_duration_ms)
    }

    /// Rapid-fire sub-window as a `Duration`
    pub fn rapid_window(&self) -> Duration {
        Duration::from_millis(self.rapid_window_ms)
    }
}
