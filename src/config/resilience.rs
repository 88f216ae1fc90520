//! Configuration for the execution-path guards

use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Policy deciding when a closed circuit opens
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BreakerPolicy {
    /// Open after a run of consecutive failures
    #[default]
    ConsecutiveFailures,
    /// Open when the failure rate within the monitoring window crosses a
    /// threshold, once a minimum sample size has been observed
    FailureRate,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens (count policy)
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Consecutive half-open successes before the circuit closes
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Requests observed before opening is considered at all
    #[serde(default = "default_minimum_requests")]
    pub minimum_requests: u32,
    /// Deadline applied to each guarded operation (milliseconds)
    #[serde(default = "default_operation_timeout_ms")]
    pub timeout_ms: u64,
    /// How long an open circuit rejects before probing again (milliseconds)
    #[serde(default = "default_recovery_timeout_ms")]
    pub recovery_timeout_ms: u64,
    /// Rolling window for failure-rate accounting (milliseconds)
    #[serde(default = "default_monitoring_window_ms")]
    pub monitoring_window_ms: u64,
    /// Failure ratio within the window that opens the circuit (rate policy)
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,
    /// Opening policy
    #[serde(default)]
    pub policy: BreakerPolicy,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            minimum_requests: default_minimum_requests(),
            timeout_ms: default_operation_timeout_ms(),
            recovery_timeout_ms: default_recovery_timeout_ms(),
            monitoring_window_ms: default_monitoring_window_ms(),
            failure_rate: default_failure_rate(),
            policy: BreakerPolicy::default(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Operation deadline as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Open-state hold time as a `Duration`
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }

    /// Failure-rate window as a `Duration`
    pub fn monitoring_window(&self) -> Duration {
        Duration::from_millis(self.monitoring_window_ms)
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay between attempts (milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on the backoff delay (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Double the delay after every failed attempt
    #[serde(default = "default_true")]
    pub exponential_backoff: bool,
    /// Perturb each delay by up to ±25% to avoid synchronized retries
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            exponential_backoff: true,
            jitter: true,
        }
    }
}

/// Bulkhead configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkheadConfig {
    /// Operations allowed in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Waiters admitted to the FIFO queue once saturated
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// How long a queued waiter may wait before rejection (milliseconds)
    #[serde(default = "default_queue_timeout_ms")]
    pub queue_timeout_ms: u64,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            queue_size: default_queue_size(),
            queue_timeout_ms: default_queue_timeout_ms(),
        }
    }
}

impl BulkheadConfig {
    /// Queue wait budget as a `Duration`
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_breaker_config_default() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 3);
        assert_eq!(config.minimum_requests, 10);
        assert_eq!(config.recovery_timeout(), Duration::from_secs(60));
        assert_eq!(config.policy, BreakerPolicy::ConsecutiveFailures);
    }

    #[test]
    fn test_breaker_policy_serialization() {
        assert_eq!(
            serde_json::to_string(&BreakerPolicy::ConsecutiveFailures).unwrap(),
            "\"consecutive_failures\""
        );
        assert_eq!(
            serde_json::to_string(&BreakerPolicy::FailureRate).unwrap(),
            "\"failure_rate\""
        );
    }

    #[test]
    fn test_circuit_breaker_config_deserialization_partial() {
        let json = r#"{"failure_threshold": 2, "policy": "failure_rate"}"#;
        let config: CircuitBreakerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.policy, BreakerPolicy::FailureRate);
        assert_eq!(config.success_threshold, 3);
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 100);
        assert_eq!(config.max_delay_ms, 30_000);
        assert!(config.exponential_backoff);
        assert!(config.jitter);
    }

    #[test]
    fn test_bulkhead_config_deserialization_defaults() {
        let config: BulkheadConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_concurrency, 10);
        assert_eq!(config.queue_size, 20);
        assert_eq!(config.queue_timeout(), Duration::from_secs(5));
    }
}
