//! Configuration models
//!
//! All models are serde-backed with per-field defaults so partial
//! configuration files work; the embedding application owns where the
//! values come from (file, environment, remote).

mod defaults;
mod provider;
mod rate_limit;
mod resilience;
mod routing;

pub use provider::{ProviderDefaults, ProviderDefaultsTable};
pub use rate_limit::{AbuseConfig, RateLimitAlgorithm, RateLimitConfig};
pub use resilience::{BreakerPolicy, BulkheadConfig, CircuitBreakerConfig, RetryConfig};
pub use routing::RouterConfig;

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Root configuration for the resilience core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Global circuit breaker defaults
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Global retry defaults
    #[serde(default)]
    pub retry: RetryConfig,
    /// Global bulkhead defaults
    #[serde(default)]
    pub bulkhead: BulkheadConfig,
    /// Global rate limit defaults
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Abuse-detection settings
    #[serde(default)]
    pub abuse: AbuseConfig,
    /// Router settings
    #[serde(default)]
    pub router: RouterConfig,
    /// Per-provider overrides
    #[serde(default)]
    pub providers: ProviderDefaultsTable,
}

impl CoreConfig {
    /// Parse a configuration document from YAML
    pub fn from_yaml(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).map_err(|e| CoreError::InvalidConfig(e.to_string()))
    }

    /// Validate cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(CoreError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.bulkhead.max_concurrency == 0 {
            return Err(CoreError::InvalidConfig(
                "bulkhead.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.window_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "rate_limit.window_ms must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.circuit_breaker.failure_rate) {
            return Err(CoreError::InvalidConfig(
                "circuit_breaker.failure_rate must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}
