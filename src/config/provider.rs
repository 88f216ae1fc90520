//! Per-provider default tables
//!
//! Providers differ in their tolerances: one backend may take aggressive
//! retries, another throttles at a fraction of the traffic. These tables
//! let the embedding application override any layer per provider name while
//! inheriting the global defaults for the rest.

use super::rate_limit::RateLimitConfig;
use super::resilience::{BulkheadConfig, CircuitBreakerConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Layer overrides for a single provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderDefaults {
    /// Circuit breaker override
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    /// Retry override
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Bulkhead override
    #[serde(default)]
    pub bulkhead: Option<BulkheadConfig>,
    /// Rate limit override
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

/// Provider-keyed default table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderDefaultsTable {
    providers: HashMap<String, ProviderDefaults>,
}

impl ProviderDefaultsTable {
    /// Build a table from provider-name/defaults pairs
    pub fn new(providers: HashMap<String, ProviderDefaults>) -> Self {
        Self { providers }
    }

    /// Overrides for a provider, if any were configured
    pub fn get(&self, provider: &str) -> Option<&ProviderDefaults> {
        self.providers.get(provider)
    }

    /// Circuit breaker configuration for a provider, falling back to `base`
    pub fn circuit_breaker(
        &self,
        provider: &str,
        base: &CircuitBreakerConfig,
    ) -> CircuitBreakerConfig {
        self.get(provider)
            .and_then(|d| d.circuit_breaker.clone())
            .unwrap_or_else(|| base.clone())
    }

    /// Retry configuration for a provider, falling back to `base`
    pub fn retry(&self, provider: &str, base: &RetryConfig) -> RetryConfig {
        self.get(provider)
            .and_then(|d| d.retry.clone())
            .unwrap_or_else(|| base.clone())
    }

    /// Bulkhead configuration for a provider, falling back to `base`
    pub fn bulkhead(&self, provider: &str, base: &BulkheadConfig) -> BulkheadConfig {
        self.get(provider)
            .and_then(|d| d.bulkhead.clone())
            .unwrap_or_else(|| base.clone())
    }

    /// Rate limit configuration for a provider, falling back to `base`
    pub fn rate_limit(&self, provider: &str, base: &RateLimitConfig) -> RateLimitConfig {
        self.get(provider)
            .and_then(|d| d.rate_limit.clone())
            .unwrap_or_else(|| base.clone())
    }
}
