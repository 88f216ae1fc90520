//! Registry of named circuit breakers
//!
//! Breakers are created lazily on first use and live for the life of the
//! manager. The manager is an owned value injected by the composition
//! root; nothing here is process-global.

use super::circuit_breaker::{BreakerSnapshot, CircuitBreaker};
use crate::config::CircuitBreakerConfig;
use crate::observability::Telemetry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Owns one [`CircuitBreaker`] per resource name
pub struct CircuitBreakerManager {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    defaults: CircuitBreakerConfig,
    telemetry: Telemetry,
}

impl CircuitBreakerManager {
    /// Create a manager with default per-breaker configuration
    pub fn new(defaults: CircuitBreakerConfig, telemetry: Telemetry) -> Self {
        Self {
            breakers: DashMap::new(),
            defaults,
            telemetry,
        }
    }

    /// Breaker for a resource, created with the manager defaults on first use
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breaker_with(name, &self.defaults)
    }

    /// Breaker for a resource, created with `config` on first use.
    /// An existing breaker keeps its original configuration.
    pub fn breaker_with(&self, name: &str, config: &CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    name,
                    config.clone(),
                    self.telemetry.clone(),
                ))
            })
            .clone()
    }

    /// Snapshot every breaker's counters
    pub fn snapshot_all(&self) -> HashMap<String, BreakerSnapshot> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    /// Reset a named breaker; returns false when none exists
    pub fn reset(&self, name: &str) -> bool {
        match self.breakers.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Number of breakers created so far
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Whether any breaker exists yet
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitState;

    fn manager() -> CircuitBreakerManager {
        CircuitBreakerManager::new(CircuitBreakerConfig::default(), Telemetry::disabled())
    }

    #[tokio::test]
    async fn test_breakers_created_lazily() {
        let manager = manager();
        assert!(manager.is_empty());

        let a = manager.breaker("openai");
        let b = manager.breaker("anthropic");
        assert_eq!(manager.len(), 2);
        assert_eq!(a.state(), CircuitState::Closed);
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_same_name_returns_same_breaker() {
        let manager = manager();
        let a = manager.breaker("openai");
        let b = manager.breaker("openai");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_first_config_wins() {
        let manager = manager();
        let strict = CircuitBreakerConfig {
            failure_threshold: 1,
            minimum_requests: 1,
            ..Default::default()
        };
        let a = manager.breaker_with("openai", &strict);
        // A later call with different config still resolves to the original
        let b = manager.breaker("openai");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_reset_by_name() {
        let manager = manager();
        manager.breaker("openai");
        assert!(manager.reset("openai"));
        assert!(!manager.reset("unknown"));
    }

    #[tokio::test]
    async fn test_snapshot_all_covers_every_breaker() {
        let manager = manager();
        manager.breaker("openai");
        manager.breaker("anthropic");

        let snapshots = manager.snapshot_all();
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots.contains_key("openai"));
        assert!(snapshots.contains_key("anthropic"));
    }
}
