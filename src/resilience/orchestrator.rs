//! Composition of the execution-path guards
//!
//! Wraps a caller-supplied operation as
//! Timeout(op) → Retry(timeout-wrapped) → Bulkhead(retry-wrapped) →
//! CircuitBreaker(bulkhead-wrapped). Two consequences fall out of this
//! order: one bulkhead slot covers an entire retry sequence including all
//! of its timeouts, and the breaker can reject a call before any inner
//! layer does work at all.

use super::bulkhead::Bulkhead;
use super::manager::CircuitBreakerManager;
use super::retry::RetryPolicy;
use crate::config::{
    BulkheadConfig, CircuitBreakerConfig, CoreConfig, ProviderDefaultsTable, RetryConfig,
};
use crate::error::{CoreError, Result};
use crate::observability::Telemetry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-call layer selection. Layers left as `None` are skipped entirely.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Deadline applied to each individual attempt
    pub timeout: Option<Duration>,
    /// Retry layer configuration
    pub retry: Option<RetryConfig>,
    /// Bulkhead layer configuration
    pub bulkhead: Option<BulkheadConfig>,
    /// Circuit breaker layer configuration
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl ExecutionOptions {
    /// Options with every layer disabled
    pub fn none() -> Self {
        Self::default()
    }

    /// All four layers from the global defaults of `config`, with
    /// per-provider overrides applied for `provider`
    pub fn for_provider(config: &CoreConfig, provider: &str) -> Self {
        let providers: &ProviderDefaultsTable = &config.providers;
        let breaker = providers.circuit_breaker(provider, &config.circuit_breaker);
        Self {
            timeout: Some(breaker.timeout()),
            retry: Some(providers.retry(provider, &config.retry)),
            bulkhead: Some(providers.bulkhead(provider, &config.bulkhead)),
            circuit_breaker: Some(breaker),
        }
    }
}

/// Composes the guards around caller operations, keyed by resource name
pub struct Orchestrator {
    breakers: CircuitBreakerManager,
    bulkheads: DashMap<String, Arc<Bulkhead>>,
    telemetry: Telemetry,
}

impl Orchestrator {
    /// Create an orchestrator with default breaker configuration
    pub fn new(breaker_defaults: CircuitBreakerConfig, telemetry: Telemetry) -> Self {
        Self {
            breakers: CircuitBreakerManager::new(breaker_defaults, telemetry.clone()),
            bulkheads: DashMap::new(),
            telemetry,
        }
    }

    /// The breaker registry, for state inspection and manual resets
    pub fn breakers(&self) -> &CircuitBreakerManager {
        &self.breakers
    }

    /// Execute `op` for `resource` behind the configured layers
    pub async fn execute<T, F, Fut>(
        &self,
        resource: &str,
        op: F,
        opts: &ExecutionOptions,
    ) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_fallback(resource, op, opts, None::<fn() -> T>)
            .await
    }

    /// Execute `op` for `resource`; when the circuit is open, `fallback`
    /// supplies the result instead of a fast-fail error
    pub async fn execute_with_fallback<T, F, Fut, FB>(
        &self,
        resource: &str,
        op: F,
        opts: &ExecutionOptions,
        fallback: Option<FB>,
    ) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
        FB: FnOnce() -> T,
    {
        let timeout = opts.timeout;
        let attempt = || {
            let fut = op();
            async move {
                match timeout {
                    Some(deadline) => {
                        let started = Instant::now();
                        match tokio::time::timeout(deadline, fut).await {
                            Ok(result) => result,
                            Err(_) => Err(CoreError::Timeout {
                                elapsed: started.elapsed(),
                            }),
                        }
                    }
                    None => fut.await,
                }
            }
        };

        let retried = async {
            match &opts.retry {
                Some(config) => RetryPolicy::new(config.clone()).execute(attempt).await,
                None => attempt().await,
            }
        };

        let admitted = async {
            match &opts.bulkhead {
                Some(config) => self.bulkhead_for(resource, config).execute(retried).await,
                None => retried.await,
            }
        };

        match &opts.circuit_breaker {
            Some(config) => {
                self.breakers
                    .breaker_with(resource, config)
                    .execute(admitted, fallback)
                    .await
            }
            None => admitted.await,
        }
    }

    /// Bulkhead for a resource, created on first use.
    /// An existing bulkhead keeps its original configuration.
    fn bulkhead_for(&self, resource: &str, config: &BulkheadConfig) -> Arc<Bulkhead> {
        if let Some(existing) = self.bulkheads.get(resource) {
            return existing.clone();
        }
        self.bulkheads
            .entry(resource.to_string())
            .or_insert_with(|| {
                Arc::new(Bulkhead::new(
                    resource,
                    config.clone(),
                    self.telemetry.clone(),
                ))
            })
            .clone()
    }
}
