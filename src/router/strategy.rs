//! Endpoint selection strategies
//!
//! Strategies work on a snapshot of the provider's routable endpoints
//! (unhealthy ones are filtered out before selection). A strategy may
//! decline to choose; the registry then follows its declared fallback
//! strategy, and finally falls back to the first healthy candidate.

use super::decision::RouteContext;
use super::endpoint::{Endpoint, EndpointHealth};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Success rates within this many percentage points are treated as tied
const SUCCESS_RATE_TIE_PCT: f64 = 5.0;

/// A pluggable endpoint selector
pub trait SelectionStrategy: Send + Sync {
    /// Registered strategy name
    fn name(&self) -> &'static str;

    /// Strategy consulted when this one declines to choose
    fn fallback(&self) -> Option<&'static str> {
        None
    }

    /// Pick one candidate id, or decline with `None`
    fn select(&self, candidates: &[Endpoint], ctx: &RouteContext) -> Option<String>;
}

/// Cumulative-weight random draw; degraded endpoints count at half weight
pub struct WeightedRoundRobin;

impl SelectionStrategy for WeightedRoundRobin {
    fn name(&self) -> &'static str {
        "weighted_round_robin"
    }

    fn select(&self, candidates: &[Endpoint], _ctx: &RouteContext) -> Option<String> {
        if candidates.is_empty() {
            return None;
        }
        let total: f64 = candidates.iter().map(Endpoint::effective_weight).sum();
        if total <= 0.0 {
            // All weights zero: uniform draw
            let index = rand::thread_rng().gen_range(0..candidates.len());
            return Some(candidates[index].id.clone());
        }

        // Linear cumulative scan; adequate at tens of endpoints
        let mut point = rand::thread_rng().gen_range(0.0..total);
        for endpoint in candidates {
            let weight = endpoint.effective_weight();
            if point < weight {
                return Some(endpoint.id.clone());
            }
            point -= weight;
        }
        candidates.last().map(|e| e.id.clone())
    }
}

/// Healthy endpoints first, then lowest utilization
pub struct LeastConnections;

impl SelectionStrategy for LeastConnections {
    fn name(&self) -> &'static str {
        "least_connections"
    }

    fn select(&self, candidates: &[Endpoint], _ctx: &RouteContext) -> Option<String> {
        candidates
            .iter()
            .min_by(|a, b| {
                let health_a = a.health != EndpointHealth::Healthy;
                let health_b = b.health != EndpointHealth::Healthy;
                health_a.cmp(&health_b).then(
                    a.capacity
                        .utilization_percent
                        .total_cmp(&b.capacity.utilization_percent),
                )
            })
            .map(|e| e.id.clone())
    }
}

/// Best observed success rate, ties (≤5%) broken by mean response time.
/// Only endpoints with traffic history qualify.
pub struct FastestResponse;

impl SelectionStrategy for FastestResponse {
    fn name(&self) -> &'static str {
        "fastest_response"
    }

    fn fallback(&self) -> Option<&'static str> {
        Some("least_connections")
    }

    fn select(&self, candidates: &[Endpoint], _ctx: &RouteContext) -> Option<String> {
        let seasoned: Vec<&Endpoint> = candidates
            .iter()
            .filter(|e| e.performance.request_count > 0)
            .collect();
        if seasoned.is_empty() {
            return None;
        }

        let best_rate = seasoned
            .iter()
            .map(|e| e.performance.success_rate)
            .fold(f64::MIN, f64::max);

        seasoned
            .into_iter()
            .filter(|e| best_rate - e.performance.success_rate <= SUCCESS_RATE_TIE_PCT)
            .min_by(|a, b| {
                a.performance
                    .avg_response_time_ms
                    .total_cmp(&b.performance.avg_response_time_ms)
            })
            .map(|e| e.id.clone())
    }
}

/// Healthy endpoints by rising utilization; degraded ones only as a last resort
pub struct HealthBased;

impl SelectionStrategy for HealthBased {
    fn name(&self) -> &'static str {
        "health_based"
    }

    fn select(&self, candidates: &[Endpoint], _ctx: &RouteContext) -> Option<String> {
        let healthy = candidates
            .iter()
            .filter(|e| e.health == EndpointHealth::Healthy)
            .min_by(|a, b| {
                a.capacity
                    .utilization_percent
                    .total_cmp(&b.capacity.utilization_percent)
            });
        if let Some(endpoint) = healthy {
            return Some(endpoint.id.clone());
        }

        candidates
            .iter()
            .find(|e| e.health == EndpointHealth::Degraded)
            .map(|e| e.id.clone())
    }
}

/// Capacity-aware selection: endpoints with headroom for the estimated
/// work are ranked by observed performance; without any qualifying
/// endpoint the load-based strategy decides.
pub struct ResourceAware {
    fastest: FastestResponse,
    least_connections: LeastConnections,
}

impl ResourceAware {
    /// Build with its delegate strategies
    pub fn new() -> Self {
        Self {
            fastest: FastestResponse,
            least_connections: LeastConnections,
        }
    }
}

impl Default for ResourceAware {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStrategy for ResourceAware {
    fn name(&self) -> &'static str {
        "resource_aware"
    }

    fn select(&self, candidates: &[Endpoint], ctx: &RouteContext) -> Option<String> {
        let needed = ctx.estimated_tokens.unwrap_or(0);
        let qualifying: Vec<Endpoint> = candidates
            .iter()
            .filter(|e| u64::from(e.capacity.remaining()) >= needed)
            .cloned()
            .collect();

        if qualifying.is_empty() {
            debug!(
                "no endpoint has headroom for {} tokens, deferring to load",
                needed
            );
            return self.least_connections.select(candidates, ctx);
        }

        self.fastest
            .select(&qualifying, ctx)
            .or_else(|| self.least_connections.select(&qualifying, ctx))
    }
}

/// Registered strategies, keyed by name
pub struct StrategyTable {
    strategies: HashMap<&'static str, Arc<dyn SelectionStrategy>>,
}

impl StrategyTable {
    /// Table with the built-in strategies registered
    pub fn with_defaults() -> Self {
        let mut table = Self {
            strategies: HashMap::new(),
        };
        table.register(Arc::new(WeightedRoundRobin));
        table.register(Arc::new(LeastConnections));
        table.register(Arc::new(FastestResponse));
        table.register(Arc::new(HealthBased));
        table.register(Arc::new(ResourceAware::new()));
        table
    }

    /// Register (or replace) a strategy under its own name
    pub fn register(&mut self, strategy: Arc<dyn SelectionStrategy>) {
        self.strategies.insert(strategy.name(), strategy);
    }

    /// Look up a strategy by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn SelectionStrategy>> {
        self.strategies.get(name).cloned()
    }

    /// Registered strategy names
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.keys().copied().collect()
    }
}
