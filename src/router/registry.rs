//! Endpoint registry and request router
//!
//! Tracks every registered backend endpoint, routes requests through the
//! strategy table, folds call outcomes back into endpoint health, and runs
//! the periodic health sweep.

use super::decision::{RouteContext, RoutingDecision, RoutingHistory, SelectedEndpoint};
use super::endpoint::{Endpoint, EndpointHealth};
use super::error::RoutingError;
use super::strategy::{SelectionStrategy, StrategyTable};
use crate::config::RouterConfig;
use crate::error::{CoreError, Result};
use crate::observability::{MetricEvent, Telemetry};
use crate::ticker::Ticker;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Endpoint counts for one provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderStats {
    /// Registered endpoints
    pub endpoints: usize,
    /// Currently healthy
    pub healthy: usize,
    /// Currently degraded
    pub degraded: usize,
    /// Currently unhealthy
    pub unhealthy: usize,
}

/// Registry-wide snapshot for monitoring surfaces
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// All registered endpoints
    pub total_endpoints: usize,
    /// Healthy endpoints
    pub healthy: usize,
    /// Degraded endpoints
    pub degraded: usize,
    /// Unhealthy endpoints
    pub unhealthy: usize,
    /// Completed calls folded into the registry
    pub total_requests: u64,
    /// Successful share of those calls, as a percentage
    pub overall_success_rate: f64,
    /// Per-provider breakdown
    pub providers: HashMap<String, ProviderStats>,
}

/// Tracks backend endpoints and selects one per request
pub struct EndpointRegistry {
    endpoints: DashMap<String, Endpoint>,
    provider_index: DashMap<String, Vec<String>>,
    strategies: RwLock<StrategyTable>,
    config: RouterConfig,
    history: RoutingHistory,
    telemetry: Telemetry,
    sweeper: Mutex<Option<Ticker>>,
}

impl EndpointRegistry {
    /// Create a registry with the built-in strategy table
    pub fn new(config: RouterConfig, telemetry: Telemetry) -> Self {
        let history = RoutingHistory::new(config.history_capacity);
        Self {
            endpoints: DashMap::new(),
            provider_index: DashMap::new(),
            strategies: RwLock::new(StrategyTable::with_defaults()),
            config,
            history,
            telemetry,
            sweeper: Mutex::new(None),
        }
    }

    // ========== Registration ==========

    /// Register an endpoint, or overwrite the static fields of an existing
    /// one. Runtime state (health, counters) survives re-registration.
    pub fn register_endpoint(
        &self,
        provider: &str,
        id: &str,
        base_url: &str,
        weight: u32,
    ) -> Result<()> {
        let url = Url::parse(base_url).map_err(|e| RoutingError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        let key = Endpoint::key_of(provider, id);
        match self.endpoints.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let endpoint = occupied.get_mut();
                endpoint.base_url = url;
                endpoint.weight = weight;
                debug!("endpoint '{}' re-registered", key);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Endpoint::new(provider, id, url, weight));
                self.provider_index
                    .entry(provider.to_string())
                    .or_default()
                    .push(key.clone());
                info!("endpoint '{}' registered (weight {})", key, weight);
            }
        }
        Ok(())
    }

    /// Declare an endpoint's capacity ceiling
    pub fn set_max_capacity(&self, provider: &str, id: &str, maximum: u32) -> Result<()> {
        let key = Endpoint::key_of(provider, id);
        let mut entry = self
            .endpoints
            .get_mut(&key)
            .ok_or_else(|| RoutingError::UnknownEndpoint {
                provider: provider.to_string(),
                id: id.to_string(),
            })?;
        entry.set_max_capacity(maximum);
        Ok(())
    }

    /// Register (or replace) a selection strategy
    pub fn register_strategy(&self, strategy: Arc<dyn SelectionStrategy>) {
        self.strategies.write().register(strategy);
    }

    // ========== Queries ==========

    /// Snapshot of one endpoint
    pub fn endpoint(&self, provider: &str, id: &str) -> Option<Endpoint> {
        self.endpoints
            .get(&Endpoint::key_of(provider, id))
            .map(|e| e.clone())
    }

    /// Snapshots of every endpoint registered for a provider
    pub fn endpoints_for(&self, provider: &str) -> Vec<Endpoint> {
        let keys = match self.provider_index.get(provider) {
            Some(keys) => keys.clone(),
            None => return Vec::new(),
        };
        keys.iter()
            .filter_map(|key| self.endpoints.get(key).map(|e| e.clone()))
            .collect()
    }

    /// All providers with at least one registered endpoint
    pub fn providers(&self) -> Vec<String> {
        self.provider_index
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Recent routing decisions, oldest first
    pub fn decision_history(&self) -> Vec<RoutingDecision> {
        self.history.snapshot()
    }

    /// Registry-wide health and traffic counts
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        let mut success_total = 0u64;

        for entry in self.endpoints.iter() {
            let endpoint = entry.value();
            stats.total_endpoints += 1;
            stats.total_requests += endpoint.performance.request_count;
            success_total += endpoint.performance.success_count;

            let provider = stats
                .providers
                .entry(endpoint.provider.clone())
                .or_default();
            provider.endpoints += 1;
            match endpoint.health {
                EndpointHealth::Healthy => {
                    stats.healthy += 1;
                    provider.healthy += 1;
                }
                EndpointHealth::Degraded => {
                    stats.degraded += 1;
                    provider.degraded += 1;
                }
                EndpointHealth::Unhealthy => {
                    stats.unhealthy += 1;
                    provider.unhealthy += 1;
                }
            }
        }

        stats.overall_success_rate = if stats.total_requests > 0 {
            success_total as f64 * 100.0 / stats.total_requests as f64
        } else {
            0.0
        };
        stats
    }

    // ========== Routing ==========

    /// Select an endpoint for `provider`.
    ///
    /// Candidates are the provider's non-unhealthy endpoints. The named
    /// strategy (or the configured default) picks first; if it declines,
    /// its declared fallback strategy is consulted, and as a last resort
    /// the first healthy candidate is taken.
    pub fn route_request(
        &self,
        provider: &str,
        ctx: &RouteContext,
        strategy: Option<&str>,
    ) -> Result<RoutingDecision> {
        let started = Instant::now();

        let candidates: Vec<Endpoint> = self
            .endpoints_for(provider)
            .into_iter()
            .filter(Endpoint::is_routable)
            .collect();
        if candidates.is_empty() {
            return Err(RoutingError::NoRoutableEndpoint(provider.to_string()).into());
        }

        let mut strategy_name = strategy
            .unwrap_or(&self.config.default_strategy)
            .to_string();
        let mut visited: Vec<String> = Vec::new();
        let mut selection: Option<(String, String)> = None;

        loop {
            let strat = self
                .strategies
                .read()
                .get(&strategy_name)
                .ok_or_else(|| RoutingError::UnknownStrategy(strategy_name.clone()))?;
            visited.push(strategy_name.clone());

            if let Some(id) = strat.select(&candidates, ctx) {
                selection = Some((id, format!("strategy:{}", strategy_name)));
                break;
            }
            match strat.fallback() {
                Some(next) if !visited.iter().any(|v| v == next) => {
                    debug!(
                        "strategy '{}' declined for '{}', falling back to '{}'",
                        strategy_name, provider, next
                    );
                    strategy_name = next.to_string();
                }
                _ => break,
            }
        }

        let (selected_id, reason) = match selection {
            Some(found) => found,
            None => {
                let first_healthy = candidates
                    .iter()
                    .find(|e| e.health == EndpointHealth::Healthy)
                    .ok_or_else(|| RoutingError::NoHealthyEndpoint(provider.to_string()))?;
                (first_healthy.id.clone(), "fallback:first_healthy".to_string())
            }
        };

        let key = Endpoint::key_of(provider, &selected_id);
        let selected = {
            let mut entry =
                self.endpoints
                    .get_mut(&key)
                    .ok_or_else(|| RoutingError::UnknownEndpoint {
                        provider: provider.to_string(),
                        id: selected_id.clone(),
                    })?;
            entry.acquire_slot();
            SelectedEndpoint::from(&*entry)
        };

        let decision = RoutingDecision {
            request_id: ctx.request_id,
            selected,
            reason: reason.clone(),
            alternatives: candidates
                .iter()
                .filter(|e| e.id != selected_id)
                .map(|e| e.id.clone())
                .collect(),
            routing_time: started.elapsed(),
        };

        self.history.push(decision.clone());
        self.telemetry.metric(
            MetricEvent::new("router.selected", 1.0)
                .with_tag("provider", provider)
                .with_tag("endpoint", &selected_id)
                .with_tag("reason", &reason),
        );
        debug!(
            "routed request {} to '{}' ({})",
            ctx.request_id, key, reason
        );

        Ok(decision)
    }

    /// Route honoring the context's provider preferences, falling back to
    /// any provider with a routable endpoint.
    pub fn route_preferred(
        &self,
        ctx: &RouteContext,
        strategy: Option<&str>,
    ) -> Result<RoutingDecision> {
        for provider in &ctx.preferred_providers {
            match self.route_request(provider, ctx, strategy) {
                Ok(decision) => return Ok(decision),
                Err(CoreError::Routing(RoutingError::UnknownStrategy(name))) => {
                    return Err(RoutingError::UnknownStrategy(name).into());
                }
                Err(_) => continue,
            }
        }

        for provider in self.providers() {
            if ctx.preferred_providers.contains(&provider) {
                continue;
            }
            match self.route_request(&provider, ctx, strategy) {
                Ok(decision) => return Ok(decision),
                Err(_) => continue,
            }
        }

        Err(RoutingError::NoRoutableEndpoint("any".to_string()).into())
    }

    // ========== Outcome reporting ==========

    /// Fold one completed call into its endpoint: running-mean response
    /// time, cumulative rates, health escalation, and slot release.
    pub fn update_endpoint_metrics(
        &self,
        provider: &str,
        id: &str,
        response_time_ms: f64,
        success: bool,
    ) -> Result<()> {
        let key = Endpoint::key_of(provider, id);
        let mut entry = self
            .endpoints
            .get_mut(&key)
            .ok_or_else(|| RoutingError::UnknownEndpoint {
                provider: provider.to_string(),
                id: id.to_string(),
            })?;

        let health_before = entry.health;
        entry.record_result(
            response_time_ms,
            success,
            self.config.degraded_threshold(),
            self.config.failure_threshold,
        );
        let health_after = entry.health;
        drop(entry);

        if health_before != health_after {
            if health_after == EndpointHealth::Unhealthy {
                warn!("endpoint '{}' marked unhealthy", key);
            } else {
                info!(
                    "endpoint '{}' health changed: {:?} -> {:?}",
                    key, health_before, health_after
                );
            }
            self.telemetry.metric(
                MetricEvent::new("router.health_changed", 1.0)
                    .with_tag("endpoint", &key)
                    .with_tag("to", format!("{:?}", health_after).to_lowercase()),
            );
        }
        Ok(())
    }

    // ========== Health sweep ==========

    /// One sweep pass: idle endpoints with no outstanding failure streak
    /// recover to healthy, and endpoints still unhealthy are logged.
    pub fn sweep(&self) {
        let now = Instant::now();
        let idle_after = self.config.sweep_interval() * 2;
        let mut revived = 0u32;
        let mut still_unhealthy: Vec<String> = Vec::new();

        for mut entry in self.endpoints.iter_mut() {
            let endpoint = entry.value_mut();
            let idle = now.duration_since(endpoint.last_health_check) > idle_after;
            if idle
                && endpoint.consecutive_failures == 0
                && endpoint.health != EndpointHealth::Healthy
            {
                endpoint.health = EndpointHealth::Healthy;
                endpoint.last_health_check = now;
                revived += 1;
            }
            if endpoint.health == EndpointHealth::Unhealthy {
                still_unhealthy.push(endpoint.key());
            }
        }

        for key in &still_unhealthy {
            warn!("endpoint '{}' remains unhealthy", key);
        }
        if revived > 0 {
            debug!("health sweep revived {} idle endpoints", revived);
        }
        self.telemetry
            .metric(MetricEvent::new("router.sweep.revived", revived as f64));
    }

    /// Start the periodic health sweep. Idempotent; a running sweep is
    /// replaced.
    pub fn start_sweep(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let ticker = Ticker::start(
            "endpoint-health-sweep",
            self.config.sweep_interval(),
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(registry) = weak.upgrade() {
                        registry.sweep();
                    }
                }
            },
        );
        *self.sweeper.lock() = Some(ticker);
    }

    /// Stop the periodic health sweep
    pub fn stop_sweep(&self) {
        if let Some(mut ticker) = self.sweeper.lock().take() {
            ticker.stop();
        }
    }

    /// Whether the sweep ticker is currently running
    pub fn sweep_running(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(Ticker::is_running)
    }
}
