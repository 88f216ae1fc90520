//! Endpoint records and health tracking
//!
//! An [`Endpoint`] is one concrete backend deployment of a provider. The
//! registry mutates it on every completed call and during health sweeps;
//! records are only ever overwritten, never removed.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use url::Url;

/// Coarse endpoint health derived from recent outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointHealth {
    /// Serving normally
    Healthy,
    /// Elevated failures; still routable at reduced preference
    Degraded,
    /// Excluded from routing
    Unhealthy,
}

/// In-flight load against a declared maximum
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EndpointCapacity {
    /// Requests currently in flight
    pub current: u32,
    /// Declared capacity; zero means undeclared
    pub maximum: u32,
    /// `current / maximum` as a percentage, zero when undeclared
    pub utilization_percent: f64,
}

impl EndpointCapacity {
    /// Capacity still available, zero when undeclared
    pub fn remaining(&self) -> u32 {
        self.maximum.saturating_sub(self.current)
    }

    fn recompute(&mut self) {
        self.utilization_percent = if self.maximum > 0 {
            self.current as f64 * 100.0 / self.maximum as f64
        } else {
            0.0
        };
    }
}

/// Cumulative performance counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EndpointPerformance {
    /// Running mean response time (milliseconds)
    pub avg_response_time_ms: f64,
    /// Failed calls as a percentage of all calls
    pub error_rate: f64,
    /// Successful calls as a percentage of all calls
    pub success_rate: f64,
    /// Completed calls observed
    pub request_count: u64,
    /// Successful calls observed
    pub success_count: u64,
    /// Failed calls observed
    pub failure_count: u64,
}

/// One backend deployment of a provider
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Endpoint id, unique within its provider
    pub id: String,
    /// Provider name
    pub provider: String,
    /// Base URL calls are issued against
    pub base_url: Url,
    /// Relative routing weight
    pub weight: u32,
    /// Current health
    pub health: EndpointHealth,
    /// In-flight load
    pub capacity: EndpointCapacity,
    /// Cumulative performance
    pub performance: EndpointPerformance,
    /// Last time traffic or a sweep observed this endpoint
    pub last_health_check: Instant,
    /// Failures since the last success
    pub consecutive_failures: u32,
}

impl Endpoint {
    /// Fresh record with healthy status and zeroed counters
    pub fn new(provider: impl Into<String>, id: impl Into<String>, base_url: Url, weight: u32) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            base_url,
            weight,
            health: EndpointHealth::Healthy,
            capacity: EndpointCapacity::default(),
            performance: EndpointPerformance::default(),
            last_health_check: Instant::now(),
            consecutive_failures: 0,
        }
    }

    /// Registry key for this endpoint
    pub fn key(&self) -> String {
        Self::key_of(&self.provider, &self.id)
    }

    /// Registry key for a provider/id pair
    pub fn key_of(provider: &str, id: &str) -> String {
        format!("{}:{}", provider, id)
    }

    /// Whether routing may consider this endpoint at all
    pub fn is_routable(&self) -> bool {
        self.health != EndpointHealth::Unhealthy
    }

    /// Routing weight discounted while the endpoint is not fully healthy
    pub fn effective_weight(&self) -> f64 {
        match self.health {
            EndpointHealth::Healthy => self.weight as f64,
            _ => self.weight as f64 * 0.5,
        }
    }

    /// Reserve an in-flight slot after selection
    pub(super) fn acquire_slot(&mut self) {
        self.capacity.current += 1;
        self.capacity.recompute();
    }

    /// Declare the endpoint's capacity ceiling
    pub(super) fn set_max_capacity(&mut self, maximum: u32) {
        self.capacity.maximum = maximum;
        self.capacity.recompute();
    }

    /// Fold one completed call into the record.
    ///
    /// Updates the running mean and the cumulative rates, releases the
    /// in-flight slot, and escalates or recovers health: failures mark the
    /// endpoint degraded at `degraded_threshold` consecutive failures and
    /// unhealthy at `failure_threshold`; sustained success (>95% over more
    /// than 10 calls) promotes it one step back toward healthy.
    pub(super) fn record_result(
        &mut self,
        response_time_ms: f64,
        success: bool,
        degraded_threshold: u32,
        failure_threshold: u32,
    ) {
        let n = self.performance.request_count;
        self.performance.avg_response_time_ms =
            (self.performance.avg_response_time_ms * n as f64 + response_time_ms) / (n + 1) as f64;
        self.performance.request_count = n + 1;

        if success {
            self.performance.success_count += 1;
        } else {
            self.performance.failure_count += 1;
        }
        self.performance.success_rate =
            self.performance.success_count as f64 * 100.0 / self.performance.request_count as f64;
        self.performance.error_rate =
            self.performance.failure_count as f64 * 100.0 / self.performance.request_count as f64;

        if success {
            self.consecutive_failures = 0;
            if self.performance.success_rate > 95.0 && self.performance.request_count > 10 {
                self.health = match self.health {
                    EndpointHealth::Unhealthy => EndpointHealth::Degraded,
                    _ => EndpointHealth::Healthy,
                };
            }
        } else {
            self.consecutive_failures += 1;
            if self.consecutive_failures >= failure_threshold {
                self.health = EndpointHealth::Unhealthy;
            } else if self.consecutive_failures >= degraded_threshold {
                self.health = EndpointHealth::Degraded;
            }
        }

        self.capacity.current = self.capacity.current.saturating_sub(1);
        self.capacity.recompute();
        self.last_health_check = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::new(
            "openai",
            "primary",
            Url::parse("https://api.openai.com/v1").unwrap(),
            100,
        )
    }

    #[test]
    fn test_new_endpoint_defaults() {
        let e = endpoint();
        assert_eq!(e.health, EndpointHealth::Healthy);
        assert_eq!(e.capacity.current, 0);
        assert_eq!(e.performance.request_count, 0);
        assert_eq!(e.key(), "openai:primary");
        assert!(e.is_routable());
    }

    #[test]
    fn test_running_mean_response_time() {
        let mut e = endpoint();
        e.record_result(100.0, true, 2, 4);
        assert!((e.performance.avg_response_time_ms - 100.0).abs() < f64::EPSILON);

        e.record_result(300.0, true, 2, 4);
        assert!((e.performance.avg_response_time_ms - 200.0).abs() < f64::EPSILON);

        e.record_result(200.0, true, 2, 4);
        assert!((e.performance.avg_response_time_ms - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rates_derived_from_cumulative_counts() {
        let mut e = endpoint();
        for _ in 0..3 {
            e.record_result(10.0, true, 2, 4);
        }
        e.record_result(10.0, false, 2, 4);

        assert!((e.performance.success_rate - 75.0).abs() < f64::EPSILON);
        assert!((e.performance.error_rate - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_health_degrades_then_fails() {
        let mut e = endpoint();
        e.record_result(10.0, false, 2, 4);
        assert_eq!(e.health, EndpointHealth::Healthy);

        e.record_result(10.0, false, 2, 4);
        assert_eq!(e.health, EndpointHealth::Degraded);
        assert!(e.is_routable());

        e.record_result(10.0, false, 2, 4);
        e.record_result(10.0, false, 2, 4);
        assert_eq!(e.health, EndpointHealth::Unhealthy);
        assert!(!e.is_routable());
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let mut e = endpoint();
        e.record_result(10.0, false, 2, 4);
        e.record_result(10.0, true, 2, 4);
        assert_eq!(e.consecutive_failures, 0);
    }

    #[test]
    fn test_sustained_success_promotes_health_stepwise() {
        let mut e = endpoint();
        e.health = EndpointHealth::Unhealthy;

        // Eleven straight successes: >95% success over >10 calls
        for _ in 0..11 {
            e.record_result(10.0, true, 2, 4);
        }
        assert_eq!(e.health, EndpointHealth::Degraded);

        e.record_result(10.0, true, 2, 4);
        assert_eq!(e.health, EndpointHealth::Healthy);
    }

    #[test]
    fn test_effective_weight_halved_when_degraded() {
        let mut e = endpoint();
        assert!((e.effective_weight() - 100.0).abs() < f64::EPSILON);
        e.health = EndpointHealth::Degraded;
        assert!((e.effective_weight() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_capacity_slot_cycle() {
        let mut e = endpoint();
        e.set_max_capacity(4);
        e.acquire_slot();
        e.acquire_slot();
        assert_eq!(e.capacity.current, 2);
        assert!((e.capacity.utilization_percent - 50.0).abs() < f64::EPSILON);
        assert_eq!(e.capacity.remaining(), 2);

        e.record_result(10.0, true, 2, 4);
        assert_eq!(e.capacity.current, 1);
        assert!((e.capacity.utilization_percent - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_undeclared_capacity_reads_zero_utilization() {
        let mut e = endpoint();
        e.acquire_slot();
        assert_eq!(e.capacity.utilization_percent, 0.0);
        assert_eq!(e.capacity.remaining(), 0);
    }
}
