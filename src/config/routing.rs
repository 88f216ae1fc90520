//! Endpoint registry and routing configuration

use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Consecutive failures at which an endpoint becomes unhealthy;
    /// it is degraded at half this value
    #[serde(default = "default_endpoint_failure_threshold")]
    pub failure_threshold: u32,
    /// Health sweep interval (milliseconds)
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Routing decisions retained for analytics
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Strategy used when a routing call names none
    #[serde(default = "default_strategy")]
    pub default_strategy: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_endpoint_failure_threshold(),
            sweep_interval_ms: default_sweep_interval_ms(),
            history_capacity: default_history_capacity(),
            default_strategy: default_strategy(),
        }
    }
}

impl RouterConfig {
    /// Sweep interval as a `Duration`
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Consecutive-failure count at which an endpoint is marked degraded
    pub fn degraded_threshold(&self) -> u32 {
        (self.failure_threshold / 2).max(1)
    }
}
