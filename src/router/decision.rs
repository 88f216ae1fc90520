//! Routing decisions and their bounded history

use super::endpoint::Endpoint;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Caller-supplied context for one routing call
#[derive(Debug, Clone)]
pub struct RouteContext {
    /// Correlation id threaded through logs and metrics
    pub request_id: Uuid,
    /// Expected size of the work, used by capacity-aware selection
    pub estimated_tokens: Option<u64>,
    /// Providers to try first, in order, when routing across providers
    pub preferred_providers: Vec<String>,
}

impl RouteContext {
    /// Fresh context with a new correlation id
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            estimated_tokens: None,
            preferred_providers: Vec::new(),
        }
    }

    /// Expected token volume (builder pattern)
    pub fn with_estimated_tokens(mut self, tokens: u64) -> Self {
        self.estimated_tokens = Some(tokens);
        self
    }

    /// Append a provider preference (builder pattern)
    pub fn prefer_provider(mut self, provider: impl Into<String>) -> Self {
        self.preferred_providers.push(provider.into());
        self
    }
}

impl Default for RouteContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Static view of the endpoint a decision picked
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedEndpoint {
    /// Endpoint id
    pub id: String,
    /// Provider name
    pub provider: String,
    /// Base URL to call
    pub base_url: Url,
}

impl From<&Endpoint> for SelectedEndpoint {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            id: endpoint.id.clone(),
            provider: endpoint.provider.clone(),
            base_url: endpoint.base_url.clone(),
        }
    }
}

/// Immutable record of one routing call
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    /// Correlation id from the routing context
    pub request_id: Uuid,
    /// The endpoint selected
    pub selected: SelectedEndpoint,
    /// How the selection was made (strategy name or fallback path)
    pub reason: String,
    /// Ids of the candidates that were not selected
    pub alternatives: Vec<String>,
    /// Time spent deciding
    pub routing_time: Duration,
}

/// Ring buffer of recent decisions for analytics
#[derive(Debug)]
pub struct RoutingHistory {
    ring: Mutex<VecDeque<RoutingDecision>>,
    capacity: usize,
}

impl RoutingHistory {
    /// History bounded at `capacity` decisions
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
        }
    }

    /// Append a decision, evicting the oldest past capacity
    pub fn push(&self, decision: RoutingDecision) {
        let mut ring = self.ring.lock();
        if ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(decision);
    }

    /// Snapshot of retained decisions, oldest first
    pub fn snapshot(&self) -> Vec<RoutingDecision> {
        self.ring.lock().iter().cloned().collect()
    }

    /// Number of retained decisions
    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    /// Whether any decision is retained
    pub fn is_empty(&self) -> bool {
        self.ring.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(tag: &str) -> RoutingDecision {
        RoutingDecision {
            request_id: Uuid::new_v4(),
            selected: SelectedEndpoint {
                id: tag.to_string(),
                provider: "openai".to_string(),
                base_url: Url::parse("https://api.openai.com/v1").unwrap(),
            },
            reason: "strategy:weighted_round_robin".to_string(),
            alternatives: Vec::new(),
            routing_time: Duration::from_micros(50),
        }
    }

    #[test]
    fn test_history_evicts_oldest_past_capacity() {
        let history = RoutingHistory::new(3);
        for i in 0..5 {
            history.push(decision(&format!("e{}", i)));
        }

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].selected.id, "e2");
        assert_eq!(snapshot[2].selected.id, "e4");
    }

    #[test]
    fn test_context_builder() {
        let ctx = RouteContext::new()
            .with_estimated_tokens(1_500)
            .prefer_provider("anthropic")
            .prefer_provider("openai");

        assert_eq!(ctx.estimated_tokens, Some(1_500));
        assert_eq!(ctx.preferred_providers, vec!["anthropic", "openai"]);
    }

    #[test]
    fn test_contexts_get_distinct_request_ids() {
        assert_ne!(RouteContext::new().request_id, RouteContext::new().request_id);
    }
}
