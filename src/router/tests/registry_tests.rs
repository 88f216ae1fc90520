//! Registry behavior: registration, routing pipeline, outcome folding,
//! history, stats, and the health sweep

use crate::config::RouterConfig;
use crate::error::CoreError;
use crate::observability::{MemorySink, Telemetry, TelemetryPipeline};
use crate::router::{
    EndpointRegistry, RouteContext, RoutingError, SelectionStrategy,
};
use std::sync::Arc;
use std::time::Duration;

fn registry() -> Arc<EndpointRegistry> {
    registry_with(RouterConfig::default())
}

fn registry_with(config: RouterConfig) -> Arc<EndpointRegistry> {
    Arc::new(EndpointRegistry::new(config, Telemetry::disabled()))
}

// ==================== Registration ====================

#[tokio::test]
async fn test_registration_is_idempotent_upsert() {
    let registry = registry();
    registry
        .register_endpoint("openai", "primary", "https://a.example.com/v1", 100)
        .unwrap();

    // Accumulate some runtime state
    registry
        .update_endpoint_metrics("openai", "primary", 120.0, true)
        .unwrap();

    // Re-registering overwrites statics but keeps runtime state
    registry
        .register_endpoint("openai", "primary", "https://b.example.com/v2", 40)
        .unwrap();

    let endpoint = registry.endpoint("openai", "primary").unwrap();
    assert_eq!(endpoint.base_url.as_str(), "https://b.example.com/v2");
    assert_eq!(endpoint.weight, 40);
    assert_eq!(endpoint.performance.request_count, 1);
    assert_eq!(registry.endpoints_for("openai").len(), 1);
}

#[tokio::test]
async fn test_registration_rejects_malformed_url() {
    let registry = registry();
    let result = registry.register_endpoint("openai", "bad", "not a url", 1);
    assert!(matches!(
        result,
        Err(CoreError::Routing(RoutingError::InvalidBaseUrl { .. }))
    ));
}

#[tokio::test]
async fn test_metrics_for_unknown_endpoint_fail() {
    let registry = registry();
    let result = registry.update_endpoint_metrics("openai", "ghost", 10.0, true);
    assert!(matches!(
        result,
        Err(CoreError::Routing(RoutingError::UnknownEndpoint { .. }))
    ));
}

// ==================== Routing pipeline ====================

#[tokio::test]
async fn test_routing_fails_without_endpoints() {
    let registry = registry();
    let result = registry.route_request("openai", &RouteContext::new(), None);
    assert!(matches!(
        result,
        Err(CoreError::Routing(RoutingError::NoRoutableEndpoint(_)))
    ));
}

#[tokio::test]
async fn test_routing_fails_on_unknown_strategy() {
    let registry = registry();
    registry
        .register_endpoint("openai", "a", "https://a.example.com", 1)
        .unwrap();

    let result = registry.route_request("openai", &RouteContext::new(), Some("coin_flip"));
    match result {
        Err(CoreError::Routing(RoutingError::UnknownStrategy(name))) => {
            assert_eq!(name, "coin_flip");
        }
        other => panic!("expected UnknownStrategy, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn test_endpoint_at_failure_threshold_leaves_candidate_set() {
    let config = RouterConfig::default();
    let registry = registry_with(config.clone());
    registry
        .register_endpoint("openai", "failing", "https://a.example.com", 100)
        .unwrap();
    registry
        .register_endpoint("openai", "stable", "https://b.example.com", 1)
        .unwrap();

    for _ in 0..config.failure_threshold {
        registry
            .update_endpoint_metrics("openai", "failing", 10.0, false)
            .unwrap();
    }

    // Despite its far larger weight, the failing endpoint is now excluded
    for _ in 0..200 {
        let decision = registry
            .route_request("openai", &RouteContext::new(), None)
            .unwrap();
        assert_eq!(decision.selected.id, "stable");
    }
}

#[tokio::test]
async fn test_selection_bumps_capacity_and_decision_lists_alternatives() {
    let registry = registry();
    registry
        .register_endpoint("openai", "a", "https://a.example.com", 1)
        .unwrap();
    registry
        .register_endpoint("openai", "b", "https://b.example.com", 1)
        .unwrap();

    let decision = registry
        .route_request("openai", &RouteContext::new(), None)
        .unwrap();

    assert_eq!(decision.alternatives.len(), 1);
    assert_ne!(decision.alternatives[0], decision.selected.id);

    let selected = registry
        .endpoint("openai", &decision.selected.id)
        .unwrap();
    assert_eq!(selected.capacity.current, 1);
}

#[tokio::test]
async fn test_custom_strategy_and_first_healthy_fallback() {
    struct Abstain;
    impl SelectionStrategy for Abstain {
        fn name(&self) -> &'static str {
            "abstain"
        }
        fn select(
            &self,
            _candidates: &[crate::router::Endpoint],
            _ctx: &RouteContext,
        ) -> Option<String> {
            None
        }
    }

    let registry = registry();
    registry.register_strategy(Arc::new(Abstain));
    registry
        .register_endpoint("openai", "a", "https://a.example.com", 1)
        .unwrap();

    let decision = registry
        .route_request("openai", &RouteContext::new(), Some("abstain"))
        .unwrap();
    assert_eq!(decision.selected.id, "a");
    assert_eq!(decision.reason, "fallback:first_healthy");
}

#[tokio::test]
async fn test_no_healthy_endpoint_when_strategies_abstain() {
    struct Abstain;
    impl SelectionStrategy for Abstain {
        fn name(&self) -> &'static str {
            "abstain"
        }
        fn select(
            &self,
            _candidates: &[crate::router::Endpoint],
            _ctx: &RouteContext,
        ) -> Option<String> {
            None
        }
    }

    let registry = registry();
    registry.register_strategy(Arc::new(Abstain));
    registry
        .register_endpoint("openai", "a", "https://a.example.com", 1)
        .unwrap();
    // Degrade the only endpoint: routable, but not healthy
    registry
        .update_endpoint_metrics("openai", "a", 10.0, false)
        .unwrap();
    registry
        .update_endpoint_metrics("openai", "a", 10.0, false)
        .unwrap();

    let result = registry.route_request("openai", &RouteContext::new(), Some("abstain"));
    assert!(matches!(
        result,
        Err(CoreError::Routing(RoutingError::NoHealthyEndpoint(_)))
    ));
}

#[tokio::test]
async fn test_route_preferred_honors_order_then_falls_back() {
    let registry = registry();
    registry
        .register_endpoint("anthropic", "a", "https://a.example.com", 1)
        .unwrap();
    registry
        .register_endpoint("openai", "b", "https://b.example.com", 1)
        .unwrap();

    let ctx = RouteContext::new()
        .prefer_provider("cohere")
        .prefer_provider("anthropic");
    let decision = registry.route_preferred(&ctx, None).unwrap();
    assert_eq!(decision.selected.provider, "anthropic");

    // With no preference match at all, any routable provider serves
    let ctx = RouteContext::new().prefer_provider("cohere");
    let decision = registry.route_preferred(&ctx, None).unwrap();
    assert!(["anthropic", "openai"].contains(&decision.selected.provider.as_str()));

    let empty = registry_with(RouterConfig::default());
    let result = empty.route_preferred(&RouteContext::new(), None);
    assert!(result.is_err());
}

// ==================== History ====================

#[tokio::test]
async fn test_decision_history_is_bounded() {
    let registry = registry_with(RouterConfig {
        history_capacity: 10,
        ..Default::default()
    });
    registry
        .register_endpoint("openai", "a", "https://a.example.com", 1)
        .unwrap();

    for _ in 0..25 {
        registry
            .route_request("openai", &RouteContext::new(), None)
            .unwrap();
    }

    assert_eq!(registry.decision_history().len(), 10);
}

#[tokio::test]
async fn test_decisions_record_request_id_and_timing() {
    let registry = registry();
    registry
        .register_endpoint("openai", "a", "https://a.example.com", 1)
        .unwrap();

    let ctx = RouteContext::new();
    let decision = registry.route_request("openai", &ctx, None).unwrap();
    assert_eq!(decision.request_id, ctx.request_id);

    let history = registry.decision_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].request_id, ctx.request_id);
}

// ==================== Stats ====================

#[tokio::test]
async fn test_stats_aggregate_health_and_traffic() {
    let registry = registry();
    registry
        .register_endpoint("openai", "a", "https://a.example.com", 1)
        .unwrap();
    registry
        .register_endpoint("openai", "b", "https://b.example.com", 1)
        .unwrap();
    registry
        .register_endpoint("anthropic", "c", "https://c.example.com", 1)
        .unwrap();

    for _ in 0..3 {
        registry
            .update_endpoint_metrics("openai", "a", 10.0, true)
            .unwrap();
    }
    registry
        .update_endpoint_metrics("openai", "a", 10.0, false)
        .unwrap();

    let stats = registry.stats();
    assert_eq!(stats.total_endpoints, 3);
    assert_eq!(stats.healthy, 3);
    assert_eq!(stats.total_requests, 4);
    assert!((stats.overall_success_rate - 75.0).abs() < f64::EPSILON);
    assert_eq!(stats.providers["openai"].endpoints, 2);
    assert_eq!(stats.providers["anthropic"].endpoints, 1);
}

// ==================== Health sweep ====================

#[tokio::test]
async fn test_sweep_revives_idle_recovered_endpoints() {
    let registry = registry_with(RouterConfig {
        sweep_interval_ms: 30,
        ..Default::default()
    });
    registry
        .register_endpoint("openai", "a", "https://a.example.com", 1)
        .unwrap();

    // Degrade, then clear the failure streak with one success
    registry
        .update_endpoint_metrics("openai", "a", 10.0, false)
        .unwrap();
    registry
        .update_endpoint_metrics("openai", "a", 10.0, false)
        .unwrap();
    registry
        .update_endpoint_metrics("openai", "a", 10.0, true)
        .unwrap();
    assert_eq!(
        registry.endpoint("openai", "a").unwrap().health,
        crate::router::EndpointHealth::Degraded
    );

    // Idle past twice the sweep interval, then sweep
    tokio::time::sleep(Duration::from_millis(80)).await;
    registry.sweep();

    assert_eq!(
        registry.endpoint("openai", "a").unwrap().health,
        crate::router::EndpointHealth::Healthy
    );
}

#[tokio::test]
async fn test_sweep_leaves_failing_endpoints_alone() {
    let registry = registry_with(RouterConfig {
        sweep_interval_ms: 30,
        ..Default::default()
    });
    registry
        .register_endpoint("openai", "a", "https://a.example.com", 1)
        .unwrap();
    for _ in 0..4 {
        registry
            .update_endpoint_metrics("openai", "a", 10.0, false)
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(80)).await;
    registry.sweep();

    // Still carrying a failure streak: not revived
    assert_eq!(
        registry.endpoint("openai", "a").unwrap().health,
        crate::router::EndpointHealth::Unhealthy
    );
}

#[tokio::test]
async fn test_sweep_ticker_lifecycle() {
    let registry = registry_with(RouterConfig {
        sweep_interval_ms: 20,
        ..Default::default()
    });
    assert!(!registry.sweep_running());

    registry.start_sweep();
    assert!(registry.sweep_running());

    registry.stop_sweep();
    assert!(!registry.sweep_running());
}

// ==================== Telemetry ====================

#[tokio::test]
async fn test_routing_emits_selection_metrics() {
    let sink = MemorySink::shared();
    let pipeline = TelemetryPipeline::start(sink.clone());
    let registry = Arc::new(EndpointRegistry::new(
        RouterConfig::default(),
        pipeline.handle(),
    ));
    registry
        .register_endpoint("openai", "a", "https://a.example.com", 1)
        .unwrap();

    registry
        .route_request("openai", &RouteContext::new(), None)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(sink.metric_count("router.selected"), 1);
}
