//! # resilience-core
//!
//! Traffic-resilience and adaptive-routing core for applications calling a
//! set of interchangeable HTTP-based AI provider backends. The crate
//! admits, throttles, routes, and fails over outbound requests so that no
//! single slow or failing backend degrades the whole system.
//!
//! ## Components
//!
//! - [`resilience::CircuitBreaker`] — per-resource failure gate with a
//!   three-state machine and two opening policies
//! - [`resilience::RetryPolicy`] — bounded retry with exponential backoff
//!   and jitter
//! - [`resilience::Bulkhead`] — bounded concurrency with a FIFO wait queue
//! - [`rate_limit::RateLimiter`] — sliding-window / token-bucket admission
//!   over a pluggable (local or shared) store, plus abuse detection
//! - [`router::EndpointRegistry`] — per-endpoint health, capacity, and
//!   performance tracking with pluggable selection strategies
//! - [`resilience::Orchestrator`] — composes timeout, retry, bulkhead, and
//!   circuit breaker around a caller-supplied operation
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use resilience_core::config::CoreConfig;
//! use resilience_core::observability::Telemetry;
//! use resilience_core::resilience::{ExecutionOptions, Orchestrator};
//! use resilience_core::router::{EndpointRegistry, RouteContext};
//! use std::sync::Arc;
//!
//! # async fn call_backend(url: url::Url) -> resilience_core::Result<String> { Ok(String::new()) }
//! #[tokio::main]
//! async fn main() -> resilience_core::Result<()> {
//!     let config = CoreConfig::default();
//!     let telemetry = Telemetry::disabled();
//!
//!     let registry = Arc::new(EndpointRegistry::new(config.router.clone(), telemetry.clone()));
//!     registry.register_endpoint("openai", "primary", "https://api.openai.com/v1", 100)?;
//!     registry.start_sweep();
//!
//!     let orchestrator = Orchestrator::new(config.circuit_breaker.clone(), telemetry);
//!
//!     let decision = registry.route_request("openai", &RouteContext::new(), None)?;
//!     let opts = ExecutionOptions::for_provider(&config, "openai");
//!     let url = decision.selected.base_url.clone();
//!     let response = orchestrator
//!         .execute("openai", move || call_backend(url.clone()), &opts)
//!         .await;
//!
//!     let elapsed_ms = 120.0;
//!     registry.update_endpoint_metrics(
//!         &decision.selected.provider,
//!         &decision.selected.id,
//!         elapsed_ms,
//!         response.is_ok(),
//!     )?;
//!     response.map(|_| ())
//! }
//! ```
//!
//! The crate is a library boundary, not a network service: HTTP transport,
//! provider payload handling, and caller authentication belong to the
//! embedding application, which also receives all metrics and audit events
//! through the [`observability::EventSink`] it supplies.

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod observability;
pub mod rate_limit;
pub mod resilience;
pub mod router;
pub mod ticker;

pub use config::CoreConfig;
pub use error::{CoreError, Result};
pub use observability::{EventSink, Telemetry, TelemetryPipeline};
pub use rate_limit::{AbuseDetector, RateLimitDecision, RateLimiter};
pub use resilience::{CircuitBreaker, CircuitBreakerManager, ExecutionOptions, Orchestrator};
pub use router::{EndpointRegistry, RouteContext, RoutingDecision};
pub use ticker::Ticker;
