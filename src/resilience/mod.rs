//! Execution-path guards
//!
//! The layers that sit between a routed request and the wire: circuit
//! breaking, bounded retry, bulkhead isolation, and per-attempt timeouts,
//! plus the orchestrator that composes them.

mod bulkhead;
mod circuit_breaker;
mod manager;
mod orchestrator;
mod retry;

pub use bulkhead::{Bulkhead, BulkheadStats};
pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use manager::CircuitBreakerManager;
pub use orchestrator::{ExecutionOptions, Orchestrator};
pub use retry::RetryPolicy;
