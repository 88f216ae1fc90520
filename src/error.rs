//! Error handling for the resilience core
//!
//! This module defines all error types produced by the admission,
//! throttling, and routing layers.

use crate::router::RoutingError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for the resilience core
pub type Result<T> = std::result::Result<T, CoreError>;

/// Main error type for the resilience core
#[derive(Error, Debug)]
pub enum CoreError {
    /// The circuit for a resource is open and the call was rejected fast
    #[error("circuit open for '{resource}', next attempt in {retry_after:?}")]
    CircuitOpen {
        /// Resource the circuit guards
        resource: String,
        /// Time remaining until the next probe is admitted
        retry_after: Duration,
    },

    /// The wrapped operation exceeded its deadline
    #[error("operation timed out after {elapsed:?}")]
    Timeout {
        /// Time spent before the deadline fired
        elapsed: Duration,
    },

    /// Bulkhead wait queue is at capacity
    #[error("bulkhead '{name}' queue full ({queue_size} waiting)")]
    BulkheadQueueFull {
        /// Bulkhead name
        name: String,
        /// Configured queue bound
        queue_size: usize,
    },

    /// A queued bulkhead waiter exceeded its wait budget
    #[error("bulkhead '{name}' queue wait exceeded after {waited:?}")]
    BulkheadQueueTimeout {
        /// Bulkhead name
        name: String,
        /// Time spent waiting in the queue
        waited: Duration,
    },

    /// Admission denied by the rate limiter
    #[error("rate limit exceeded for '{key}', retry after {retry_after_ms}ms")]
    RateLimited {
        /// Rate-limit key that was throttled
        key: String,
        /// Milliseconds until the next request may be admitted
        retry_after_ms: u64,
    },

    /// Endpoint selection failed
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    /// All retry attempts failed; carries the last underlying failure
    #[error("retry budget exhausted after {attempts} attempts")]
    RetryExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Last failure observed
        #[source]
        source: Box<CoreError>,
    },

    /// Configuration rejected at construction time
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rate-limit store failure (shared backend unreachable or corrupt)
    #[error("rate-limit store error: {0}")]
    Store(String),

    /// Failure surfaced by the wrapped operation itself
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// Internal invariant violation
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Peel retry wrapping to reach the failure that actually occurred.
    pub fn root_cause(&self) -> &CoreError {
        match self {
            CoreError::RetryExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the error is a local admission rejection rather than an
    /// upstream failure. Admission rejections are never retried by the core.
    pub fn is_admission_rejection(&self) -> bool {
        matches!(
            self,
            CoreError::CircuitOpen { .. }
                | CoreError::BulkheadQueueFull { .. }
                | CoreError::BulkheadQueueTimeout { .. }
                | CoreError::RateLimited { .. }
        )
    }
}
