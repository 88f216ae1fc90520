//! Circuit breaker for fault tolerance
//!
//! Guards a named resource with a three-state machine: `Closed` admits
//! traffic, `Open` rejects fast, `HalfOpen` probes the resource after a
//! recovery timeout. Two opening policies are supported: a run of
//! consecutive failures, or a failure rate over a rolling window with a
//! minimum sample size.

use crate::config::{BreakerPolicy, CircuitBreakerConfig};
use crate::error::{CoreError, Result};
use crate::observability::{AuditEvent, AuditSeverity, MetricEvent, Telemetry};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests flow normally
    Closed,
    /// Requests are rejected without invoking the operation
    Open,
    /// Probe requests are admitted to test recovery
    HalfOpen,
}

/// Point-in-time view of a breaker's counters
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    /// Current state
    pub state: CircuitState,
    /// Policy-relevant failure count (consecutive run, or failures in window)
    pub failure_count: u32,
    /// Successes since the last full reset
    pub success_count: u32,
    /// Requests observed since the last full reset
    pub total_requests: u32,
    /// Time since the last failure, if any
    pub last_failure_age: Option<Duration>,
    /// Time until the next probe is admitted, when open
    pub next_attempt_in: Option<Duration>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Consecutive failures (count policy)
    failure_streak: u32,
    /// Consecutive successes while half-open
    half_open_successes: u32,
    /// Outcome log for the rate policy, pruned to the monitoring window
    window: VecDeque<(Instant, bool)>,
    total_requests: u32,
    success_count: u32,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    next_attempt_at: Option<Instant>,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_streak: 0,
            half_open_successes: 0,
            window: VecDeque::new(),
            total_requests: 0,
            success_count: 0,
            failure_count: 0,
            last_failure_at: None,
            next_attempt_at: None,
        }
    }

    fn prune_window(&mut self, now: Instant, window: Duration) {
        while let Some(&(at, _)) = self.window.front() {
            if now.duration_since(at) > window {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn window_failure_count(&self) -> u32 {
        self.window.iter().filter(|(_, ok)| !ok).count() as u32
    }
}

enum Admission {
    Allow,
    Reject { retry_after: Duration },
}

/// Per-resource failure gate
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    telemetry: Telemetry,
}

impl CircuitBreaker {
    /// Create a breaker for a named resource
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, telemetry: Telemetry) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::new()),
            telemetry,
        }
    }

    /// Resource name this breaker guards
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute an operation behind the breaker.
    ///
    /// While the circuit is open the operation future is dropped unawaited;
    /// if a `fallback` is supplied its result is returned instead of
    /// [`CoreError::CircuitOpen`].
    pub async fn execute<T, Fut, FB>(&self, op: Fut, fallback: Option<FB>) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
        FB: FnOnce() -> T,
    {
        match self.admit() {
            Admission::Reject { retry_after } => {
                self.telemetry.metric(
                    MetricEvent::new("circuit_breaker.rejected", 1.0)
                        .with_tag("resource", &self.name),
                );
                if let Some(fb) = fallback {
                    debug!(
                        "circuit '{}' open, serving fallback (next attempt in {:?})",
                        self.name, retry_after
                    );
                    return Ok(fb());
                }
                return Err(CoreError::CircuitOpen {
                    resource: self.name.clone(),
                    retry_after,
                });
            }
            Admission::Allow => {}
        }

        match op.await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }

    /// Current state. The open → half-open transition happens on the next
    /// admitted call, not on reads.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Counters as of now
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        let now = Instant::now();
        let failure_count = match self.config.policy {
            BreakerPolicy::ConsecutiveFailures => inner.failure_streak,
            BreakerPolicy::FailureRate => inner.window_failure_count(),
        };
        BreakerSnapshot {
            state: inner.state,
            failure_count,
            success_count: inner.success_count,
            total_requests: inner.total_requests,
            last_failure_age: inner.last_failure_at.map(|at| now.duration_since(at)),
            next_attempt_in: inner
                .next_attempt_at
                .filter(|_| inner.state == CircuitState::Open)
                .map(|at| at.saturating_duration_since(now)),
        }
    }

    /// Force the breaker back to closed with cleared counters
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        *inner = BreakerInner::new();
        debug!("circuit '{}' reset", self.name);
    }

    fn admit(&self) -> Admission {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Admission::Allow,
            CircuitState::Open => {
                let now = Instant::now();
                let next = inner.next_attempt_at.unwrap_or(now);
                if now >= next {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    drop(inner);
                    debug!("circuit '{}' half-open, probing", self.name);
                    self.transition_metric("half_open");
                    Admission::Allow
                } else {
                    Admission::Reject {
                        retry_after: next - now,
                    }
                }
            }
        }
    }

    fn on_success(&self) {
        let mut closed = false;
        {
            let mut inner = self.inner.lock();
            inner.total_requests += 1;
            inner.success_count += 1;

            match inner.state {
                CircuitState::Closed => match self.config.policy {
                    BreakerPolicy::ConsecutiveFailures => inner.failure_streak = 0,
                    BreakerPolicy::FailureRate => {
                        let now = Instant::now();
                        inner.window.push_back((now, true));
                        inner.prune_window(now, self.config.monitoring_window());
                    }
                },
                CircuitState::HalfOpen => {
                    inner.half_open_successes += 1;
                    if inner.half_open_successes >= self.config.success_threshold {
                        *inner = BreakerInner::new();
                        closed = true;
                    }
                }
                // Late completion from before the circuit opened
                CircuitState::Open => {}
            }
        }
        if closed {
            debug!("circuit '{}' closed after successful probes", self.name);
            self.transition_metric("closed");
        }
    }

    fn on_failure(&self) {
        let now = Instant::now();
        let mut opened = false;
        {
            let mut inner = self.inner.lock();
            inner.total_requests += 1;
            inner.failure_count += 1;
            inner.last_failure_at = Some(now);

            match inner.state {
                CircuitState::HalfOpen => {
                    Self::open_circuit(&mut inner, now, self.config.recovery_timeout());
                    opened = true;
                }
                CircuitState::Closed => {
                    let should_open = match self.config.policy {
                        BreakerPolicy::ConsecutiveFailures => {
                            inner.failure_streak += 1;
                            inner.total_requests >= self.config.minimum_requests
                                && inner.failure_streak >= self.config.failure_threshold
                        }
                        BreakerPolicy::FailureRate => {
                            inner.window.push_back((now, false));
                            inner.prune_window(now, self.config.monitoring_window());
                            let total = inner.window.len() as u32;
                            let failures = inner.window_failure_count();
                            total >= self.config.minimum_requests
                                && failures as f64 / total as f64 >= self.config.failure_rate
                        }
                    };
                    if should_open {
                        Self::open_circuit(&mut inner, now, self.config.recovery_timeout());
                        opened = true;
                    }
                }
                CircuitState::Open => {}
            }
        }
        if opened {
            warn!(
                "circuit '{}' opened, rejecting for {:?}",
                self.name,
                self.config.recovery_timeout()
            );
            self.transition_metric("open");
            self.telemetry.audit(AuditEvent::new(
                "circuit_opened",
                "rejecting",
                AuditSeverity::High,
                serde_json::json!({
                    "resource": self.name,
                    "recovery_timeout_ms": self.config.recovery_timeout_ms,
                }),
            ));
        }
    }

    fn open_circuit(inner: &mut BreakerInner, now: Instant, recovery: Duration) {
        inner.state = CircuitState::Open;
        inner.next_attempt_at = Some(now + recovery);
        inner.half_open_successes = 0;
    }

    fn transition_metric(&self, to: &str) {
        self.telemetry.metric(
            MetricEvent::new("circuit_breaker.transition", 1.0)
                .with_tag("resource", &self.name)
                .with_tag("to", to),
        );
    }
}
