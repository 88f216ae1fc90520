//! Bulkhead for resource isolation
//!
//! Bounds the number of operations in flight against one resource and
//! queues a limited number of waiters FIFO. Waiters past the queue bound
//! are rejected immediately; queued waiters are rejected once their wait
//! budget elapses. One slow backend therefore saturates its own bulkhead
//! and nothing else.

use crate::config::BulkheadConfig;
use crate::error::{CoreError, Result};
use crate::observability::{MetricEvent, Telemetry};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::debug;

/// Point-in-time bulkhead load
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulkheadStats {
    /// Operations currently dispatched
    pub active: usize,
    /// Waiters currently queued
    pub queued: usize,
    /// `active / max_concurrency`
    pub utilization: f64,
}

/// Bounded-concurrency admission gate with a FIFO wait queue
pub struct Bulkhead {
    name: String,
    semaphore: Arc<Semaphore>,
    config: BulkheadConfig,
    active: AtomicUsize,
    queued: AtomicUsize,
    telemetry: Telemetry,
}

impl Bulkhead {
    /// Create a bulkhead for a named resource
    pub fn new(name: impl Into<String>, config: BulkheadConfig, telemetry: Telemetry) -> Self {
        Self {
            name: name.into(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            config,
            active: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            telemetry,
        }
    }

    /// Resource name this bulkhead isolates
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute an operation inside an admission slot.
    ///
    /// A slot is held for the whole lifetime of `op`, so when `op` is a
    /// retry sequence the sequence as a whole occupies one slot. Queued
    /// waiters are served strictly in arrival order, except that a waiter
    /// whose budget expires leaves the queue early with
    /// [`CoreError::BulkheadQueueTimeout`].
    pub async fn execute<T, Fut>(&self, op: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => self.wait_for_permit().await?,
        };

        self.active.fetch_add(1, Ordering::AcqRel);
        let result = op.await;
        self.active.fetch_sub(1, Ordering::AcqRel);
        drop(permit);

        result
    }

    /// Current load
    pub fn stats(&self) -> BulkheadStats {
        let active = self.active.load(Ordering::Acquire);
        BulkheadStats {
            active,
            queued: self.queued.load(Ordering::Acquire),
            utilization: active as f64 / self.config.max_concurrency.max(1) as f64,
        }
    }

    /// Fraction of concurrency capacity in use
    pub fn utilization(&self) -> f64 {
        self.stats().utilization
    }

    /// Join the bounded FIFO queue and wait for a slot
    async fn wait_for_permit(&self) -> Result<tokio::sync::OwnedSemaphorePermit> {
        // Reserve a queue position; compare-exchange so concurrent callers
        // cannot overshoot the bound between load and increment.
        let mut queued = self.queued.load(Ordering::Acquire);
        loop {
            if queued >= self.config.queue_size {
                self.telemetry.metric(
                    MetricEvent::new("bulkhead.rejected", 1.0)
                        .with_tag("resource", &self.name)
                        .with_tag("reason", "queue_full"),
                );
                debug!(
                    "bulkhead '{}' queue full ({} waiting)",
                    self.name, queued
                );
                return Err(CoreError::BulkheadQueueFull {
                    name: self.name.clone(),
                    queue_size: self.config.queue_size,
                });
            }
            match self.queued.compare_exchange(
                queued,
                queued + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(current) => queued = current,
            }
        }

        let enqueued_at = Instant::now();
        let acquired = tokio::time::timeout(
            self.config.queue_timeout(),
            self.semaphore.clone().acquire_owned(),
        )
        .await;
        self.queued.fetch_sub(1, Ordering::AcqRel);

        match acquired {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(CoreError::Internal(format!(
                "bulkhead '{}' semaphore closed",
                self.name
            ))),
            Err(_) => {
                self.telemetry.metric(
                    MetricEvent::new("bulkhead.rejected", 1.0)
                        .with_tag("resource", &self.name)
                        .with_tag("reason", "queue_timeout"),
                );
                debug!(
                    "bulkhead '{}' waiter timed out after {:?}",
                    self.name,
                    enqueued_at.elapsed()
                );
                Err(CoreError::BulkheadQueueTimeout {
                    name: self.name.clone(),
                    waited: enqueued_at.elapsed(),
                })
            }
        }
    }
}
