//! Sink boundary for metrics and audit events
//!
//! The core has no opinion about where telemetry lands; the embedding
//! application implements [`EventSink`] against its own metrics registry
//! and audit store.

use super::events::{AuditEvent, MetricEvent};
use parking_lot::Mutex;
use std::sync::Arc;

/// Receiver for the core's fire-and-forget side-channel events.
///
/// Implementations must not assume they are called on any particular task;
/// slow or failing sinks degrade only telemetry, never the request path.
pub trait EventSink: Send + Sync {
    /// A metric sample was recorded
    fn record_metric(&self, metric: &MetricEvent);

    /// A security-relevant event occurred
    fn security_event(&self, event: &AuditEvent);
}

/// Sink that discards everything
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record_metric(&self, _metric: &MetricEvent) {}

    fn security_event(&self, _event: &AuditEvent) {}
}

/// Sink that retains events in memory, for assertions in tests and for
/// lightweight embedding scenarios without a metrics backend.
#[derive(Debug, Default)]
pub struct MemorySink {
    metrics: Mutex<Vec<MetricEvent>>,
    audits: Mutex<Vec<AuditEvent>>,
}

impl MemorySink {
    /// Create an empty sink behind an `Arc` ready to hand to a pipeline
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Copy of all metrics seen so far
    pub fn metrics(&self) -> Vec<MetricEvent> {
        self.metrics.lock().clone()
    }

    /// Copy of all audit events seen so far
    pub fn audits(&self) -> Vec<AuditEvent> {
        self.audits.lock().clone()
    }

    /// Number of metrics whose name matches exactly
    pub fn metric_count(&self, name: &str) -> usize {
        self.metrics.lock().iter().filter(|m| m.name == name).count()
    }
}

impl EventSink for MemorySink {
    fn record_metric(&self, metric: &MetricEvent) {
        self.metrics.lock().push(metric.clone());
    }

    fn security_event(&self, event: &AuditEvent) {
        self.audits.lock().push(event.clone());
    }
}
