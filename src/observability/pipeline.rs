//! Bounded telemetry pipeline
//!
//! Components emit events through a cheap [`Telemetry`] handle into a
//! bounded channel; a background task drains the channel into the
//! application-supplied sink. Emission never blocks and never surfaces a
//! failure into the request path: when the channel is full the event is
//! dropped and counted, and a panicking sink only loses the one event.

use super::events::{AuditEvent, MetricEvent, TelemetryEvent};
use super::sink::EventSink;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default channel capacity
pub const DEFAULT_PIPELINE_CAPACITY: usize = 1_024;

/// Cheap cloneable emitter handle held by every component
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    tx: Option<mpsc::Sender<TelemetryEvent>>,
    dropped: Arc<AtomicU64>,
}

impl Telemetry {
    /// Handle that discards all events
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Emit a metric sample; silently dropped on overflow
    pub fn metric(&self, metric: MetricEvent) {
        self.send(TelemetryEvent::Metric(metric));
    }

    /// Emit an audit event; silently dropped on overflow
    pub fn audit(&self, event: AuditEvent) {
        self.send(TelemetryEvent::Audit(event));
    }

    /// Events dropped because the channel was full
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn send(&self, event: TelemetryEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.try_send(event).is_err() {
            // Full or closed; the request path must not care either way.
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Owns the drain task; dropping or stopping the pipeline detaches all
/// outstanding [`Telemetry`] handles into no-ops once the channel closes.
#[derive(Debug)]
pub struct TelemetryPipeline {
    handle: Telemetry,
    worker: Option<JoinHandle<()>>,
}

impl TelemetryPipeline {
    /// Start a pipeline draining into `sink` with the default capacity
    pub fn start(sink: Arc<dyn EventSink>) -> Self {
        Self::with_capacity(sink, DEFAULT_PIPELINE_CAPACITY)
    }

    /// Start a pipeline with an explicit channel capacity
    pub fn with_capacity(sink: Arc<dyn EventSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<TelemetryEvent>(capacity.max(1));

        let worker = tokio::spawn(async move {
            debug!("telemetry pipeline started");
            while let Some(event) = rx.recv().await {
                let outcome = catch_unwind(AssertUnwindSafe(|| match &event {
                    TelemetryEvent::Metric(metric) => sink.record_metric(metric),
                    TelemetryEvent::Audit(audit) => sink.security_event(audit),
                }));
                if outcome.is_err() {
                    warn!("telemetry sink panicked; event discarded");
                }
            }
            debug!("telemetry pipeline drained");
        });

        Self {
            handle: Telemetry {
                tx: Some(tx),
                dropped: Arc::new(AtomicU64::new(0)),
            },
            worker: Some(worker),
        }
    }

    /// Emitter handle for components
    pub fn handle(&self) -> Telemetry {
        self.handle.clone()
    }

    /// Stop the drain task. Events already queued are lost; emitters keep
    /// working but their events count as dropped.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl Drop for TelemetryPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
