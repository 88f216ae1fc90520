//! Metrics and audit side-channel
//!
//! Everything here is fire-and-forget by construction: the request path
//! emits through a bounded channel and never learns whether delivery
//! succeeded.

mod events;
mod pipeline;
mod sink;

pub use events::{AuditEvent, AuditSeverity, MetricEvent};
pub use pipeline::{DEFAULT_PIPELINE_CAPACITY, Telemetry, TelemetryPipeline};
pub use sink::{EventSink, MemorySink, NullSink};
