//! Side-channel event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named metric sample
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvent {
    /// Metric name, dot-separated (e.g. `circuit_breaker.open`)
    pub name: String,
    /// Sample value
    pub value: f64,
    /// Dimension tags
    pub tags: Vec<(String, String)>,
}

impl MetricEvent {
    /// Build a metric sample
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            tags: Vec::new(),
        }
    }

    /// Attach a dimension tag (builder pattern)
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }
}

/// Severity of a security-relevant event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    /// Routine observation
    Info,
    /// Worth reviewing
    Warning,
    /// Degraded protection or repeated anomaly
    High,
    /// Active countermeasure taken
    Critical,
}

/// A security-relevant event destined for the external audit store
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// What happened (e.g. `circuit_opened`, `ip_blocked`)
    pub action: String,
    /// Outcome of the action (e.g. `rejected`, `blocked`)
    pub outcome: String,
    /// Severity
    pub severity: AuditSeverity,
    /// Structured detail payload
    pub details: serde_json::Value,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Build an audit event stamped with the current time
    pub fn new(
        action: impl Into<String>,
        outcome: impl Into<String>,
        severity: AuditSeverity,
        details: serde_json::Value,
    ) -> Self {
        Self {
            action: action.into(),
            outcome: outcome.into(),
            severity,
            details,
            timestamp: Utc::now(),
        }
    }
}

/// Event envelope carried by the telemetry pipeline
#[derive(Debug, Clone)]
pub(crate) enum TelemetryEvent {
    Metric(MetricEvent),
    Audit(AuditEvent),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metric_event_builder() {
        let metric = MetricEvent::new("router.selected", 1.0)
            .with_tag("provider", "openai")
            .with_tag("strategy", "weighted_round_robin");

        assert_eq!(metric.name, "router.selected");
        assert_eq!(metric.tags.len(), 2);
    }

    #[test]
    fn test_audit_severity_ordering() {
        assert!(AuditSeverity::Critical > AuditSeverity::High);
        assert!(AuditSeverity::High > AuditSeverity::Warning);
        assert!(AuditSeverity::Warning > AuditSeverity::Info);
    }

    #[test]
    fn test_audit_event_carries_details() {
        let event = AuditEvent::new(
            "ip_blocked",
            "blocked",
            AuditSeverity::Critical,
            json!({"ip": "10.0.0.1", "score": 12}),
        );
        assert_eq!(event.details["ip"], "10.0.0.1");
        assert_eq!(event.severity, AuditSeverity::Critical);
    }
}
