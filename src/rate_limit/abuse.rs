//! Abuse detection
//!
//! Orthogonal to the request-budget limiter: accumulates a per-source
//! suspicion score from rapid-fire bursts and automation user agents, and
//! blocklists a source once the score crosses the configured threshold.
//! Blocks expire on a schedule; expiry is also applied lazily on lookup so
//! a stalled runtime never extends a block.

use crate::config::AbuseConfig;
use crate::observability::{AuditEvent, AuditSeverity, MetricEvent, Telemetry};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// User-agent fragments typical of unattended clients
static AUTOMATION_SIGNATURES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        "curl",
        "wget",
        "python-requests",
        "python-urllib",
        "go-http-client",
        "java/",
        "okhttp",
        "scrapy",
        "httpclient",
        "headless",
        "phantomjs",
        "selenium",
        "bot",
        "crawler",
        "spider",
    ]
    .iter()
    .map(|sig| Regex::new(&format!("(?i){}", regex::escape(sig))).expect("static pattern"))
    .collect()
});

/// Result of inspecting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbuseVerdict {
    /// The source is currently blocklisted
    pub blocked: bool,
    /// Suspicion score after this observation
    pub score: u32,
}

#[derive(Debug, Default)]
struct SuspicionRecord {
    score: u32,
    recent: VecDeque<Instant>,
}

/// Per-source suspicion scoring and blocklisting
pub struct AbuseDetector {
    config: AbuseConfig,
    records: DashMap<String, SuspicionRecord>,
    blocklist: Arc<DashMap<String, Instant>>,
    extra_signatures: Vec<Regex>,
    telemetry: Telemetry,
}

impl AbuseDetector {
    /// Create a detector; invalid extra signatures are dropped with a warning
    pub fn new(config: AbuseConfig, telemetry: Telemetry) -> Self {
        let extra_signatures = config
            .extra_agent_signatures
            .iter()
            .filter_map(|pattern| match Regex::new(&format!("(?i){}", pattern)) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!("ignoring invalid agent signature '{}': {}", pattern, err);
                    None
                }
            })
            .collect();

        Self {
            config,
            records: DashMap::new(),
            blocklist: Arc::new(DashMap::new()),
            extra_signatures,
            telemetry,
        }
    }

    /// Observe one request from `source` (an IP or caller identity).
    /// Returns whether the source is blocked and its current score.
    pub fn inspect(&self, source: &str, user_agent: Option<&str>) -> AbuseVerdict {
        if !self.config.enabled {
            return AbuseVerdict {
                blocked: false,
                score: 0,
            };
        }

        if self.is_blocked(source) {
            self.telemetry.metric(
                MetricEvent::new("abuse.rejected", 1.0).with_tag("source", source),
            );
            return AbuseVerdict {
                blocked: true,
                score: self.config.suspicious_threshold,
            };
        }

        let now = Instant::now();
        let mut record = self.records.entry(source.to_string()).or_default();

        record.recent.push_back(now);
        let rapid_window = self.config.rapid_window();
        while let Some(&front) = record.recent.front() {
            if now.duration_since(front) > rapid_window {
                record.recent.pop_front();
            } else {
                break;
            }
        }

        if record.recent.len() as u32 > self.config.rapid_threshold {
            record.score += self.config.rapid_score;
            debug!(
                "rapid-fire burst from '{}': {} requests in {:?}",
                source,
                record.recent.len(),
                rapid_window
            );
        }

        if let Some(agent) = user_agent {
            if self.matches_signature(agent) {
                record.score += self.config.agent_score;
                debug!("automation user agent from '{}': {}", source, agent);
            }
        }

        let score = record.score;
        drop(record);

        if score >= self.config.suspicious_threshold {
            self.block(source, score);
            return AbuseVerdict {
                blocked: true,
                score,
            };
        }

        AbuseVerdict {
            blocked: false,
            score,
        }
    }

    /// Whether `source` is currently blocklisted; expired blocks are
    /// removed on lookup
    pub fn is_blocked(&self, source: &str) -> bool {
        match self.blocklist.get(source).map(|until| *until) {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                self.blocklist.remove(source);
                false
            }
            None => false,
        }
    }

    /// Remove a source from the blocklist and clear its score
    pub fn unblock(&self, source: &str) {
        self.blocklist.remove(source);
        self.records.remove(source);
        debug!("'{}' removed from blocklist", source);
    }

    /// Number of sources currently blocklisted
    pub fn blocked_count(&self) -> usize {
        self.blocklist.len()
    }

    fn matches_signature(&self, agent: &str) -> bool {
        AUTOMATION_SIGNATURES
            .iter()
            .chain(self.extra_signatures.iter())
            .any(|re| re.is_match(agent))
    }

    fn block(&self, source: &str, score: u32) {
        let duration = self.config.block_duration();
        let until = Instant::now() + duration;
        self.blocklist.insert(source.to_string(), until);
        self.records.remove(source);

        warn!(
            "'{}' blocklisted for {:?} (score {})",
            source, duration, score
        );
        self.telemetry.audit(AuditEvent::new(
            "source_blocked",
            "blocked",
            AuditSeverity::Critical,
            serde_json::json!({
                "source": source,
                "score": score,
                "block_duration_ms": self.config.block_duration_ms,
            }),
        ));

        // Scheduled unblock; lazy expiry in is_blocked() covers the case
        // where this task never runs
        let blocklist = self.blocklist.clone();
        let source = source.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let expired = blocklist
                .get(&source)
                .map(|entry| Instant::now() >= *entry)
                .unwrap_or(false);
            if expired {
                blocklist.remove(&source);
                debug!("'{}' block expired", source);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn detector(config: AbuseConfig) -> AbuseDetector {
        AbuseDetector::new(config, Telemetry::disabled())
    }

    fn strict() -> AbuseConfig {
        AbuseConfig {
            rapid_window_ms: 60_000,
            rapid_threshold: 3,
            rapid_score: 2,
            agent_score: 3,
            suspicious_threshold: 6,
            block_duration_ms: 100,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_normal_traffic_accumulates_nothing() {
        let d = detector(strict());
        let verdict = d.inspect("10.0.0.1", Some("Mozilla/5.0 (Macintosh)"));
        assert!(!verdict.blocked);
        assert_eq!(verdict.score, 0);
    }

    #[tokio::test]
    async fn test_automation_agent_raises_score() {
        let d = detector(strict());
        let verdict = d.inspect("10.0.0.1", Some("curl/8.4.0"));
        assert!(!verdict.blocked);
        assert_eq!(verdict.score, 3);
    }

    #[tokio::test]
    async fn test_rapid_fire_plus_agent_blocks() {
        let d = detector(strict());

        // Burst past the rapid threshold with an automation agent; the
        // combined score crosses the blocklist threshold
        let mut blocked = false;
        for _ in 0..6 {
            blocked = d.inspect("10.0.0.9", Some("python-requests/2.31")).blocked;
        }
        assert!(blocked);
        assert!(d.is_blocked("10.0.0.9"));
        assert_eq!(d.blocked_count(), 1);
    }

    #[tokio::test]
    async fn test_block_expires() {
        let d = detector(strict());
        for _ in 0..6 {
            d.inspect("10.0.0.9", Some("curl/8.4.0"));
        }
        assert!(d.is_blocked("10.0.0.9"));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!d.is_blocked("10.0.0.9"));

        // A fresh request starts from a clean score
        let verdict = d.inspect("10.0.0.9", Some("Mozilla/5.0"));
        assert!(!verdict.blocked);
        assert_eq!(verdict.score, 0);
    }

    #[tokio::test]
    async fn test_manual_unblock() {
        let d = detector(AbuseConfig {
            block_duration_ms: 60_000,
            ..strict()
        });
        for _ in 0..6 {
            d.inspect("10.0.0.9", Some("curl/8.4.0"));
        }
        assert!(d.is_blocked("10.0.0.9"));

        d.unblock("10.0.0.9");
        assert!(!d.is_blocked("10.0.0.9"));
    }

    #[tokio::test]
    async fn test_extra_signatures_honored() {
        let d = detector(AbuseConfig {
            extra_agent_signatures: vec!["internal-probe".to_string()],
            ..strict()
        });
        let verdict = d.inspect("10.0.0.1", Some("Internal-Probe/1.0"));
        assert_eq!(verdict.score, 3);
    }

    #[tokio::test]
    async fn test_disabled_detector_is_inert() {
        let d = detector(AbuseConfig {
            enabled: false,
            ..strict()
        });
        for _ in 0..50 {
            let verdict = d.inspect("10.0.0.9", Some("curl/8.4.0"));
            assert!(!verdict.blocked);
        }
    }

    #[tokio::test]
    async fn test_blocked_source_stays_blocked_within_window() {
        let d = detector(AbuseConfig {
            block_duration_ms: 60_000,
            ..strict()
        });
        for _ in 0..6 {
            d.inspect("10.0.0.9", Some("curl/8.4.0"));
        }

        let verdict = d.inspect("10.0.0.9", Some("Mozilla/5.0"));
        assert!(verdict.blocked);
    }
}
