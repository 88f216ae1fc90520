//! Default values for configuration models

pub(super) fn default_failure_threshold() -> u32 {
    5
}

pub(super) fn default_success_threshold() -> u32 {
    3
}

pub(super) fn default_minimum_requests() -> u32 {
    10
}

pub(super) fn default_operation_timeout_ms() -> u64 {
    30_000
}

pub(super) fn default_recovery_timeout_ms() -> u64 {
    60_000
}

pub(super) fn default_monitoring_window_ms() -> u64 {
    60_000
}

pub(super) fn default_failure_rate() -> f64 {
    0.5
}

pub(super) fn default_max_attempts() -> u32 {
    3
}

pub(super) fn default_base_delay_ms() -> u64 {
    100
}

pub(super) fn default_max_delay_ms() -> u64 {
    30_000
}

pub(super) fn default_max_concurrency() -> usize {
    10
}

pub(super) fn default_queue_size() -> usize {
    20
}

pub(super) fn default_queue_timeout_ms() -> u64 {
    5_000
}

pub(super) fn default_window_ms() -> u64 {
    60_000
}

pub(super) fn default_max_requests() -> u32 {
    60
}

pub(super) fn default_rapid_window_ms() -> u64 {
    1_000
}

pub(super) fn default_rapid_threshold() -> u32 {
    10
}

pub(super) fn default_rapid_score() -> u32 {
    2
}

pub(super) fn default_agent_score() -> u32 {
    3
}

pub(super) fn default_suspicious_threshold() -> u32 {
    10
}

pub(super) fn default_block_duration_ms() -> u64 {
    300_000
}

pub(super) fn default_endpoint_failure_threshold() -> u32 {
    4
}

pub(super) fn default_sweep_interval_ms() -> u64 {
    30_000
}

pub(super) fn default_history_capacity() -> usize {
    1_000
}

pub(super) fn default_strategy() -> String {
    "weighted_round_robin".to_string()
}

pub(super) fn default_true() -> bool {
    true
}
