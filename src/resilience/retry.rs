//! Bounded retry with exponential backoff and jitter

use crate::config::RetryConfig;
use crate::error::{CoreError, Result};
use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Retry executor for transient failures
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a retry policy
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute `op`, retrying failures up to `max_attempts` total attempts.
    ///
    /// Every failure surfacing from `op` is retried alike; callers that
    /// must not retry a class of error should not route it through a retry
    /// layer. After the final attempt the last failure is returned wrapped
    /// in [`CoreError::RetryExhausted`], with no further delay.
    pub async fn execute<F, Fut, T>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("attempt {} succeeded after {} retries", attempt, attempt - 1);
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if attempt == max_attempts {
                        debug!("attempt {} failed, budget exhausted: {}", attempt, err);
                        return Err(CoreError::RetryExhausted {
                            attempts: max_attempts,
                            source: Box::new(err),
                        });
                    }
                    let delay = self.delay_for_attempt(attempt);
                    debug!(
                        "attempt {} failed ({}), retrying in {:?}",
                        attempt, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        // The loop always returns out of its final iteration
        Err(CoreError::Internal("retry loop fell through".to_string()))
    }

    /// Delay applied after failed attempt `attempt` (1-based)
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay_ms;
        let raw_ms = if self.config.exponential_backoff {
            base.saturating_mul(1u64 << (attempt - 1).min(62))
                .min(self.config.max_delay_ms)
        } else {
            base
        };

        if self.config.jitter {
            let spread = rand::thread_rng().gen_range(-0.25..=0.25);
            let jittered = raw_ms as f64 * (1.0 + spread);
            Duration::from_millis(jittered.max(0.0) as u64)
        } else {
            Duration::from_millis(raw_ms)
        }
    }
}
