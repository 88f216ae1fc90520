//! Interval task with an explicit lifecycle
//!
//! Background maintenance (health sweeps, record cleanup) runs on tickers
//! owned by the component that needs them, so shutdown is deterministic and
//! tests can drive the schedule under tokio's paused clock instead of
//! waiting on wall time.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Handle to a periodic background task
#[derive(Debug)]
pub struct Ticker {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawn a task invoking `tick` every `period`. The first invocation
    /// happens one full period after the spawn.
    pub fn start<F, Fut>(name: &'static str, period: Duration, tick: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Swallow the immediate first tick so the cadence is uniform
            interval.tick().await;
            loop {
                interval.tick().await;
                tick().await;
            }
        });
        debug!("ticker '{}' started with period {:?}", name, period);

        Self {
            name,
            handle: Some(handle),
        }
    }

    /// Whether the underlying task is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the task. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("ticker '{}' stopped", self.name);
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
