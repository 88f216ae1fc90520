//! Request admission control
//!
//! Pre-routing gate: a per-key request budget enforced by a pluggable
//! algorithm over a pluggable store, plus an orthogonal abuse-detection
//! layer that blocklists suspicious sources.

mod abuse;
mod limiter;
mod store;
mod types;

#[cfg(feature = "redis")]
mod redis_store;

#[cfg(test)]
mod tests;

pub use abuse::{AbuseDetector, AbuseVerdict};
pub use limiter::RateLimiter;
pub use store::{MemoryStore, RateLimitStore};
pub use types::RateLimitDecision;

#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
