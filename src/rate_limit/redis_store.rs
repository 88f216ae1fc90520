//! Redis-backed rate-limit store
//!
//! Shares admission state across processes. Each check runs as one Lua
//! script, so the check and the consume land in a single atomic round
//! trip regardless of how many gateway processes share the backend.

use super::store::RateLimitStore;
use super::types::RateLimitDecision;
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local member = ARGV[4]
redis.call('ZREMRANGEBYSCORE', key, 0, now - window)
local count = redis.call('ZCARD', key)
if count >= limit then
  local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
  local retry = window
  if oldest[2] then
    retry = window - (now - tonumber(oldest[2]))
  end
  return {0, 0, retry}
end
redis.call('ZADD', key, now, member)
redis.call('PEXPIRE', key, window)
return {1, limit - count - 1, 0}
"#;

const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local rate_per_ms = tonumber(ARGV[3])
local state = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(state[1])
local last = tonumber(state[2])
if tokens == nil then tokens = capacity end
if last == nil then last = now end
tokens = math.min(capacity, tokens + (now - last) * rate_per_ms)
local allowed = 0
local retry = 0
if tokens >= 1 then
  tokens = tokens - 1
  allowed = 1
elseif rate_per_ms > 0 then
  retry = math.ceil((1 - tokens) / rate_per_ms)
end
redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
if rate_per_ms > 0 then
  redis.call('PEXPIRE', key, math.ceil(capacity / rate_per_ms))
end
return {allowed, math.floor(tokens), retry}
"#;

/// Store backed by a shared Redis instance
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
    sliding_window: Script,
    token_bucket: Script,
}

impl RedisStore {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1/`)
    pub async fn connect(url: &str) -> Result<Self> {
        let client =
            redis::Client::open(url).map_err(|e| CoreError::Store(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CoreError::Store(e.to_string()))?;
        Ok(Self::with_connection(conn))
    }

    /// Build a store over an existing connection manager
    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            prefix: "ratelimit".to_string(),
            sliding_window: Script::new(SLIDING_WINDOW_SCRIPT),
            token_bucket: Script::new(TOKEN_BUCKET_SCRIPT),
        }
    }

    /// Namespace prefix for all keys (builder pattern)
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[async_trait]
impl RateLimitStore for RedisStore {
    async fn check_sliding_window(
        &self,
        key: &str,
        window: Duration,
        max_requests: u32,
    ) -> Result<RateLimitDecision> {
        let now = Self::now_ms();
        let mut conn = self.conn.clone();
        let member = format!("{}-{}", now, rand::random::<u32>());

        let (allowed, remaining, retry_after_ms): (i64, i64, i64) = self
            .sliding_window
            .key(self.namespaced(key))
            .arg(now)
            .arg(window.as_millis() as u64)
            .arg(max_requests)
            .arg(member)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CoreError::Store(e.to_string()))?;

        if allowed == 1 {
            Ok(RateLimitDecision::admitted(
                remaining.max(0) as u32,
                max_requests,
            ))
        } else {
            Ok(RateLimitDecision::rejected(
                max_requests,
                retry_after_ms.max(0) as u64,
            ))
        }
    }

    async fn check_token_bucket(
        &self,
        key: &str,
        capacity: u32,
        refill_per_sec: f64,
    ) -> Result<RateLimitDecision> {
        let now = Self::now_ms();
        let mut conn = self.conn.clone();

        let (allowed, remaining, retry_after_ms): (i64, i64, i64) = self
            .token_bucket
            .key(self.namespaced(key))
            .arg(now)
            .arg(capacity)
            .arg(refill_per_sec / 1000.0)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CoreError::Store(e.to_string()))?;

        if allowed == 1 {
            Ok(RateLimitDecision::admitted(
                remaining.max(0) as u32,
                capacity,
            ))
        } else {
            Ok(RateLimitDecision::rejected(
                capacity,
                retry_after_ms.max(0) as u64,
            ))
        }
    }

    async fn purge_expired(&self, _window: Duration) -> Result<usize> {
        // Keys expire server-side via PEXPIRE
        Ok(0)
    }
}
