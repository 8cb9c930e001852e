//! Sliding-window rate limiting.
//!
//! One narrow trait, two backends: a shared redis store using sorted-set
//! semantics (entries scored by request timestamp, trimmed to the last 60
//! seconds, operations pipelined), and an in-memory map behind a coarse
//! mutex. [`FallbackLimiter`] prefers the shared store and degrades to the
//! in-memory backend when the store errors, logging the transition.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::warn;

/// Window length for every limiter.
const WINDOW_SECS: f64 = 60.0;

/// TTL applied to shared-store keys so abandoned buckets expire.
const STORE_KEY_TTL_SECS: i64 = 3600;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub enum LimitOutcome {
    /// Request admitted; counters for response headers.
    Allowed {
        limit: u32,
        remaining: u32,
        reset_epoch_secs: i64,
    },
    /// Bucket exhausted; the window frees up at `reset_epoch_secs`.
    Limited { limit: u32, reset_epoch_secs: i64 },
}

/// A sliding-window limiter backend. `Err` means the backend itself failed
/// (not that the caller is over limit) — callers fall back or surface an
/// internal error.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, identifier: &str, limit: u32) -> anyhow::Result<LimitOutcome>;
}

fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1e6
}

/// In-memory fallback limiter: identifier → request timestamps within the
/// window, behind one coarse mutex.
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    windows: Mutex<HashMap<String, Vec<f64>>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, identifier: &str, limit: u32) -> anyhow::Result<LimitOutcome> {
        let now = now_epoch();
        let window_start = now - WINDOW_SECS;

        let mut windows = self
            .windows
            .lock()
            .map_err(|_| anyhow::anyhow!("rate limiter mutex poisoned"))?;
        let bucket = windows.entry(identifier.to_string()).or_default();
        bucket.retain(|&ts| ts > window_start);

        let current = bucket.len() as u32;
        if current >= limit {
            let oldest = bucket.iter().copied().fold(now, f64::min);
            return Ok(LimitOutcome::Limited {
                limit,
                reset_epoch_secs: (oldest + WINDOW_SECS).ceil() as i64,
            });
        }

        bucket.push(now);
        Ok(LimitOutcome::Allowed {
            limit,
            remaining: limit - current - 1,
            reset_epoch_secs: (now + WINDOW_SECS) as i64,
        })
    }
}

/// Shared-store limiter backed by redis sorted sets, keyed
/// `rate_limit:<identifier>`.
pub struct SharedStoreRateLimiter {
    conn: redis::aio::ConnectionManager,
}

impl SharedStoreRateLimiter {
    /// Connect to the shared store. Fails fast when the store is
    /// unreachable so bootstrap can log and continue on the fallback.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl RateLimiter for SharedStoreRateLimiter {
    async fn check(&self, identifier: &str, limit: u32) -> anyhow::Result<LimitOutcome> {
        let key = format!("rate_limit:{identifier}");
        let now = now_epoch();
        let window_start = now - WINDOW_SECS;
        let mut conn = self.conn.clone();

        // Trim, count, record, refresh TTL in one pipelined roundtrip. The
        // count is taken before the current request is added.
        let (current,): (i64,) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(&key)
            .arg(0.0)
            .arg(window_start)
            .ignore()
            .cmd("ZCARD")
            .arg(&key)
            .cmd("ZADD")
            .arg(&key)
            .arg(now)
            .arg(format!("{now}"))
            .ignore()
            .cmd("EXPIRE")
            .arg(&key)
            .arg(STORE_KEY_TTL_SECS)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if current >= i64::from(limit) {
            let oldest: Vec<(String, f64)> = redis::cmd("ZRANGE")
                .arg(&key)
                .arg(0)
                .arg(0)
                .arg("WITHSCORES")
                .query_async(&mut conn)
                .await?;
            let reset = oldest
                .first()
                .map_or(now + WINDOW_SECS, |(_, score)| score + WINDOW_SECS);
            return Ok(LimitOutcome::Limited { limit, reset_epoch_secs: reset.ceil() as i64 });
        }

        Ok(LimitOutcome::Allowed {
            limit,
            remaining: limit.saturating_sub(current as u32 + 1),
            reset_epoch_secs: (now + WINDOW_SECS) as i64,
        })
    }
}

/// Primary/fallback pair: tries the shared store, degrades to the in-memory
/// limiter on backend failure.
pub struct FallbackLimiter {
    primary: Option<SharedStoreRateLimiter>,
    fallback: InMemoryRateLimiter,
}

impl FallbackLimiter {
    pub fn new(primary: Option<SharedStoreRateLimiter>) -> Self {
        Self { primary, fallback: InMemoryRateLimiter::new() }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Whether the shared store is configured.
    pub fn has_shared_store(&self) -> bool {
        self.primary.is_some()
    }

    pub async fn check(&self, identifier: &str, limit: u32) -> anyhow::Result<LimitOutcome> {
        if let Some(primary) = &self.primary {
            match primary.check(identifier, limit).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    warn!(error = %err, "Shared rate-limit store failed, using in-memory fallback");
                }
            }
        }
        self.fallback.check(identifier, limit).await
    }
}
