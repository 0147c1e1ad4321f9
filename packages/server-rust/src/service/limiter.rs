//! Per-caller request counting with a periodic hard reset.
//!
//! The limiter is a best-effort control, not a security boundary: counts are
//! cleared wholesale on every reset tick, so a burst that straddles a tick is
//! never limited unless one side alone exceeds the ceiling. A reset that lands
//! between a caller's increment and its comparison lets that one request through.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::worker::BackgroundRunnable;

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// Counts requests per caller key since the last reset.
#[derive(Debug)]
pub struct RateLimiter {
    visitors: Mutex<HashMap<String, u32>>,
    limit: u32,
    reset_interval: Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: u32, reset_interval: Duration) -> Self {
        Self {
            visitors: Mutex::new(HashMap::new()),
            limit,
            reset_interval,
        }
    }

    /// Records one request for `caller` and returns `true` when the caller is
    /// now over the ceiling.
    ///
    /// The ceiling is inclusive: exactly `limit` requests are allowed.
    pub fn check(&self, caller: &str) -> bool {
        let count = {
            let mut visitors = self.visitors.lock();
            let count = visitors.entry(caller.to_string()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };
        tracing::debug!(caller, count, limit = self.limit, "rate limit check");
        count > self.limit
    }

    /// Clears every counter.
    pub fn reset(&self) {
        let cleared = std::mem::take(&mut *self.visitors.lock());
        if !cleared.is_empty() {
            tracing::debug!(callers = cleared.len(), "rate limit counters reset");
        }
    }

    /// Requests recorded for `caller` since the last reset.
    #[must_use]
    pub fn count(&self, caller: &str) -> u32 {
        self.visitors.lock().get(caller).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    #[must_use]
    pub fn reset_interval(&self) -> Duration {
        self.reset_interval
    }
}

// ---------------------------------------------------------------------------
// RateLimitReset
// ---------------------------------------------------------------------------

/// Background job that resets the limiter on every tick.
pub struct RateLimitReset {
    limiter: Arc<RateLimiter>,
}

impl RateLimitReset {
    #[must_use]
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl BackgroundRunnable for RateLimitReset {
    fn name(&self) -> &'static str {
        "rate-limit-reset"
    }

    async fn on_tick(&mut self) {
        self.limiter.reset();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
