//! Token bucket state for a single tenant.

use chrono::{DateTime, Utc};

use crate::clock::elapsed;

#[derive(Debug, Clone)]
pub(crate) struct TokenBucket {
    tokens: f64,
    last_refill: DateTime<Utc>,
}

impl TokenBucket {
    /// Bucket for a tenant seen for the first time, with the admitting token
    /// already spent.
    pub(crate) fn first_seen(burst: f64, now: DateTime<Utc>) -> Self {
        Self {
            tokens: burst - 1.0,
            last_refill: now,
        }
    }

    pub(crate) fn is_corrupt(&self, burst: f64) -> bool {
        !self.tokens.is_finite() || self.tokens < 0.0 || self.tokens > burst
    }

    /// Adds `elapsed * rate` tokens, capped at `burst`. A clock that has not
    /// moved forward leaves the bucket untouched.
    pub(crate) fn refill(&mut self, now: DateTime<Utc>, rate_per_sec: f64, burst: f64) {
        if now <= self.last_refill {
            return;
        }
        let secs = elapsed(self.last_refill, now).as_secs_f64();
        self.tokens = (self.tokens + secs * rate_per_sec).min(burst);
        self.last_refill = now;
    }

    pub(crate) fn try_take(&mut self) -> bool {
        if self.tokens < 1.0 {
            return false;
        }
        self.tokens -= 1.0;
        true
    }

    pub(crate) fn tokens(&self) -> f64 {
        self.tokens
    }
}
