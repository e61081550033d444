//! Per-tenant token bucket admission control.
//!
//! Buckets are created lazily on first sight and live in a sharded map. The
//! refill and check-and-decrement for one tenant run under that tenant's
//! shard lock, so two requests racing for the last token can never both be
//! admitted, while tenants on other shards proceed in parallel.

mod bucket;

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use self::bucket::TokenBucket;
use crate::clock::{Clock, SystemClock};
use crate::tenant::normalize_tenant;

pub const DEFAULT_RATE_PER_SEC: f64 = 5.0;
pub const DEFAULT_BURST: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub rate_per_sec: f64,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: DEFAULT_RATE_PER_SEC,
            burst: DEFAULT_BURST,
        }
    }
}

impl RateLimitConfig {
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        Self {
            rate_per_sec,
            burst,
        }
    }

    /// Replaces non-positive settings with the defaults.
    pub fn normalized(self) -> Self {
        let rate_per_sec = if self.rate_per_sec.is_finite() && self.rate_per_sec > 0.0 {
            self.rate_per_sec
        } else {
            DEFAULT_RATE_PER_SEC
        };
        let burst = if self.burst == 0 {
            DEFAULT_BURST
        } else {
            self.burst
        };
        Self {
            rate_per_sec,
            burst,
        }
    }
}

pub struct TenantRateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<String, TokenBucket>,
    clock: Arc<dyn Clock>,
}

impl TenantRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: config.normalized(),
            buckets: DashMap::new(),
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admits the request if the tenant's bucket holds at least one token.
    ///
    /// Never blocks beyond the shard lock and never fails.
    pub fn allow(&self, tenant_id: &str) -> bool {
        let tenant = normalize_tenant(tenant_id);
        let burst = f64::from(self.config.burst);
        let now = self.clock.now();

        let mut created = false;
        let mut bucket = self
            .buckets
            .entry(tenant.to_owned())
            .or_insert_with(|| {
                created = true;
                TokenBucket::first_seen(burst, now)
            });
        if created {
            return true;
        }

        if bucket.is_corrupt(burst) {
            tracing::warn!(
                tenant_id = tenant,
                tokens = bucket.tokens(),
                "Reinitializing corrupt token bucket"
            );
            *bucket = TokenBucket::first_seen(burst, now);
            return true;
        }

        bucket.refill(now, self.config.rate_per_sec, burst);
        bucket.try_take()
    }

    /// Tokens the tenant would have right now, without spending any.
    pub fn available(&self, tenant_id: &str) -> Option<f64> {
        let tenant = normalize_tenant(tenant_id);
        let now = self.clock.now();
        let mut bucket = self.buckets.get(tenant)?.value().clone();
        bucket.refill(now, self.config.rate_per_sec, f64::from(self.config.burst));
        Some(bucket.tokens())
    }

    pub fn tenant_count(&self) -> usize {
        self.buckets.len()
    }

    #[cfg(test)]
    fn corrupt(&self, tenant_id: &str, tokens: f64) {
        if let Some(mut bucket) = self.buckets.get_mut(tenant_id) {
            *bucket = TokenBucket::first_seen(tokens + 1.0, self.clock.now());
        }
    }
}

impl Default for TenantRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl std::fmt::Debug for TenantRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRateLimiter")
            .field("config", &self.config)
            .field("tenants", &self.buckets.len())
            .finish()
    }
}
