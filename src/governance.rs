//! Request governance pipeline.
//!
//! One call to [`Governance::run`] takes a request through admission, cache
//! lookup, budget check, the retried upstream call, usage accounting and the
//! cache store, in that order. Usage is recorded only for calls that
//! completed; rejected, failed and cancelled requests leave it untouched.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::budget::BudgetGuard;
use crate::cache::{ResponseCache, cache_key};
use crate::clock::{Clock, SystemClock};
use crate::config::GovernanceConfig;
use crate::limiter::TenantRateLimiter;
use crate::observability::GovernanceMetrics;
use crate::resilience::{BackoffExecutor, Failure, RetryError};
use crate::tenant::normalize_tenant;
use crate::upstream::{Generation, UpstreamError};
use crate::usage::{UsageSnapshot, UsageTracker};
use crate::{Error, Result};

/// The parts of an inbound request the governance layer looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernedRequest {
    pub tenant_id: String,
    pub locale: String,
    pub query: String,
}

impl GovernedRequest {
    pub fn new(
        tenant_id: impl Into<String>,
        locale: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            locale: locale.into(),
            query: query.into(),
        }
    }

    pub fn cache_key(&self) -> String {
        cache_key(&self.tenant_id, &self.locale, &self.query)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Cached,
    Generated,
}

/// A response that made it through governance.
#[derive(Debug, Clone)]
pub struct Served<V> {
    pub value: V,
    pub source: ResponseSource,
    /// Tenant usage after this call; `None` for cache hits.
    pub usage: Option<UsageSnapshot>,
}

impl<V> Served<V> {
    pub fn is_cached(&self) -> bool {
        self.source == ResponseSource::Cached
    }
}

pub struct Governance<V> {
    limiter: Arc<TenantRateLimiter>,
    cache: Arc<ResponseCache<V>>,
    usage: Arc<UsageTracker>,
    budget: BudgetGuard,
    executor: BackoffExecutor,
    metrics: Arc<GovernanceMetrics>,
}

impl<V: Clone> Governance<V> {
    pub fn new(config: &GovernanceConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Builds every component around one shared clock.
    pub fn with_clock(config: &GovernanceConfig, clock: Arc<dyn Clock>) -> Self {
        let usage = Arc::new(UsageTracker::with_clock(config.usage, Arc::clone(&clock)));
        Self {
            limiter: Arc::new(TenantRateLimiter::with_clock(
                config.rate_limit,
                Arc::clone(&clock),
            )),
            cache: Arc::new(ResponseCache::with_clock(config.cache, clock)),
            budget: BudgetGuard::new(Arc::clone(&usage), config.budget),
            usage,
            executor: BackoffExecutor::new(config.retry.policy()),
            metrics: Arc::new(GovernanceMetrics::new()),
        }
    }

    pub fn limiter(&self) -> &Arc<TenantRateLimiter> {
        &self.limiter
    }

    pub fn cache(&self) -> &Arc<ResponseCache<V>> {
        &self.cache
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    pub fn budget(&self) -> &BudgetGuard {
        &self.budget
    }

    pub fn executor(&self) -> &BackoffExecutor {
        &self.executor
    }

    pub fn metrics(&self) -> &Arc<GovernanceMetrics> {
        &self.metrics
    }

    /// Governs one request. `upstream` is invoked once per attempt and must
    /// classify its own failures.
    pub async fn run<F, Fut>(
        &self,
        request: &GovernedRequest,
        cancel: &CancellationToken,
        upstream: F,
    ) -> Result<Served<V>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<Generation<V>, Failure<UpstreamError>>>,
    {
        let tenant = normalize_tenant(&request.tenant_id);

        if !self.limiter.allow(tenant) {
            self.metrics.rate_limited.inc();
            tracing::warn!(tenant_id = tenant, "Rate limit exceeded");
            return Err(Error::RateLimitExceeded {
                tenant_id: tenant.to_owned(),
            });
        }
        self.metrics.admitted.inc();

        let key = request.cache_key();
        if let Some(value) = self.cache.get(&key) {
            self.metrics.cache_hits.inc();
            tracing::debug!(tenant_id = tenant, "Serving cached response");
            return Ok(Served {
                value,
                source: ResponseSource::Cached,
                usage: None,
            });
        }
        self.metrics.cache_misses.inc();

        if !self.budget.allow(tenant) {
            let budget = self.budget.remaining(tenant);
            self.metrics.budget_rejected.inc();
            tracing::warn!(
                tenant_id = tenant,
                remaining = budget.remaining,
                enabled = budget.enabled,
                reset_at = ?budget.resets_at.map(|t| t.to_rfc3339()),
                "Token budget exceeded"
            );
            return Err(Error::BudgetExceeded {
                tenant_id: tenant.to_owned(),
                remaining: budget.remaining,
                resets_at: budget.resets_at,
            });
        }

        let call = self.metrics.start_upstream_call();
        let outcome = self.executor.execute(cancel, upstream).await;
        call.finish(outcome.is_ok());

        let generation = match outcome {
            Ok(generation) => generation,
            Err(RetryError::Cancelled) => {
                self.metrics.cancelled.inc();
                tracing::debug!(tenant_id = tenant, "Request cancelled before completion");
                return Err(Error::Cancelled);
            }
            Err(err) => {
                tracing::warn!(tenant_id = tenant, error = %err, "Upstream call failed");
                return Err(err.into());
            }
        };

        let usage = self
            .usage
            .add(tenant, i64::try_from(generation.units).unwrap_or(i64::MAX));
        self.metrics.units_recorded.add(generation.units);
        self.cache.set(key, generation.value.clone());

        Ok(Served {
            value: generation.value,
            source: ResponseSource::Generated,
            usage: Some(usage),
        })
    }
}

impl<V> Clone for Governance<V> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            cache: Arc::clone(&self.cache),
            usage: Arc::clone(&self.usage),
            budget: self.budget.clone(),
            executor: self.executor.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<V> std::fmt::Debug for Governance<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Governance")
            .field("limiter", &self.limiter)
            .field("cache", &self.cache)
            .field("usage", &self.usage)
            .field("budget", &self.budget)
            .field("executor", &self.executor)
            .finish()
    }
}
