//! In-process governance metrics.
//!
//! Plain atomics updated on the request path. Nothing here exports or
//! serves them; callers read a [`MetricsSummary`] and ship it wherever they
//! like.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Upper bounds, in milliseconds, of the upstream latency buckets.
pub const LATENCY_BUCKETS_MS: [f64; 10] = [
    10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
];

/// Thread-safe atomic counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Thread-safe atomic gauge.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Simple histogram using fixed buckets.
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    bucket_bounds: Vec<f64>,
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(bucket_bounds: Vec<f64>) -> Self {
        let buckets = (0..=bucket_bounds.len())
            .map(|_| AtomicU64::new(0))
            .collect();
        Self {
            buckets,
            bucket_bounds,
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn default_latency() -> Self {
        Self::new(LATENCY_BUCKETS_MS.to_vec())
    }

    pub fn observe(&self, value: f64) {
        let bucket_idx = self
            .bucket_bounds
            .iter()
            .position(|&bound| value <= bound)
            .unwrap_or(self.bucket_bounds.len());

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Per-bucket counts; the last entry holds values above every bound.
    pub fn bucket_counts(&self) -> Vec<u64> {
        self.buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect()
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1000.0 / count as f64
    }
}

/// Decision counters for the governance pipeline.
#[derive(Debug)]
pub struct GovernanceMetrics {
    pub admitted: Counter,
    pub rate_limited: Counter,
    pub cache_hits: Counter,
    pub cache_misses: Counter,
    pub budget_rejected: Counter,
    pub upstream_calls: Counter,
    pub upstream_failures: Counter,
    pub cancelled: Counter,
    pub units_recorded: Counter,
    pub in_flight: Gauge,
    pub upstream_latency_ms: Histogram,
}

impl GovernanceMetrics {
    pub fn new() -> Self {
        Self {
            admitted: Counter::new(),
            rate_limited: Counter::new(),
            cache_hits: Counter::new(),
            cache_misses: Counter::new(),
            budget_rejected: Counter::new(),
            upstream_calls: Counter::new(),
            upstream_failures: Counter::new(),
            cancelled: Counter::new(),
            units_recorded: Counter::new(),
            in_flight: Gauge::new(),
            upstream_latency_ms: Histogram::default_latency(),
        }
    }

    /// Starts accounting for one upstream call. The returned guard must be
    /// [`finish`](UpstreamCall::finish)ed; dropping it unfinished records
    /// the call as abandoned.
    pub fn start_upstream_call(&self) -> UpstreamCall<'_> {
        self.record_upstream_start();
        UpstreamCall {
            metrics: self,
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn record_upstream_start(&self) {
        self.upstream_calls.inc();
        self.in_flight.inc();
    }

    pub fn record_upstream_end(&self, success: bool, latency_ms: f64) {
        self.in_flight.dec();
        self.upstream_latency_ms.observe(latency_ms);
        if !success {
            self.upstream_failures.inc();
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            admitted: self.admitted.get(),
            rate_limited: self.rate_limited.get(),
            cache_hits: self.cache_hits.get(),
            cache_misses: self.cache_misses.get(),
            budget_rejected: self.budget_rejected.get(),
            upstream_calls: self.upstream_calls.get(),
            upstream_failures: self.upstream_failures.get(),
            cancelled: self.cancelled.get(),
            units_recorded: self.units_recorded.get(),
            in_flight: self.in_flight.get(),
            avg_upstream_latency_ms: self.upstream_latency_ms.mean(),
            upstream_latency_buckets: self.upstream_latency_ms.bucket_counts(),
        }
    }
}

/// In-flight upstream call.
///
/// Keeps `in_flight` balanced on every exit path, including the caller
/// dropping the request future mid-call.
#[must_use = "dropping the guard ends the call immediately"]
#[derive(Debug)]
pub struct UpstreamCall<'a> {
    metrics: &'a GovernanceMetrics,
    started: Instant,
    finished: bool,
}

impl UpstreamCall<'_> {
    pub fn finish(mut self, success: bool) {
        self.finished = true;
        self.metrics.record_upstream_end(success, self.elapsed_ms());
    }

    fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for UpstreamCall<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.metrics.record_upstream_end(false, self.elapsed_ms());
        self.metrics.cancelled.inc();
        tracing::debug!("Upstream call abandoned before completion");
    }
}

impl Default for GovernanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`GovernanceMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub admitted: u64,
    pub rate_limited: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub budget_rejected: u64,
    pub upstream_calls: u64,
    pub upstream_failures: u64,
    pub cancelled: u64,
    pub units_recorded: u64,
    pub in_flight: i64,
    pub avg_upstream_latency_ms: f64,
    /// Calls per [`LATENCY_BUCKETS_MS`] bucket; the last entry counts calls
    /// slower than every bound.
    pub upstream_latency_buckets: Vec<u64>,
}
