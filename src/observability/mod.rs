//! Observability for the governance layer.
//!
//! Decisions are logged through `tracing` with structured fields
//! (`tenant_id`, `remaining`, `reset_at`, `attempt`, `delay_ms`) and counted
//! in [`GovernanceMetrics`]. Installing a subscriber is left to the binary
//! that embeds this crate.

mod metrics;

pub use metrics::{
    Counter, Gauge, GovernanceMetrics, Histogram, LATENCY_BUCKETS_MS, MetricsSummary, UpstreamCall,
};
