//! # support-governance
//!
//! Multi-tenant governance for a support service that answers questions by
//! calling a metered upstream generator.
//!
//! Every request passes through a per-tenant token-bucket rate limiter, a
//! TTL result cache, a rolling-window usage tracker with an optional budget
//! guard, and a cancellable retry executor with exponential backoff.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use support_governance::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = GovernanceConfig::from_env()?;
//!     let governance: Governance<String> = Governance::new(&config);
//!
//!     let request = GovernedRequest::new("acme", "en", "Where is my order?");
//!     let served = governance
//!         .run(&request, &CancellationToken::new(), || async {
//!             Ok(Generation::new("It ships tomorrow.".to_string(), 128))
//!         })
//!         .await?;
//!
//!     println!("{} ({:?})", served.value, served.source);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod budget;
pub mod cache;
pub mod clock;
pub mod config;
pub mod governance;
pub mod limiter;
pub mod observability;
pub mod prelude;
pub mod resilience;
pub mod tenant;
pub mod upstream;
pub mod usage;

// Re-exports for convenience
pub use budget::{BudgetConfig, BudgetGuard, BudgetRemaining, BudgetStatus};
pub use cache::{CacheConfig, CacheStats, ResponseCache, cache_key};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, GovernanceConfig};
pub use governance::{Governance, GovernedRequest, ResponseSource, Served};
pub use limiter::{RateLimitConfig, TenantRateLimiter};
pub use observability::{GovernanceMetrics, MetricsSummary};
pub use resilience::{
    BackoffExecutor, ExponentialBackoff, Failure, RetryConfig, RetryError, RetryPolicy,
};
pub use tenant::{UNKNOWN_TENANT, normalize_tenant};
pub use upstream::{Generation, UpstreamError, UpstreamErrorKind};
pub use usage::{UsageConfig, UsageSnapshot, UsageTracker};

use chrono::{DateTime, Utc};

/// Error type for governed requests.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Rate limit exceeded for tenant {tenant_id}")]
    RateLimitExceeded { tenant_id: String },

    #[error("Token budget exceeded for tenant {tenant_id}{}", match resets_at {
        Some(at) => format!(" (resets at {})", at.to_rfc3339()),
        None => String::new(),
    })]
    BudgetExceeded {
        tenant_id: String,
        remaining: u64,
        resets_at: Option<DateTime<Utc>>,
    },

    #[error("Upstream call failed: {0}")]
    Upstream(UpstreamError),

    #[error("Upstream call failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: UpstreamError },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Refused by a governance policy before reaching upstream
    Rejected,
    /// Upstream kept failing with errors that may clear up later
    Transient,
    /// Upstream failed in a way retrying will not fix
    Permanent,
    /// The caller gave up
    Cancelled,
    Configuration,
}

impl Error {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Error::BudgetExceeded { .. } => "BUDGET_EXCEEDED",
            Error::Upstream(_) => "UPSTREAM_FAILED",
            Error::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
            Error::Cancelled => "REQUEST_CANCELLED",
            Error::Config(_) => "CONFIGURATION_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::RateLimitExceeded { .. } | Error::BudgetExceeded { .. } => {
                ErrorCategory::Rejected
            }
            Error::RetriesExhausted { .. } => ErrorCategory::Transient,
            Error::Upstream(e) if e.is_retryable() => ErrorCategory::Transient,
            Error::Upstream(_) => ErrorCategory::Permanent,
            Error::Cancelled => ErrorCategory::Cancelled,
            Error::Config(_) => ErrorCategory::Configuration,
        }
    }

    pub fn is_rejection(&self) -> bool {
        self.category() == ErrorCategory::Rejected
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// HTTP status a front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RateLimitExceeded { .. } | Error::BudgetExceeded { .. } => 429,
            Error::Upstream(_) => 502,
            Error::RetriesExhausted { .. } => 503,
            Error::Cancelled => 499,
            Error::Config(_) => 500,
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            Error::RateLimitExceeded { tenant_id } | Error::BudgetExceeded { tenant_id, .. } => {
                Some(tenant_id)
            }
            _ => None,
        }
    }

    pub fn upstream_error(&self) -> Option<&UpstreamError> {
        match self {
            Error::Upstream(e) | Error::RetriesExhausted { last: e, .. } => Some(e),
            _ => None,
        }
    }
}

impl From<RetryError<UpstreamError>> for Error {
    fn from(err: RetryError<UpstreamError>) -> Self {
        match err {
            RetryError::Fatal(e) => Error::Upstream(e),
            RetryError::Exhausted { attempts, last } => Error::RetriesExhausted { attempts, last },
            RetryError::Cancelled => Error::Cancelled,
        }
    }
}

/// Result type alias for governance operations.
pub type Result<T> = std::result::Result<T, Error>;
