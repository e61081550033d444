//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```rust
//! use support_governance::prelude::*;
//! ```

// Core types
pub use crate::Error;
pub use crate::ErrorCategory;
pub use crate::Result;

// Pipeline
pub use crate::governance::{Governance, GovernedRequest, ResponseSource, Served};
pub use crate::upstream::{Generation, UpstreamError, UpstreamErrorKind};

// Components
pub use crate::budget::{BudgetGuard, BudgetRemaining, BudgetStatus};
pub use crate::cache::ResponseCache;
pub use crate::limiter::TenantRateLimiter;
pub use crate::resilience::{BackoffExecutor, Failure, RetryError, RetryPolicy};
pub use crate::usage::{UsageSnapshot, UsageTracker};

// Configuration
pub use crate::config::GovernanceConfig;

// Time
pub use crate::clock::{Clock, ManualClock, SystemClock};
