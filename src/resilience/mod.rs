//! Retry with exponential backoff for upstream calls.
//!
//! Operations report their outcome as `Result<T, Failure<E>>`; the executor
//! branches on the tag and carries no knowledge of what the operation does.

mod backoff;
mod executor;

pub use backoff::ExponentialBackoff;
pub use executor::BackoffExecutor;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_MULTIPLIER: f64 = 2.0;
/// Upper bound on retries after the first attempt.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Failure of a single attempt, tagged with whether trying again may help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure<E> {
    Retryable(E),
    Fatal(E),
}

impl<E> Failure<E> {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    pub fn into_inner(self) -> E {
        match self {
            Self::Retryable(e) | Self::Fatal(e) => e,
        }
    }

    pub fn map<F>(self, f: impl FnOnce(E) -> F) -> Failure<F> {
        match self {
            Self::Retryable(e) => Failure::Retryable(f(e)),
            Self::Fatal(e) => Failure::Fatal(f(e)),
        }
    }
}

/// Terminal outcome of [`BackoffExecutor::execute`].
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("fatal failure: {0}")]
    Fatal(E),

    #[error("max retries exceeded after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("operation cancelled")]
    Cancelled,
}

impl<E> RetryError<E> {
    /// The underlying operation error, if one was observed.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::Fatal(e) | Self::Exhausted { last: e, .. } => Some(e),
            Self::Cancelled => None,
        }
    }
}

/// Serializable retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY.as_millis() as u64,
            max_delay_ms: DEFAULT_MAX_DELAY.as_millis() as u64,
            multiplier: DEFAULT_MULTIPLIER,
            jitter: 0.0,
        }
    }
}

impl RetryConfig {
    /// Builds a policy, repairing settings that would break the schedule:
    /// a zero initial delay uses the default, a maximum below the initial
    /// delay is raised to it, a multiplier below one uses the default, and
    /// retries are capped at [`MAX_RETRIES_LIMIT`].
    pub fn policy(&self) -> RetryPolicy {
        if self.max_retries > MAX_RETRIES_LIMIT {
            tracing::warn!(
                max_retries = self.max_retries,
                limit = MAX_RETRIES_LIMIT,
                "Capping configured retries"
            );
        }
        let max_retries = self.max_retries.min(MAX_RETRIES_LIMIT);
        let initial = if self.initial_delay_ms == 0 {
            DEFAULT_INITIAL_DELAY
        } else {
            Duration::from_millis(self.initial_delay_ms)
        };
        let max = Duration::from_millis(self.max_delay_ms).max(initial);
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            DEFAULT_MULTIPLIER
        };

        RetryPolicy::new(
            max_retries,
            ExponentialBackoff::new(initial, max, multiplier).with_jitter(self.jitter),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: ExponentialBackoff,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: ExponentialBackoff) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Total attempts the policy permits, never more than
    /// `MAX_RETRIES_LIMIT + 1`.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.min(MAX_RETRIES_LIMIT) + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().policy()
    }
}
