//! Governance configuration.
//!
//! Settings come from a [`ConfigProvider`] (environment variables by
//! default) or from a JSON document. Missing, unparseable or out-of-range
//! values fall back to the component defaults instead of failing startup.
//!
//! ```rust,no_run
//! use support_governance::config::GovernanceConfig;
//!
//! # fn example() -> Result<(), support_governance::config::ConfigError> {
//! let config = GovernanceConfig::from_env()?;
//! assert!(config.rate_limit.normalized().burst >= 1);
//! # Ok(())
//! # }
//! ```

pub mod env;
pub mod memory;
pub mod provider;

pub use env::EnvConfigProvider;
pub use memory::MemoryConfigProvider;
pub use provider::{ConfigProvider, ConfigProviderExt};

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::budget::BudgetConfig;
use crate::cache::CacheConfig;
use crate::limiter::RateLimitConfig;
use crate::resilience::RetryConfig;
use crate::usage::UsageConfig;

/// Keys understood by [`GovernanceConfig::from_provider`](crate::config::GovernanceConfig::from_provider).
pub mod keys {
    pub const RATE_LIMIT_PER_SEC: &str = "tenant_rate_limit_per_sec";
    pub const RATE_LIMIT_BURST: &str = "tenant_rate_limit_burst";
    pub const CACHE_TTL_SECONDS: &str = "response_cache_ttl_seconds";
    pub const USAGE_WINDOW_HOURS: &str = "token_usage_window_hours";
    pub const TOKEN_BUDGET: &str = "tenant_token_budget";
    pub const MAX_RETRIES: &str = "llm_max_retries";
    /// Initial retry delay in milliseconds.
    pub const RETRY_DELAY_MS: &str = "llm_retry_delay";
    /// Retry delay ceiling in milliseconds.
    pub const RETRY_MAX_DELAY_MS: &str = "llm_retry_max_delay";
    pub const RETRY_MULTIPLIER: &str = "llm_retry_multiplier";
}

/// Errors that can occur in configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub usage: UsageConfig,
    pub budget: BudgetConfig,
    pub retry: RetryConfig,
}

impl GovernanceConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_provider(&EnvConfigProvider::new())
    }

    pub fn from_provider(provider: &dyn ConfigProvider) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(rate) =
            provider.parsed_if::<f64>(keys::RATE_LIMIT_PER_SEC, |v| v.is_finite() && v > 0.0)?
        {
            config.rate_limit.rate_per_sec = rate;
        }
        if let Some(burst) = provider.parsed_if::<u32>(keys::RATE_LIMIT_BURST, |v| v > 0)? {
            config.rate_limit.burst = burst;
        }
        if let Some(ttl) = provider.parsed_if::<u64>(keys::CACHE_TTL_SECONDS, |v| v > 0)? {
            config.cache.ttl = Duration::from_secs(ttl);
        }
        if let Some(hours) = provider.parsed_if::<u64>(keys::USAGE_WINDOW_HOURS, |v| v > 0)? {
            config.usage.window = Duration::from_secs(hours.saturating_mul(3600));
        }
        if let Some(quota) = provider.parsed::<u64>(keys::TOKEN_BUDGET)? {
            config.budget.quota = quota;
        }
        if let Some(retries) = provider.parsed::<u32>(keys::MAX_RETRIES)? {
            config.retry.max_retries = retries;
        }
        if let Some(delay) = provider.parsed_if::<u64>(keys::RETRY_DELAY_MS, |v| v > 0)? {
            config.retry.initial_delay_ms = delay;
        }
        if let Some(max) = provider.parsed_if::<u64>(keys::RETRY_MAX_DELAY_MS, |v| v > 0)? {
            config.retry.max_delay_ms = max;
        }
        if let Some(multiplier) = provider
            .parsed_if::<f64>(keys::RETRY_MULTIPLIER, |v| v.is_finite() && v >= 1.0)?
        {
            config.retry.multiplier = multiplier;
        }

        tracing::debug!(provider = provider.name(), ?config, "Loaded governance configuration");
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}
