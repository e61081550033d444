//! Environment Variable Configuration Provider
//!
//! Read-only: environment variables are treated as immutable at runtime
//! because modifying them is not thread-safe.

use super::provider::ConfigProvider;
use super::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    prefix: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment provider with no prefix
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Create an environment provider with a prefix
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    /// `tenant_token_budget` (or `tenant.token.budget`) becomes
    /// `TENANT_TOKEN_BUDGET`, behind the prefix if one is set.
    fn env_key(&self, key: &str) -> String {
        let name = key.to_uppercase().replace('.', "_");
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, name),
            None => name,
        }
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn name(&self) -> &str {
        "env"
    }

    fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        match std::env::var(self.env_key(key)) {
            Ok(value) if value.is_empty() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ConfigError::Env(e)),
        }
    }
}
