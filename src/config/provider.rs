//! Configuration Provider Trait

use std::str::FromStr;

use super::ConfigResult;

/// Source of raw configuration values.
pub trait ConfigProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Get a raw configuration value
    fn get_raw(&self, key: &str) -> ConfigResult<Option<String>>;
}

/// Typed lookups that degrade to "unset" instead of failing.
pub trait ConfigProviderExt: ConfigProvider {
    /// Parses the value for `key`. An unparseable value is logged and
    /// treated as absent so the caller's default applies.
    fn parsed<T: FromStr>(&self, key: &str) -> ConfigResult<Option<T>> {
        let Some(raw) = self.get_raw(key)? else {
            return Ok(None);
        };
        match raw.trim().parse::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                tracing::warn!(
                    provider = self.name(),
                    key,
                    value = %raw,
                    "Ignoring unparseable configuration value"
                );
                Ok(None)
            }
        }
    }

    /// Like [`parsed`](Self::parsed), but also discards values that fail
    /// `accept`.
    fn parsed_if<T: FromStr + Copy + std::fmt::Display>(
        &self,
        key: &str,
        accept: impl Fn(T) -> bool,
    ) -> ConfigResult<Option<T>> {
        match self.parsed::<T>(key)? {
            Some(value) if accept(value) => Ok(Some(value)),
            Some(value) => {
                tracing::warn!(
                    provider = self.name(),
                    key,
                    value = %value,
                    "Ignoring out-of-range configuration value"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

impl<P: ConfigProvider + ?Sized> ConfigProviderExt for P {}
