//! In-Memory Configuration Provider
//!
//! Useful for testing and code-defined configuration.

use std::collections::HashMap;

use super::ConfigResult;
use super::provider::ConfigProvider;

#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    data: HashMap<String, String>,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: HashMap<String, String>) -> Self {
        Self { data }
    }

    /// Add a value during construction (builder pattern)
    pub fn value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        Ok(self.data.get(key).cloned())
    }
}
