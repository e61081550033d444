//! Tenant budget enforcement for upstream generation cost.

mod guard;
mod status;

pub use guard::{BudgetGuard, BudgetRemaining};
pub use status::BudgetStatus;

use serde::{Deserialize, Serialize};

/// Units a tenant may consume per usage window. Zero disables the guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub quota: u64,
}

impl BudgetConfig {
    pub fn new(quota: u64) -> Self {
        Self { quota }
    }
}
