//! Pre-call budget check backed by the usage tracker.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BudgetConfig;
use super::status::BudgetStatus;
use crate::usage::UsageTracker;

/// Answer to "how much can this tenant still spend this window".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRemaining {
    pub remaining: u64,
    pub enabled: bool,
    /// `None` when the guard is disabled or the tenant has no live window.
    pub resets_at: Option<DateTime<Utc>>,
}

/// Rejects further upstream calls once a tenant's consumed units reach the
/// quota, until its usage window resets.
///
/// The check reads the last recorded usage and reserves nothing, so calls
/// already in flight when the threshold is crossed can overshoot the quota.
#[derive(Debug, Clone)]
pub struct BudgetGuard {
    tracker: Arc<UsageTracker>,
    quota: u64,
}

impl BudgetGuard {
    pub fn new(tracker: Arc<UsageTracker>, config: BudgetConfig) -> Self {
        Self {
            tracker,
            quota: config.quota,
        }
    }

    /// A quota of zero turns the guard off.
    pub fn enabled(&self) -> bool {
        self.quota > 0
    }

    pub fn quota(&self) -> u64 {
        self.quota
    }

    pub fn allow(&self, tenant_id: &str) -> bool {
        if !self.enabled() {
            return true;
        }
        match self.tracker.get(tenant_id) {
            None => true,
            Some(usage) => usage.units_consumed < self.quota,
        }
    }

    pub fn remaining(&self, tenant_id: &str) -> BudgetRemaining {
        if !self.enabled() {
            return BudgetRemaining {
                remaining: 0,
                enabled: false,
                resets_at: None,
            };
        }
        match self.tracker.get(tenant_id) {
            None => BudgetRemaining {
                remaining: self.quota,
                enabled: true,
                resets_at: None,
            },
            Some(usage) => BudgetRemaining {
                remaining: self.quota.saturating_sub(usage.units_consumed),
                enabled: true,
                resets_at: Some(usage.resets_at()),
            },
        }
    }

    pub fn status(&self, tenant_id: &str) -> BudgetStatus {
        let used = self
            .tracker
            .get(tenant_id)
            .map(|usage| usage.units_consumed)
            .unwrap_or(0);
        BudgetStatus::evaluate(used, self.enabled().then_some(self.quota))
    }

    pub fn tracker(&self) -> &Arc<UsageTracker> {
        &self.tracker
    }
}
