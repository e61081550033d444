use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{elapsed, shift};

/// Usage of one tenant within its current accounting window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub tenant_id: String,
    pub window_start: DateTime<Utc>,
    pub window: Duration,
    pub request_count: u64,
    pub units_consumed: u64,
}

impl UsageSnapshot {
    pub(crate) fn open(tenant_id: &str, now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            tenant_id: tenant_id.to_owned(),
            window_start: now,
            window,
            request_count: 0,
            units_consumed: 0,
        }
    }

    /// Instant at which this window is replaced by a fresh one.
    pub fn resets_at(&self) -> DateTime<Utc> {
        shift(self.window_start, self.window)
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        elapsed(self.window_start, now) >= self.window
    }

    pub(crate) fn record(&mut self, units: u64) {
        self.request_count = self.request_count.saturating_add(1);
        self.units_consumed = self.units_consumed.saturating_add(units);
    }
}
