//! Per-tenant rolling-window usage accounting.
//!
//! Each tenant has at most one live window. A window whose age reaches the
//! configured duration is replaced by a fresh one on the next `add`, so
//! usage never carries across a boundary.

mod window;

pub use window::UsageSnapshot;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::tenant::normalize_tenant;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    #[serde(rename = "window_secs", with = "crate::clock::duration_secs")]
    pub window: Duration,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

impl UsageConfig {
    pub fn with_window(window: Duration) -> Self {
        Self { window }
    }

    /// Effective window; only a zero window falls back to [`DEFAULT_WINDOW`].
    pub fn effective_window(&self) -> Duration {
        if self.window.is_zero() {
            DEFAULT_WINDOW
        } else {
            self.window
        }
    }
}

pub struct UsageTracker {
    window: Duration,
    windows: DashMap<String, UsageSnapshot>,
    clock: Arc<dyn Clock>,
}

impl UsageTracker {
    pub fn new(config: UsageConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: UsageConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            window: config.effective_window(),
            windows: DashMap::new(),
            clock,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records one completed upstream call that consumed `units`.
    ///
    /// Negative units count as zero. Returns the window after the increment.
    pub fn add(&self, tenant_id: &str, units: i64) -> UsageSnapshot {
        let tenant = normalize_tenant(tenant_id);
        let units = u64::try_from(units).unwrap_or(0);
        let now = self.clock.now();

        let mut entry = self
            .windows
            .entry(tenant.to_owned())
            .or_insert_with(|| UsageSnapshot::open(tenant, now, self.window));
        if entry.is_stale(now) {
            *entry = UsageSnapshot::open(tenant, now, self.window);
        }
        entry.record(units);

        tracing::debug!(
            tenant_id = tenant,
            request_count = entry.request_count,
            units_consumed = entry.units_consumed,
            "Usage updated"
        );
        entry.clone()
    }

    /// Current window for the tenant, if one is live.
    ///
    /// A stale window is dropped and reported as absent; `get` never opens a
    /// new one.
    pub fn get(&self, tenant_id: &str) -> Option<UsageSnapshot> {
        let tenant = normalize_tenant(tenant_id);
        let now = self.clock.now();

        let snapshot = self.windows.get(tenant)?.value().clone();
        if snapshot.is_stale(now) {
            self.windows.remove_if(tenant, |_, window| window.is_stale(now));
            return None;
        }
        Some(snapshot)
    }

    pub fn tenant_count(&self) -> usize {
        self.windows.len()
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new(UsageConfig::default())
    }
}

impl std::fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageTracker")
            .field("window", &self.window)
            .field("tenants", &self.windows.len())
            .finish()
    }
}
