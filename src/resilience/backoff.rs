//! Exponential backoff schedule for retry policies.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
            jitter: 0.0,
        }
    }

    /// Randomizes each delay by up to `±jitter` of its value. Delays never
    /// exceed the configured maximum.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Delay before the `retry`-th retry (1-based):
    /// `min(max, initial * multiplier^(retry - 1))`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_nanos = self.max.as_nanos() as f64;
        let base = self.initial.as_nanos() as f64 * self.multiplier.powi(exponent);
        let clamped = base.min(max_nanos);

        let jittered = if self.jitter > 0.0 {
            let range = clamped * self.jitter;
            let offset = rand::random::<f64>() * range * 2.0 - range;
            (clamped + offset).clamp(0.0, max_nanos)
        } else {
            clamped
        };

        Duration::from_nanos(jittered as u64)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(5), 2.0)
    }
}
