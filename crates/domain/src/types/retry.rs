use std::time::Duration;

use courier_common::duration_millis;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_JITTER,
    DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_RETRY_MULTIPLIER,
};
use crate::impl_wire_name;

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// Always `base_delay`.
    Fixed,
    /// `base_delay * (attempt + 1)`.
    Linear,
    /// `base_delay * multiplier^attempt`.
    #[default]
    ExponentialBackoff,
    /// Uniform in `[base_delay, max_delay]`.
    Random,
}

impl_wire_name!(BackoffKind {
    Fixed => "fixed",
    Linear => "linear",
    ExponentialBackoff => "exponential_backoff",
    Random => "random",
});

/// Per-request retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub backoff: BackoffKind,
    /// Retries after the first attempt; `0` disables retrying.
    pub max_retries: u32,
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Symmetric jitter as a fraction of the computed delay, in `[0, 1]`.
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: BackoffKind::ExponentialBackoff,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            multiplier: DEFAULT_RETRY_MULTIPLIER,
            jitter_fraction: DEFAULT_RETRY_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Exponential policy with the given base delay and multiplier.
    pub fn exponential(max_retries: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            backoff: BackoffKind::ExponentialBackoff,
            max_retries,
            base_delay,
            multiplier,
            ..Self::default()
        }
    }

    /// Fixed-delay policy.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self { backoff: BackoffKind::Fixed, max_retries, base_delay: delay, ..Self::default() }
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter_fraction: f64) -> Self {
        self.jitter_fraction = jitter_fraction.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffKind) -> Self {
        self.backoff = backoff;
        self
    }
}
