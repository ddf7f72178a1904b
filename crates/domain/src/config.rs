//! Pipeline configuration
//!
//! Every section and field has a default, so an empty TOML or JSON document
//! is a valid configuration. Durations are written as milliseconds.

use std::time::Duration;

use courier_common::duration_millis;
use courier_common::error::CommonError;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_NAMESPACE, DEFAULT_CACHE_TTL_MS, DEFAULT_DEDUP_GRACE_MS,
    DEFAULT_HIGH_PRIORITY_RATIO, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_MEMORY_ITEMS,
    DEFAULT_MAX_QUEUE_SIZE, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SWEEP_INTERVAL_MS,
};
use crate::types::RetryPolicy;

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub scheduler: SchedulerConfig,
    pub cache: CacheConfig,
    pub dedup: DedupConfig,
    pub request: RequestDefaults,
    pub http: HttpConfig,
}

/// Concurrency gate and queue bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub max_concurrency: usize,
    pub max_queue_size: usize,
    /// Share of `max_concurrency` HIGH requests may hold before lower
    /// priorities are admitted ahead of them.
    pub high_priority_ratio: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            high_priority_ratio: DEFAULT_HIGH_PRIORITY_RATIO,
        }
    }
}

/// Cache store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_memory_items: usize,
    #[serde(with = "duration_millis")]
    pub sweep_interval: Duration,
    /// Ttl for entries written without one.
    #[serde(with = "duration_millis")]
    pub default_ttl: Duration,
    /// Key prefix in the persistent store.
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_items: DEFAULT_MAX_MEMORY_ITEMS,
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
            default_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            namespace: DEFAULT_CACHE_NAMESPACE.to_string(),
        }
    }
}

/// Deduplicator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Records older than this are replaced by the next caller.
    #[serde(with = "duration_millis")]
    pub grace: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { grace: Duration::from_millis(DEFAULT_DEDUP_GRACE_MS) }
    }
}

/// Defaults applied to requests that do not set their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            retry: RetryPolicy::default(),
        }
    }
}

/// Settings for the HTTP transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Prefix for relative request urls.
    pub base_url: Option<String>,
    pub user_agent: String,
    #[serde(with = "duration_millis")]
    pub connect_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            user_agent: concat!("courier/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl PipelineConfig {
    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `CommonError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<(), CommonError> {
        let scheduler = &self.scheduler;
        if scheduler.max_concurrency == 0 {
            return Err(CommonError::config_field(
                "scheduler.max_concurrency",
                "must be at least 1",
            ));
        }
        if scheduler.max_queue_size == 0 {
            return Err(CommonError::config_field("scheduler.max_queue_size", "must be at least 1"));
        }
        if !(scheduler.high_priority_ratio > 0.0 && scheduler.high_priority_ratio <= 1.0) {
            return Err(CommonError::config_field(
                "scheduler.high_priority_ratio",
                format!("must be in (0, 1], got {}", scheduler.high_priority_ratio),
            ));
        }
        if self.cache.max_memory_items == 0 {
            return Err(CommonError::config_field("cache.max_memory_items", "must be at least 1"));
        }
        if self.cache.sweep_interval.is_zero() {
            return Err(CommonError::config_field("cache.sweep_interval", "must be non-zero"));
        }
        if self.request.timeout.is_zero() {
            return Err(CommonError::config_field("request.timeout", "must be non-zero"));
        }
        let retry = &self.request.retry;
        if retry.multiplier < 1.0 {
            return Err(CommonError::config_field(
                "request.retry.multiplier",
                format!("must be >= 1, got {}", retry.multiplier),
            ));
        }
        if !(0.0..=1.0).contains(&retry.jitter_fraction) {
            return Err(CommonError::config_field(
                "request.retry.jitter_fraction",
                format!("must be in [0, 1], got {}", retry.jitter_fraction),
            ));
        }
        if retry.max_delay < retry.base_delay {
            return Err(CommonError::config_field(
                "request.retry.max_delay",
                "must not be shorter than base_delay",
            ));
        }
        Ok(())
    }
}
