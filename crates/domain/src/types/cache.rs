use std::time::Duration;

use courier_common::option_duration_millis;
use serde::{Deserialize, Serialize};

use crate::impl_wire_name;

/// Where a request may be answered from and which tiers it writes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// In-process tier only.
    MemoryOnly,
    /// Persistent tier only.
    PersistentOnly,
    /// Memory, then persistent (hits are promoted), then network.
    CacheFirst,
    /// Network first; cached copy only when the network fails.
    NetworkFirst,
    /// Never touches the network; a miss is an error.
    CacheOnly,
    /// Bypass the cache entirely.
    #[default]
    NetworkOnly,
}

impl_wire_name!(CacheStrategy {
    MemoryOnly => "memory_only",
    PersistentOnly => "persistent_only",
    CacheFirst => "cache_first",
    NetworkFirst => "network_first",
    CacheOnly => "cache_only",
    NetworkOnly => "network_only",
});

impl CacheStrategy {
    /// The cache is consulted before any network call.
    pub const fn reads_before_network(&self) -> bool {
        matches!(self, Self::MemoryOnly | Self::PersistentOnly | Self::CacheFirst | Self::CacheOnly)
    }

    /// The strategy uses the in-process tier.
    pub const fn uses_memory(&self) -> bool {
        !matches!(self, Self::PersistentOnly | Self::NetworkOnly)
    }

    /// The strategy uses the persistent tier.
    pub const fn uses_persistent(&self) -> bool {
        !matches!(self, Self::MemoryOnly | Self::NetworkOnly)
    }

    /// Any cache tier is involved.
    pub const fn is_cached(&self) -> bool {
        !matches!(self, Self::NetworkOnly)
    }
}

/// Cache settings attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    pub strategy: CacheStrategy,
    /// Falls back to the pipeline's default ttl when unset.
    #[serde(with = "option_duration_millis")]
    pub ttl: Option<Duration>,
    pub tags: Vec<String>,
    /// Overrides the default `METHOD:url` cache key.
    pub key: Option<String>,
}

impl CacheOptions {
    pub fn new(strategy: CacheStrategy) -> Self {
        Self { strategy, ..Self::default() }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}
