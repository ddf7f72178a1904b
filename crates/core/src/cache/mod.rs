//! Two-tier response cache
//!
//! [`CacheStore`] fronts a bounded in-process tier and an optional persistent
//! tier over a [`PersistentStore`](crate::ports::PersistentStore). Entries
//! carry a TTL and a tag set:
//!
//! - expiry is checked on every read and swept periodically
//! - the memory tier evicts its least recently used entry when full
//! - a persistent hit read through both tiers is promoted into memory
//! - `delete_by_tags` scans both tiers
//!
//! Persistent-tier failures never fail a read: they are logged and treated as
//! a miss.

pub mod entry;
mod memory;
mod persistent;
pub mod stats;

use std::sync::Arc;
use std::time::Duration;

use courier_common::codec::Codec;
use courier_common::time::SharedClock;
use courier_domain::{CacheConfig, CacheStrategy};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use self::entry::CacheEntry;
use self::memory::{Lookup, MemoryTier};
use self::persistent::{PersistentLookup, PersistentTier};
use self::stats::CacheMetrics;
pub use self::stats::CacheStats;
use crate::ports::{PersistentStore, StoreError};

/// Which tiers an operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tiers {
    pub memory: bool,
    pub persistent: bool,
}

impl Tiers {
    pub const ALL: Self = Self { memory: true, persistent: true };
    pub const MEMORY: Self = Self { memory: true, persistent: false };
    pub const PERSISTENT: Self = Self { memory: false, persistent: true };

    /// Tiers a request strategy reads and writes.
    pub const fn for_strategy(strategy: CacheStrategy) -> Self {
        Self { memory: strategy.uses_memory(), persistent: strategy.uses_persistent() }
    }
}

/// Ttl and tags for a write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Falls back to the store's default ttl.
    pub ttl: Option<Duration>,
    pub tags: Vec<String>,
}

impl EntryOptions {
    pub fn new() -> Self {
        Self::default()
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
}

/// Two-tier key/value cache with TTL and tag invalidation.
pub struct CacheStore {
    memory: Mutex<MemoryTier>,
    persistent: Option<PersistentTier>,
    clock: SharedClock,
    default_ttl: Duration,
    sweep_interval: Duration,
    metrics: CacheMetrics,
    sweeper: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("memory_len", &self.memory.lock().len())
            .field("persistent", &self.persistent.is_some())
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Memory-only store.
    pub fn new(config: &CacheConfig, clock: SharedClock) -> Self {
        Self {
            memory: Mutex::new(MemoryTier::new(config.max_memory_items)),
            persistent: None,
            clock,
            default_ttl: config.default_ttl,
            sweep_interval: config.sweep_interval,
            metrics: CacheMetrics::default(),
            sweeper: Mutex::new(None),
        }
    }

    /// Attach a persistent tier. Keys are stored under `namespace:`.
    #[must_use]
    pub fn with_persistent(
        mut self,
        store: Arc<dyn PersistentStore>,
        codec: Arc<dyn Codec>,
        namespace: impl Into<String>,
    ) -> Self {
        self.persistent = Some(PersistentTier::new(store, codec, namespace));
        self
    }

    pub fn has_persistent_tier(&self) -> bool {
        self.persistent.is_some()
    }

    fn now_ms(&self) -> u64 {
        self.clock.millis_since_epoch()
    }

    /// Read through memory, then the persistent tier.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.get_in(key, Tiers::ALL).await
    }

    /// Read from the given tiers. A persistent hit is promoted into memory
    /// when the memory tier is included.
    pub async fn get_in(&self, key: &str, tiers: Tiers) -> Option<Vec<u8>> {
        let now = self.now_ms();

        if tiers.memory {
            let lookup = self.memory.lock().get(key, now);
            match lookup {
                Lookup::Hit(value) => {
                    self.metrics.record_hit();
                    debug!(key, tier = "memory", "cache hit");
                    return Some(value);
                }
                Lookup::Expired => self.metrics.record_expirations(1),
                Lookup::Miss => {}
            }
        }

        if tiers.persistent {
            if let Some(tier) = &self.persistent {
                match tier.get(key, now).await {
                    Ok(PersistentLookup::Hit(entry)) => {
                        self.metrics.record_hit();
                        debug!(key, tier = "persistent", "cache hit");
                        let value = entry.value.clone();
                        if tiers.memory {
                            let evicted = self.memory.lock().promote(entry, now);
                            self.record_eviction(evicted);
                        }
                        return Some(value);
                    }
                    Ok(PersistentLookup::Expired) => self.metrics.record_expirations(1),
                    Ok(PersistentLookup::Miss) => {}
                    Err(e) => warn!(key, error = %e, "persistent cache read failed"),
                }
            }
        }

        self.metrics.record_miss();
        debug!(key, "cache miss");
        None
    }

    /// Write to every tier.
    ///
    /// # Errors
    /// Returns the persistent tier's error; the memory write still happened.
    pub async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        options: EntryOptions,
    ) -> Result<(), StoreError> {
        self.set_in(key, value, options, Tiers::ALL).await
    }

    /// Write to the given tiers.
    ///
    /// # Errors
    /// Returns the persistent tier's error; the memory write still happened.
    pub async fn set_in(
        &self,
        key: &str,
        value: Vec<u8>,
        options: EntryOptions,
        tiers: Tiers,
    ) -> Result<(), StoreError> {
        let ttl = options.ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry::new(key, value, self.now_ms(), ttl, options.tags);
        self.metrics.record_insert();

        let persist = if tiers.persistent { self.persistent.as_ref() } else { None };
        match (tiers.memory, persist) {
            (true, Some(tier)) => {
                self.insert_memory(entry.clone());
                tier.set(&entry).await
            }
            (false, Some(tier)) => tier.set(&entry).await,
            (true, None) => {
                self.insert_memory(entry);
                Ok(())
            }
            (false, None) => Ok(()),
        }
    }

    fn insert_memory(&self, entry: CacheEntry) {
        let evicted = self.memory.lock().insert(entry);
        self.record_eviction(evicted);
    }

    fn record_eviction(&self, evicted: Option<String>) {
        if let Some(victim) = evicted {
            self.metrics.record_eviction();
            debug!(key = %victim, "evicted least recently used cache entry");
        }
    }

    /// True when a live entry exists in either tier. Does not count as a
    /// read.
    pub async fn has(&self, key: &str) -> bool {
        let now = self.now_ms();
        if self.memory.lock().contains(key, now) {
            return true;
        }
        match &self.persistent {
            Some(tier) => tier.contains(key, now).await.unwrap_or_else(|e| {
                warn!(key, error = %e, "persistent cache lookup failed");
                false
            }),
            None => false,
        }
    }

    /// Remove a key from both tiers; true if either held it.
    ///
    /// # Errors
    /// Fails when the persistent tier cannot be updated.
    pub async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let in_memory = self.memory.lock().remove(key);
        let in_persistent = match &self.persistent {
            Some(tier) => tier.remove(key).await?,
            None => false,
        };
        let removed = in_memory || in_persistent;
        if removed {
            self.metrics.record_invalidations(1);
        }
        Ok(removed)
    }

    /// Remove every entry whose tags intersect `tags`; returns the number of
    /// entries removed across both tiers.
    ///
    /// # Errors
    /// Fails when the persistent tier cannot be updated.
    pub async fn delete_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> Result<usize, StoreError> {
        let tags: Vec<String> = tags.iter().map(|tag| tag.as_ref().to_string()).collect();
        if tags.is_empty() {
            return Ok(0);
        }
        let mut removed = self.memory.lock().remove_tagged(&tags);
        if let Some(tier) = &self.persistent {
            removed += tier.remove_tagged(&tags).await?;
        }
        self.metrics.record_invalidations(removed);
        info!(?tags, removed, "invalidated cache entries by tag");
        Ok(removed)
    }

    /// Drop everything in both tiers.
    ///
    /// # Errors
    /// Fails when the persistent tier cannot be updated.
    pub async fn clear(&self) -> Result<usize, StoreError> {
        let mut removed = self.memory.lock().clear();
        if let Some(tier) = &self.persistent {
            removed += tier.clear().await?;
        }
        self.metrics.record_invalidations(removed);
        Ok(removed)
    }

    /// Remove expired entries from both tiers.
    pub async fn sweep(&self) -> usize {
        let now = self.now_ms();
        let mut removed = self.memory.lock().purge_expired(now);
        if let Some(tier) = &self.persistent {
            match tier.purge_expired(now).await {
                Ok(count) => removed += count,
                Err(e) => warn!(error = %e, "persistent cache sweep failed"),
            }
        }
        self.metrics.record_expirations(removed);
        removed
    }

    /// Entries currently held in memory.
    pub fn memory_len(&self) -> usize {
        self.memory.lock().len()
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    /// Start the periodic expiry sweep on the current Tokio runtime.
    ///
    /// Returns false when already running or when no runtime is available.
    /// The task holds only a weak reference and ends once the store is
    /// dropped.
    pub fn start_sweeper(self: &Arc<Self>) -> bool {
        let mut slot = self.sweeper.lock();
        if slot.is_some() {
            return false;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!("Skipping cache sweeper start: no active Tokio runtime detected");
            return false;
        };

        let token = CancellationToken::new();
        let cancel = token.clone();
        let weak = Arc::downgrade(self);
        let period = self.sweep_interval;

        runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let Some(store) = weak.upgrade() else { break };
                let removed = store.sweep().await;
                if removed > 0 {
                    debug!(removed, "cache sweep removed expired entries");
                }
            }
        });

        *slot = Some(token);
        info!(interval = ?period, "cache sweeper started");
        true
    }

    /// Stop the sweeper if it is running.
    pub fn stop_sweeper(&self) {
        if let Some(token) = self.sweeper.lock().take() {
            token.cancel();
            info!("cache sweeper stopped");
        }
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        if let Some(token) = self.sweeper.get_mut().take() {
            token.cancel();
        }
    }
}
