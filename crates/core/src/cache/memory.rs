use std::collections::HashMap;

use super::entry::CacheEntry;

/// Result of a memory-tier read.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Lookup {
    Hit(Vec<u8>),
    /// Present but past its expiry; already removed.
    Expired,
    Miss,
}

/// Bounded in-process tier with LRU eviction.
///
/// Callers guard it with a `parking_lot::Mutex`; no method awaits.
#[derive(Debug)]
pub(crate) struct MemoryTier {
    capacity: usize,
    entries: HashMap<String, CacheEntry>,
    access_seq: u64,
}

impl MemoryTier {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), entries: HashMap::new(), access_seq: 0 }
    }

    fn next_seq(&mut self) -> u64 {
        self.access_seq += 1;
        self.access_seq
    }

    pub(crate) fn get(&mut self, key: &str, now_ms: u64) -> Lookup {
        let expired = match self.entries.get(key) {
            None => return Lookup::Miss,
            Some(entry) => entry.is_expired(now_ms),
        };
        if expired {
            self.entries.remove(key);
            return Lookup::Expired;
        }
        let seq = self.next_seq();
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(now_ms, seq);
                Lookup::Hit(entry.value.clone())
            }
            None => Lookup::Miss,
        }
    }

    /// Presence check without touching LRU order. Expired entries are dropped.
    pub(crate) fn contains(&mut self, key: &str, now_ms: u64) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired(now_ms) => {
                self.entries.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Insert or replace; returns the key evicted to make room, if any.
    pub(crate) fn insert(&mut self, mut entry: CacheEntry) -> Option<String> {
        entry.access_seq = self.next_seq();
        let evicted = if !self.entries.contains_key(&entry.key) && self.entries.len() >= self.capacity
        {
            self.evict_lru()
        } else {
            None
        };
        self.entries.insert(entry.key.clone(), entry);
        evicted
    }

    /// Insert an entry read from a slower tier, counting the read as an
    /// access so it ranks as most recently used.
    pub(crate) fn promote(&mut self, mut entry: CacheEntry, now_ms: u64) -> Option<String> {
        entry.touch(now_ms, 0);
        self.insert(entry)
    }

    fn evict_lru(&mut self) -> Option<String> {
        let victim = self
            .entries
            .values()
            .min_by_key(|entry| (entry.last_access_at, entry.access_seq))
            .map(|entry| entry.key.clone())?;
        self.entries.remove(&victim);
        Some(victim)
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub(crate) fn remove_tagged(&mut self, tags: &[String]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.has_any_tag(tags));
        before - self.entries.len()
    }

    pub(crate) fn purge_expired(&mut self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now_ms));
        before - self.entries.len()
    }

    pub(crate) fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }
}
