use std::collections::HashMap;
use std::sync::Arc;

use courier_common::codec::Codec;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use super::entry::CacheEntry;
use crate::ports::{PersistentStore, StoreError};

/// Reserved key (under the namespace) holding the tier index.
const INDEX_KEY: &str = "__index__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct IndexRecord {
    tags: Vec<String>,
    expires_at: u64,
}

type Index = HashMap<String, IndexRecord>;

#[derive(Debug)]
pub(crate) enum PersistentLookup {
    Hit(CacheEntry),
    Expired,
    Miss,
}

/// Codec-wrapped tier over a [`PersistentStore`].
///
/// The index (key → tags, expiry) is loaded lazily on first use and written
/// back after every change, so sweeping and tag invalidation never need to
/// list the backing store. The index mutex serializes those writes.
pub(crate) struct PersistentTier {
    store: Arc<dyn PersistentStore>,
    codec: Arc<dyn Codec>,
    namespace: String,
    index: Mutex<Option<Index>>,
}

impl PersistentTier {
    pub(crate) fn new(
        store: Arc<dyn PersistentStore>,
        codec: Arc<dyn Codec>,
        namespace: impl Into<String>,
    ) -> Self {
        Self { store, codec, namespace: namespace.into(), index: Mutex::new(None) }
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }

    async fn read_index(&self) -> Result<Index, StoreError> {
        let key = self.storage_key(INDEX_KEY);
        let Some(bytes) = self.store.get(&key).await? else {
            return Ok(Index::new());
        };
        let decoded = self.codec.decode(&bytes)?;
        match serde_json::from_slice(&decoded) {
            Ok(index) => Ok(index),
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "discarding unreadable cache index");
                Ok(Index::new())
            }
        }
    }

    async fn write_index(&self, index: &Index) -> Result<(), StoreError> {
        let bytes = self.codec.encode(&serde_json::to_vec(index)?)?;
        self.store.set(&self.storage_key(INDEX_KEY), bytes).await
    }

    /// Run `f` against the loaded index while holding the index lock.
    async fn with_index<T>(
        &self,
        f: impl FnOnce(&mut Index) -> (T, bool),
    ) -> Result<T, StoreError> {
        let mut guard = self.index.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_index().await?);
        }
        let Some(index) = guard.as_mut() else {
            return Err(StoreError::Unavailable("cache index not loaded".into()));
        };
        let (out, dirty) = f(index);
        if dirty {
            self.write_index(index).await?;
        }
        Ok(out)
    }

    pub(crate) async fn get(&self, key: &str, now_ms: u64) -> Result<PersistentLookup, StoreError> {
        let record = self.with_index(|index| (index.get(key).cloned(), false)).await?;
        let Some(record) = record else {
            return Ok(PersistentLookup::Miss);
        };
        if now_ms > record.expires_at {
            self.remove(key).await?;
            return Ok(PersistentLookup::Expired);
        }

        let storage_key = self.storage_key(key);
        let Some(bytes) = self.store.get(&storage_key).await? else {
            // index outlived the payload
            self.with_index(|index| ((), index.remove(key).is_some())).await?;
            return Ok(PersistentLookup::Miss);
        };

        let entry = self
            .codec
            .decode(&bytes)
            .map_err(StoreError::from)
            .and_then(|plain| serde_json::from_slice::<CacheEntry>(&plain).map_err(StoreError::from));
        match entry {
            Ok(entry) => Ok(PersistentLookup::Hit(entry)),
            Err(e) => {
                self.remove(key).await?;
                Err(StoreError::corrupt(key, e.to_string()))
            }
        }
    }

    pub(crate) async fn set(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        let bytes = self.codec.encode(&serde_json::to_vec(entry)?)?;
        self.store.set(&self.storage_key(&entry.key), bytes).await?;
        let record = IndexRecord { tags: entry.tags.clone(), expires_at: entry.expires_at };
        self.with_index(|index| {
            let changed = index.get(&entry.key) != Some(&record);
            index.insert(entry.key.clone(), record);
            ((), changed)
        })
        .await
    }

    pub(crate) async fn contains(&self, key: &str, now_ms: u64) -> Result<bool, StoreError> {
        self.with_index(|index| {
            (index.get(key).is_some_and(|record| now_ms <= record.expires_at), false)
        })
        .await
    }

    pub(crate) async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        self.store.remove(&self.storage_key(key)).await?;
        self.with_index(|index| {
            let removed = index.remove(key).is_some();
            (removed, removed)
        })
        .await
    }

    pub(crate) async fn remove_tagged(&self, tags: &[String]) -> Result<usize, StoreError> {
        self.remove_where(|record| record.tags.iter().any(|tag| tags.contains(tag))).await
    }

    pub(crate) async fn purge_expired(&self, now_ms: u64) -> Result<usize, StoreError> {
        self.remove_where(|record| now_ms > record.expires_at).await
    }

    pub(crate) async fn clear(&self) -> Result<usize, StoreError> {
        self.remove_where(|_| true).await
    }

    async fn remove_where(
        &self,
        predicate: impl Fn(&IndexRecord) -> bool,
    ) -> Result<usize, StoreError> {
        let mut guard = self.index.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_index().await?);
        }
        let Some(index) = guard.as_mut() else {
            return Err(StoreError::Unavailable("cache index not loaded".into()));
        };

        let doomed: Vec<String> =
            index.iter().filter(|(_, record)| predicate(record)).map(|(key, _)| key.clone()).collect();
        if doomed.is_empty() {
            return Ok(0);
        }
        for key in &doomed {
            self.store.remove(&self.storage_key(key)).await?;
            index.remove(key);
        }
        self.write_index(index).await?;
        Ok(doomed.len())
    }
}
