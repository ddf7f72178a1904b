use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use courier_core::{ConnectivityOracle, CredentialProvider, PersistentStore, StoreError};
use courier_domain::{LinkQuality, PipelineError, Token};
use parking_lot::Mutex;

/// `PersistentStore` over a `HashMap`.
#[derive(Debug, Default)]
pub struct MapStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MapStore {
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().get(key).cloned()
    }
}

#[async_trait]
impl PersistentStore for MapStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Hands out `token-N`, where N counts refreshes.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    refreshes: AtomicUsize,
    refresh_fails: AtomicBool,
}

impl StaticCredentials {
    pub fn failing_refresh() -> Self {
        Self { refresh_fails: AtomicBool::new(true), ..Self::default() }
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn token(&self) -> Result<Option<Token>, PipelineError> {
        Ok(Some(Token::new(format!("token-{}", self.refreshes()))))
    }

    async fn refresh(&self) -> Result<Token, PipelineError> {
        if self.refresh_fails.load(AtomicOrdering::SeqCst) {
            return Err(PipelineError::network("identity provider unreachable"));
        }
        let n = self.refreshes.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        Ok(Token::new(format!("token-{n}")))
    }
}

/// Connectivity oracle flipped by the test.
#[derive(Debug)]
pub struct ToggleConnectivity {
    online: AtomicBool,
}

impl ToggleConnectivity {
    pub fn new(online: bool) -> Self {
        Self { online: AtomicBool::new(online) }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, AtomicOrdering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityOracle for ToggleConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(AtomicOrdering::SeqCst)
    }

    async fn quality(&self) -> LinkQuality {
        if self.online.load(AtomicOrdering::SeqCst) {
            LinkQuality::Good
        } else {
            LinkQuality::Offline
        }
    }
}
