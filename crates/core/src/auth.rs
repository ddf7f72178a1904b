//! Single-flight access to the credential provider
//!
//! Concurrent 401s must not stampede the identity service: [`CredentialGate`]
//! lets one refresh run at a time, and callers that queued behind a refresh
//! that finished while they waited reuse its token.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use courier_domain::{PipelineError, Token};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::ports::CredentialProvider;

pub struct CredentialGate {
    provider: Arc<dyn CredentialProvider>,
    refreshed: Mutex<Option<Token>>,
    generation: AtomicU64,
}

impl std::fmt::Debug for CredentialGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialGate")
            .field("generation", &self.generation.load(AtomicOrdering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl CredentialGate {
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self { provider, refreshed: Mutex::new(None), generation: AtomicU64::new(0) }
    }

    /// Token to inject now. An expired token is refreshed first.
    ///
    /// # Errors
    /// Provider failures while reading or refreshing.
    pub async fn current(&self, now: DateTime<Utc>) -> Result<Option<Token>, PipelineError> {
        match self.provider.token().await? {
            Some(token) if token.is_expired(now) => {
                debug!("access token expired, refreshing before use");
                self.refresh().await.map(Some)
            }
            other => Ok(other),
        }
    }

    /// Refresh once among concurrent callers.
    ///
    /// # Errors
    /// The provider's refresh error.
    pub async fn refresh(&self) -> Result<Token, PipelineError> {
        let seen = self.generation.load(AtomicOrdering::Acquire);
        let mut refreshed = self.refreshed.lock().await;

        if self.generation.load(AtomicOrdering::Acquire) != seen {
            if let Some(token) = refreshed.as_ref() {
                debug!("reusing token from concurrent refresh");
                return Ok(token.clone());
            }
        }

        match self.provider.refresh().await {
            Ok(token) => {
                *refreshed = Some(token.clone());
                let generation = self.generation.fetch_add(1, AtomicOrdering::AcqRel) + 1;
                info!(generation, "access token refreshed");
                Ok(token)
            }
            Err(e) => {
                warn!(error = %e, "access token refresh failed");
                Err(e)
            }
        }
    }

    /// Completed refreshes.
    pub fn refresh_count(&self) -> u64 {
        self.generation.load(AtomicOrdering::Acquire)
    }
}
