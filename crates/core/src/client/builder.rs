use std::sync::Arc;

use courier_common::codec::{Codec, IdentityCodec};
use courier_common::time::{SharedClock, SystemClock};
use courier_domain::{PipelineConfig, PipelineError};
use parking_lot::RwLock;
use tracing::info;

use super::interceptor::{AuthInterceptor, Interceptor, TracingInterceptor};
use super::{Client, ClientInner};
use crate::auth::CredentialGate;
use crate::cache::CacheStore;
use crate::dedup::Deduplicator;
use crate::ports::{AlwaysOnline, ConnectivityOracle, CredentialProvider, PersistentStore, Transport};
use crate::retry::Retrier;
use crate::scheduler::Scheduler;

/// Assembles an isolated [`Client`].
///
/// Only the transport is required. Without a persistent store the cache is
/// memory-only; without a connectivity oracle the client assumes it is
/// online.
pub struct ClientBuilder {
    config: PipelineConfig,
    transport: Option<Arc<dyn Transport>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    connectivity: Option<Arc<dyn ConnectivityOracle>>,
    store: Option<Arc<dyn PersistentStore>>,
    codec: Option<Arc<dyn Codec>>,
    clock: Option<SharedClock>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    request_ids: bool,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("has_transport", &self.transport.is_some())
            .field("has_credentials", &self.credentials.is_some())
            .field("has_store", &self.store.is_some())
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    pub(super) fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            transport: None,
            credentials: None,
            connectivity: None,
            store: None,
            codec: None,
            clock: None,
            interceptors: Vec::new(),
            request_ids: true,
        }
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn credentials(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    #[must_use]
    pub fn connectivity(mut self, oracle: Arc<dyn ConnectivityOracle>) -> Self {
        self.connectivity = Some(oracle);
        self
    }

    /// Persistent cache tier backend.
    #[must_use]
    pub fn persistent_store(mut self, store: Arc<dyn PersistentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Codec applied to persistent-tier payloads (compression, encryption).
    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Append a custom interceptor. Built-in interceptors run first.
    #[must_use]
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Toggle the built-in `X-Request-Id` interceptor (on by default).
    #[must_use]
    pub fn request_ids(mut self, enabled: bool) -> Self {
        self.request_ids = enabled;
        self
    }

    /// Validate the configuration and start the scheduler and cache
    /// sweeper on the current runtime.
    ///
    /// # Errors
    /// Invalid configuration, a missing transport, or no Tokio runtime.
    pub fn build(self) -> Result<Client, PipelineError> {
        self.config.validate()?;
        let transport = self
            .transport
            .ok_or_else(|| PipelineError::validation("a transport is required to build a client"))?;
        let clock = self.clock.unwrap_or_else(SystemClock::shared);

        let mut cache = CacheStore::new(&self.config.cache, clock.clone());
        if let Some(store) = self.store {
            let codec = self.codec.unwrap_or_else(|| Arc::new(IdentityCodec));
            cache = cache.with_persistent(store, codec, self.config.cache.namespace.clone());
        }
        let cache = Arc::new(cache);

        let retrier = Retrier::new(
            transport,
            self.config.request.timeout,
            self.config.request.retry.clone(),
        );
        let scheduler = Scheduler::start(&self.config.scheduler, retrier, clock.clone())?;
        cache.start_sweeper();

        let mut interceptors: Vec<Arc<dyn Interceptor>> = Vec::new();
        if self.request_ids {
            interceptors.push(Arc::new(TracingInterceptor));
        }
        if let Some(provider) = self.credentials {
            let gate = Arc::new(CredentialGate::new(provider));
            interceptors.push(Arc::new(AuthInterceptor::new(gate, clock)));
        }
        interceptors.extend(self.interceptors);

        info!(
            interceptors = interceptors.len(),
            persistent_cache = cache.has_persistent_tier(),
            base_url = ?self.config.http.base_url,
            "client built"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                dedup: Deduplicator::new(self.config.dedup.grace),
                connectivity: self.connectivity.unwrap_or_else(|| Arc::new(AlwaysOnline)),
                interceptors: RwLock::new(interceptors),
                base_url: self.config.http.base_url.clone(),
                scheduler,
                cache,
            }),
        })
    }
}
