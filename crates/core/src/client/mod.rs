//! Client facade
//!
//! [`Client`] is the entry point applications use. Every call runs the
//! interceptor chain around the dispatch path:
//!
//! 1. cache read, when the strategy reads before the network
//! 2. connectivity check: offline fails fast unless the request is LOW
//! 3. in-flight deduplication for idempotent (or opted-in) requests
//! 4. scheduler admission, then retrier and transport
//! 5. write-through for cacheable GETs, or a cached fallback for
//!    `NetworkFirst` when the network fails

pub mod builder;
pub mod interceptor;

use std::sync::Arc;

use async_trait::async_trait;
use courier_domain::{
    CacheStrategy, LinkQuality, Method, PipelineConfig, PipelineError, Priority,
    RequestDescriptor, RequestId, RequestOptions, RequestSummary, Response,
};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

pub use self::builder::ClientBuilder;
use self::interceptor::{Interceptor, Replay};
use crate::cache::{CacheStats, CacheStore, EntryOptions, Tiers};
use crate::dedup::{Deduplicator, SharedResult};
use crate::ports::ConnectivityOracle;
use crate::scheduler::{PipelineStatus, Scheduler};

/// Isolated request pipeline instance.
///
/// Cloning is cheap; clones share the same scheduler, cache and
/// interceptors.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    scheduler: Scheduler,
    cache: Arc<CacheStore>,
    dedup: Deduplicator,
    connectivity: Arc<dyn ConnectivityOracle>,
    interceptors: RwLock<Vec<Arc<dyn Interceptor>>>,
    base_url: Option<String>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("scheduler", &self.inner.scheduler)
            .field("cache", &self.inner.cache)
            .field("dedup", &self.inner.dedup)
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn builder(config: PipelineConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// # Errors
    /// The request's final [`PipelineError`].
    pub async fn get(&self, url: &str, options: RequestOptions) -> SharedResult {
        self.request(Method::Get, url, None, options).await
    }

    /// # Errors
    /// The request's final [`PipelineError`].
    pub async fn delete(&self, url: &str, options: RequestOptions) -> SharedResult {
        self.request(Method::Delete, url, None, options).await
    }

    /// # Errors
    /// The request's final [`PipelineError`].
    pub async fn post(
        &self,
        url: &str,
        body: impl Into<Vec<u8>>,
        options: RequestOptions,
    ) -> SharedResult {
        self.request(Method::Post, url, Some(body.into()), options).await
    }

    /// # Errors
    /// The request's final [`PipelineError`].
    pub async fn put(
        &self,
        url: &str,
        body: impl Into<Vec<u8>>,
        options: RequestOptions,
    ) -> SharedResult {
        self.request(Method::Put, url, Some(body.into()), options).await
    }

    /// # Errors
    /// The request's final [`PipelineError`].
    pub async fn patch(
        &self,
        url: &str,
        body: impl Into<Vec<u8>>,
        options: RequestOptions,
    ) -> SharedResult {
        self.request(Method::Patch, url, Some(body.into()), options).await
    }

    /// POST `value` as JSON.
    ///
    /// # Errors
    /// `Validation` when `value` cannot be serialized, otherwise the
    /// request's final error.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        value: &T,
        options: RequestOptions,
    ) -> SharedResult {
        let request = RequestDescriptor::builder(Method::Post, self.resolve_url(url))
            .options(options)
            .json(value)?
            .build()?;
        self.execute(request).await
    }

    /// Build a descriptor for `method` and run it.
    ///
    /// # Errors
    /// `Validation` for an invalid descriptor, otherwise the request's final
    /// error.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
        options: RequestOptions,
    ) -> SharedResult {
        let mut builder = RequestDescriptor::builder(method, self.resolve_url(url)).options(options);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        self.execute(builder.build()?).await
    }

    /// Run a prepared descriptor through the interceptor chain and the
    /// pipeline. Build the descriptor with a known [`RequestId`] to be able
    /// to [`cancel`](Self::cancel) it; a deduplicated request runs under the
    /// id of the caller that started the shared execution.
    ///
    /// # Errors
    /// The request's final [`PipelineError`].
    #[instrument(
        skip_all,
        fields(request_id = %request.id(), method = %request.method(), url = %request.url())
    )]
    pub async fn execute(&self, request: RequestDescriptor) -> SharedResult {
        let interceptors = self.inner.interceptors.read().clone();

        let mut request = request;
        for interceptor in &interceptors {
            request = interceptor.on_request(request).await?;
        }

        let mut result = self.inner.dispatch(request.clone()).await;
        for interceptor in interceptors.iter().rev() {
            result = interceptor.on_response(&request, result, self.inner.as_ref()).await;
        }
        result
    }

    fn resolve_url(&self, url: &str) -> String {
        resolve_url(self.inner.base_url.as_deref(), url)
    }

    /// Scheduler state and lifetime counters.
    pub fn status(&self) -> PipelineStatus {
        let mut status = self.inner.scheduler.status();
        status.stats.deduplicated = self.inner.dedup.joined_count();
        status
    }

    pub fn queued_requests(&self) -> Vec<RequestSummary> {
        self.inner.scheduler.queued_requests()
    }

    pub fn active_requests(&self) -> Vec<RequestSummary> {
        self.inner.scheduler.active_requests()
    }

    pub fn pause(&self) {
        self.inner.scheduler.pause();
    }

    /// Resume dispatching, optionally with a new concurrency limit.
    pub fn resume(&self, max_concurrency: Option<usize>) {
        self.inner.scheduler.resume(max_concurrency);
    }

    /// Cancel a queued or active request.
    pub fn cancel(&self, id: RequestId) -> bool {
        self.inner.scheduler.cancel(id)
    }

    /// Cancel everything still queued; returns how many were cancelled.
    pub fn clear(&self) -> usize {
        self.inner.scheduler.clear()
    }

    /// Invalidate cached responses carrying any of `tags`.
    ///
    /// # Errors
    /// Fails when the persistent tier cannot be updated.
    pub async fn delete_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> Result<usize, PipelineError> {
        Ok(self.inner.cache.delete_by_tags(tags).await?)
    }

    /// Drop every cached response.
    ///
    /// # Errors
    /// Fails when the persistent tier cannot be updated.
    pub async fn clear_cache(&self) -> Result<usize, PipelineError> {
        Ok(self.inner.cache.clear().await?)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Direct access to the response cache.
    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    /// Append an interceptor to the end of the chain.
    pub fn add_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        debug!(name = interceptor.name(), "interceptor added");
        self.inner.interceptors.write().push(interceptor);
    }

    /// Remove every interceptor named `name`; true if any was removed.
    pub fn remove_interceptor(&self, name: &str) -> bool {
        let mut interceptors = self.inner.interceptors.write();
        let before = interceptors.len();
        interceptors.retain(|interceptor| interceptor.name() != name);
        before != interceptors.len()
    }

    /// Interceptor names in request order.
    pub fn interceptor_names(&self) -> Vec<String> {
        self.inner.interceptors.read().iter().map(|i| i.name().to_string()).collect()
    }

    pub async fn link_quality(&self) -> LinkQuality {
        self.inner.connectivity.quality().await
    }

    /// Cancel queued and active requests and stop background tasks.
    /// Returns the number of requests cancelled.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.inner.scheduler.shutdown();
        self.inner.cache.stop_sweeper();
        info!(cancelled, "client shut down");
        cancelled
    }
}

impl ClientInner {
    async fn dispatch(&self, request: RequestDescriptor) -> SharedResult {
        let strategy = request.cache_strategy();
        let cache_key = request.cache_key();

        if request.reads_cache() && strategy.reads_before_network() {
            if let Some(response) = self.cached(&request, &cache_key).await {
                return Ok(Arc::new(response));
            }
        }
        if strategy == CacheStrategy::CacheOnly {
            return Err(PipelineError::cache_miss(&cache_key));
        }

        if request.priority() != Priority::Low && !self.connectivity.is_online().await {
            debug!(request_id = %request.id(), "offline, failing fast");
            return self.network_failed(&request, &cache_key, PipelineError::offline()).await;
        }

        let result = if request.dedup_enabled() {
            let scheduler = self.scheduler.clone();
            let admitted = request.clone();
            self.dedup
                .dedupe(&request.dedup_key(), move || async move { scheduler.enqueue(admitted).await })
                .await
        } else {
            self.scheduler.enqueue(request.clone()).await.map(Arc::new)
        };

        match result {
            Ok(response) => {
                if request.writes_cache() {
                    self.write_through(&request, &cache_key, &response).await;
                }
                Ok(response)
            }
            Err(error) => self.network_failed(&request, &cache_key, error).await,
        }
    }

    async fn cached(&self, request: &RequestDescriptor, key: &str) -> Option<Response> {
        let bytes = self.cache.get_in(key, Tiers::for_strategy(request.cache_strategy())).await?;
        match serde_json::from_slice::<Response>(&bytes) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(key, error = %e, "discarding undecodable cached response");
                if let Err(e) = self.cache.delete(key).await {
                    warn!(key, error = %e, "failed to remove undecodable cache entry");
                }
                None
            }
        }
    }

    async fn write_through(&self, request: &RequestDescriptor, key: &str, response: &Response) {
        let bytes = match serde_json::to_vec(response) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "response not cacheable");
                return;
            }
        };
        let mut options = EntryOptions::new().with_tags(request.tags().iter().cloned());
        if let Some(ttl) = request.ttl() {
            options = options.with_ttl(ttl);
        }
        let tiers = Tiers::for_strategy(request.cache_strategy());
        if let Err(e) = self.cache.set_in(key, bytes, options, tiers).await {
            warn!(key, error = %e, "cache write-through failed");
        }
    }

    async fn network_failed(
        &self,
        request: &RequestDescriptor,
        key: &str,
        error: PipelineError,
    ) -> SharedResult {
        if request.cache_strategy() == CacheStrategy::NetworkFirst && request.reads_cache() {
            if let Some(response) = self.cached(request, key).await {
                debug!(key, kind = %error.kind(), "serving cached response after network failure");
                return Ok(Arc::new(response));
            }
        }
        Err(error)
    }
}

#[async_trait]
impl Replay for ClientInner {
    async fn replay(&self, request: RequestDescriptor) -> SharedResult {
        self.dispatch(request).await
    }
}

/// Join a relative url onto the base url. Absolute urls pass through.
fn resolve_url(base: Option<&str>, url: &str) -> String {
    match base {
        Some(base) if !url.contains("://") => {
            format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'))
        }
        _ => url.to_string(),
    }
}
