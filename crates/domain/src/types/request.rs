//! Request descriptors and per-request options.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_common::option_duration_millis;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{CacheOptions, CacheStrategy, Method, Priority, RetryPolicy};
use crate::constants::{CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE};
use crate::errors::PipelineError;

/// Identifier of one logical request, used for cancellation and tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Time-ordered id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for RequestId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Caller-facing options for the verb methods.
///
/// Unset fields fall back to the pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    pub priority: Priority,
    #[serde(with = "option_duration_millis")]
    pub timeout: Option<Duration>,
    pub retry: Option<RetryPolicy>,
    pub cache: CacheOptions,
    /// `None` means "deduplicate idempotent methods only".
    pub dedup: Option<bool>,
    pub dedup_key: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: CacheOptions) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_dedup(mut self, enabled: bool) -> Self {
        self.dedup = Some(enabled);
        self
    }

    #[must_use]
    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Immutable description of one request.
///
/// Built once through [`RequestDescriptor::builder`]; request interceptors
/// may still add headers by value before the descriptor is admitted to the
/// scheduler, after which it is only shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    id: RequestId,
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    priority: Priority,
    timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
    cache: CacheOptions,
    dedup: Option<bool>,
    dedup_key: Option<String>,
    created_at: DateTime<Utc>,
}

impl RequestDescriptor {
    pub fn builder(method: Method, url: impl Into<String>) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder::new(method, url)
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Explicit timeout; `None` defers to the pipeline default.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Explicit retry policy; `None` defers to the pipeline default.
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    pub fn cache(&self) -> &CacheOptions {
        &self.cache
    }

    pub fn cache_strategy(&self) -> CacheStrategy {
        self.cache.strategy
    }

    pub fn tags(&self) -> &[String] {
        &self.cache.tags
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.cache.ttl
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Cache key: the explicit key, else `METHOD:url`.
    pub fn cache_key(&self) -> String {
        self.cache
            .key
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.method.as_http(), self.url))
    }

    /// Dedup key: the explicit key, else the request fingerprint.
    pub fn dedup_key(&self) -> String {
        self.dedup_key.clone().unwrap_or_else(|| self.fingerprint())
    }

    /// SHA-256 hex over method, url and body.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_http().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.url.as_bytes());
        hasher.update(b"\n");
        if let Some(body) = &self.body {
            hasher.update(body);
        }
        hex::encode(hasher.finalize())
    }

    /// Deduplication applies: explicit opt-in/out, else idempotent methods.
    pub fn dedup_enabled(&self) -> bool {
        self.dedup.unwrap_or_else(|| self.method.is_idempotent())
    }

    /// The cache may answer this request.
    pub fn reads_cache(&self) -> bool {
        self.method.is_idempotent() && self.cache.strategy.is_cached()
    }

    /// A successful response should be written through to the cache.
    pub fn writes_cache(&self) -> bool {
        self.method == Method::Get && self.cache.strategy.is_cached()
    }

    /// Set or replace a header (case-insensitive match).
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(&name)) {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Same request under a different priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Copy of this request with a fresh id, for a replay.
    #[must_use]
    pub fn replay(&self) -> Self {
        Self { id: RequestId::new(), ..self.clone() }
    }
}

/// Builder for [`RequestDescriptor`].
#[derive(Debug, Clone)]
pub struct RequestDescriptorBuilder {
    id: Option<RequestId>,
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    options: RequestOptions,
}

impl RequestDescriptorBuilder {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            id: None,
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            options: RequestOptions::default(),
        }
    }

    #[must_use]
    pub fn id(mut self, id: RequestId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set the content type.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, PipelineError> {
        let body = serde_json::to_vec(value).map_err(|e| {
            PipelineError::validation(format!("request body is not serializable: {e}"))
                .with_cause(e)
        })?;
        self.body = Some(body);
        self.headers.push((CONTENT_TYPE_HEADER.to_string(), JSON_CONTENT_TYPE.to_string()));
        Ok(self)
    }

    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.options.priority = priority;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.options.retry = Some(retry);
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: CacheOptions) -> Self {
        self.options.cache = cache;
        self
    }

    #[must_use]
    pub fn cache_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.options.cache.strategy = strategy;
        self
    }

    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.options.cache.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.cache.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn dedup(mut self, enabled: bool) -> Self {
        self.options.dedup = Some(enabled);
        self
    }

    #[must_use]
    pub fn dedup_key(mut self, key: impl Into<String>) -> Self {
        self.options.dedup_key = Some(key.into());
        self
    }

    /// Apply a full set of caller options; option headers are appended.
    #[must_use]
    pub fn options(mut self, mut options: RequestOptions) -> Self {
        self.headers.append(&mut options.headers);
        self.options = options;
        self
    }

    pub fn build(self) -> Result<RequestDescriptor, PipelineError> {
        let url = self.url.trim().to_string();
        if url.is_empty() {
            return Err(PipelineError::validation("request url is empty"));
        }
        if let Some(timeout) = self.options.timeout {
            if timeout.is_zero() {
                return Err(PipelineError::validation("request timeout must be non-zero"));
            }
        }
        if self.headers.iter().any(|(name, _)| name.trim().is_empty()) {
            return Err(PipelineError::validation("header names must be non-empty"));
        }

        Ok(RequestDescriptor {
            id: self.id.unwrap_or_default(),
            method: self.method,
            url,
            headers: self.headers,
            body: self.body,
            priority: self.options.priority,
            timeout: self.options.timeout,
            retry: self.options.retry,
            cache: self.options.cache,
            dedup: self.options.dedup,
            dedup_key: self.options.dedup_key,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_fingerprint_depends_on_method_url_body() {
        let a = RequestDescriptor::builder(Method::Post, "/lessons").body("x").build().unwrap();
        let b = RequestDescriptor::builder(Method::Post, "/lessons").body("x").build().unwrap();
        let c = RequestDescriptor::builder(Method::Post, "/lessons").body("y").build().unwrap();
        let d = RequestDescriptor::builder(Method::Put, "/lessons").body("x").build().unwrap();

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_ne!(a.fingerprint(), d.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_dedup_defaults_follow_idempotency() {
        let get = RequestDescriptor::builder(Method::Get, "/a").build().unwrap();
        let post = RequestDescriptor::builder(Method::Post, "/a").build().unwrap();
        let opted_in = RequestDescriptor::builder(Method::Post, "/a").dedup(true).build().unwrap();

        assert!(get.dedup_enabled());
        assert!(!post.dedup_enabled());
        assert!(opted_in.dedup_enabled());
    }

    #[test]
    fn test_explicit_keys_win() {
        let request = RequestDescriptor::builder(Method::Get, "/feed")
            .cache(CacheOptions::new(CacheStrategy::CacheFirst).with_key("feed"))
            .dedup_key("feed-dedup")
            .build()
            .unwrap();
        assert_eq!(request.cache_key(), "feed");
        assert_eq!(request.dedup_key(), "feed-dedup");

        let plain = RequestDescriptor::builder(Method::Get, "/feed").build().unwrap();
        assert_eq!(plain.cache_key(), "GET:/feed");
    }

    #[test]
    fn test_cache_reads_and_writes() {
        let get = RequestDescriptor::builder(Method::Get, "/a")
            .cache_strategy(CacheStrategy::CacheFirst)
            .build()
            .unwrap();
        let put = RequestDescriptor::builder(Method::Put, "/a")
            .cache_strategy(CacheStrategy::CacheFirst)
            .build()
            .unwrap();
        let post = RequestDescriptor::builder(Method::Post, "/a")
            .cache_strategy(CacheStrategy::CacheFirst)
            .build()
            .unwrap();

        assert!(get.reads_cache() && get.writes_cache());
        assert!(put.reads_cache() && !put.writes_cache());
        assert!(!post.reads_cache());
    }

    #[test]
    fn test_with_header_replaces_case_insensitively() {
        let request = RequestDescriptor::builder(Method::Get, "/a")
            .header("authorization", "Bearer old")
            .build()
            .unwrap()
            .with_header("Authorization", "Bearer new");

        assert_eq!(request.headers().len(), 1);
        assert_eq!(request.header("AUTHORIZATION"), Some("Bearer new"));
    }

    #[test]
    fn test_build_validation() {
        let err = RequestDescriptor::builder(Method::Get, "  ").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = RequestDescriptor::builder(Method::Get, "/a")
            .timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_options_apply_and_json_body() {
        let options = RequestOptions::new()
            .with_priority(Priority::High)
            .with_timeout(Duration::from_secs(2))
            .with_header("X-Trace", "1");
        let request = RequestDescriptor::builder(Method::Post, "/a")
            .options(options)
            .json(&serde_json::json!({"k": 1}))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(request.priority(), Priority::High);
        assert_eq!(request.timeout(), Some(Duration::from_secs(2)));
        assert_eq!(request.header("x-trace"), Some("1"));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.body(), Some(br#"{"k":1}"#.as_slice()));
    }

    #[test]
    fn test_replay_gets_fresh_id() {
        let request = RequestDescriptor::builder(Method::Get, "/a").build().unwrap();
        let replay = request.replay();
        assert_ne!(request.id(), replay.id());
        assert_eq!(request.url(), replay.url());
    }
}
