//! In-flight request deduplication
//!
//! The first caller for a key runs the executor; every caller that arrives
//! before it settles awaits the same shared future and receives a clone of
//! the same `Arc<Response>` (or the same error), however long the execution
//! takes. The record is removed as soon as the execution settles.
//!
//! A record whose waiters have all dropped their futures is abandoned. It can
//! still be joined (the shared execution resumes where it stopped), but once
//! it has been abandoned for longer than the grace period it is purged so
//! keys that never settle do not accumulate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use courier_domain::{PipelineError, Response};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Outcome shared by every waiter on one key.
pub type SharedResult = Result<Arc<Response>, PipelineError>;

type SharedExecution = Shared<BoxFuture<'static, SharedResult>>;

struct DedupRecord {
    execution: SharedExecution,
    waiters: usize,
    abandoned_at: Option<Instant>,
    generation: u64,
}

impl DedupRecord {
    fn is_stale(&self, now: Instant, grace: Duration) -> bool {
        self.abandoned_at.is_some_and(|since| now.duration_since(since) > grace)
    }
}

#[derive(Default)]
struct Records {
    by_key: HashMap<String, DedupRecord>,
}

struct DedupInner {
    records: Mutex<Records>,
    grace: Duration,
    generation: AtomicU64,
    joined: AtomicU64,
}

impl DedupInner {
    fn settle(&self, key: &str, generation: u64) {
        let mut records = self.records.lock();
        if records.by_key.get(key).is_some_and(|record| record.generation == generation) {
            records.by_key.remove(key);
        }
    }

    fn leave(&self, key: &str, generation: u64) {
        let mut records = self.records.lock();
        if let Some(record) = records.by_key.get_mut(key) {
            if record.generation == generation {
                record.waiters = record.waiters.saturating_sub(1);
                if record.waiters == 0 {
                    record.abandoned_at = Some(Instant::now());
                    debug!(key, "in-flight request abandoned by every waiter");
                }
            }
        }
    }
}

/// Decrements the waiter count when a caller's future completes or is
/// dropped.
struct WaiterGuard {
    inner: Weak<DedupInner>,
    key: String,
    generation: u64,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.leave(&self.key, self.generation);
        }
    }
}

/// Maps dedup keys to in-flight executions.
#[derive(Clone)]
pub struct Deduplicator {
    inner: Arc<DedupInner>,
}

impl std::fmt::Debug for Deduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator")
            .field("in_flight", &self.in_flight())
            .field("grace", &self.inner.grace)
            .finish()
    }
}

impl Deduplicator {
    pub fn new(grace: Duration) -> Self {
        Self {
            inner: Arc::new(DedupInner {
                records: Mutex::new(Records::default()),
                grace,
                generation: AtomicU64::new(0),
                joined: AtomicU64::new(0),
            }),
        }
    }

    /// Run `executor` once per key among concurrent callers.
    ///
    /// `executor` is only invoked by the caller that creates the record; it
    /// must not start work until the returned future is polled.
    pub async fn dedupe<F, Fut>(&self, key: &str, executor: F) -> SharedResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Response, PipelineError>> + Send + 'static,
    {
        let (execution, generation) = {
            let mut records = self.inner.records.lock();

            match records.by_key.get_mut(key) {
                Some(record) => {
                    record.waiters += 1;
                    record.abandoned_at = None;
                    self.inner.joined.fetch_add(1, AtomicOrdering::Relaxed);
                    debug!(key, waiters = record.waiters, "joined in-flight request");
                    (record.execution.clone(), record.generation)
                }
                None => {
                    let now = Instant::now();
                    let grace = self.inner.grace;
                    records.by_key.retain(|_, record| !record.is_stale(now, grace));
                    let generation = self.inner.generation.fetch_add(1, AtomicOrdering::Relaxed);
                    let execution = Self::wrap(
                        Arc::downgrade(&self.inner),
                        key.to_string(),
                        generation,
                        executor(),
                    );
                    records.by_key.insert(
                        key.to_string(),
                        DedupRecord {
                            execution: execution.clone(),
                            waiters: 1,
                            abandoned_at: None,
                            generation,
                        },
                    );
                    (execution, generation)
                }
            }
        };

        let _guard =
            WaiterGuard { inner: Arc::downgrade(&self.inner), key: key.to_string(), generation };
        execution.await
    }

    fn wrap<Fut>(
        inner: Weak<DedupInner>,
        key: String,
        generation: u64,
        execution: Fut,
    ) -> SharedExecution
    where
        Fut: Future<Output = Result<Response, PipelineError>> + Send + 'static,
    {
        async move {
            let result = execution.await.map(Arc::new);
            if let Some(inner) = inner.upgrade() {
                inner.settle(&key, generation);
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Keys with an unsettled execution.
    pub fn in_flight(&self) -> usize {
        self.inner.records.lock().by_key.len()
    }

    /// Callers currently sharing the execution for `key`.
    pub fn waiters(&self, key: &str) -> Option<usize> {
        self.inner.records.lock().by_key.get(key).map(|record| record.waiters)
    }

    /// Callers that joined an existing execution instead of starting one.
    pub fn joined_count(&self) -> u64 {
        self.inner.joined.load(AtomicOrdering::Relaxed)
    }

    /// Drop records that have had no waiters for longer than the grace
    /// period. Records with a live waiter are never purged.
    pub fn purge_stale(&self) -> usize {
        let now = Instant::now();
        let grace = self.inner.grace;
        let mut records = self.inner.records.lock();
        let before = records.by_key.len();
        records.by_key.retain(|_, record| !record.is_stale(now, grace));
        let purged = before - records.by_key.len();
        if purged > 0 {
            debug!(purged, "purged abandoned in-flight records");
        }
        purged
    }
}
