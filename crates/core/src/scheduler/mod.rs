//! Priority queue with a concurrency gate
//!
//! [`Scheduler::submit`] places a request in the queue and returns a
//! [`RequestHandle`] that resolves with the request's single final outcome.
//! A dispatcher task admits queued entries while fewer than
//! `max_concurrency` are active:
//!
//! - the queue is ordered HIGH > NORMAL > LOW, FIFO within a level
//! - once HIGH entries hold more than `high_priority_ratio` of the
//!   concurrency budget, the next non-HIGH entry is admitted ahead of them
//! - a full queue rejects new work with `QueueOverflow`
//!
//! Each admitted entry runs on its own task through the [`Retrier`]; it keeps
//! its slot across retries and loses one priority step per retry.

mod entry;
mod queue;
pub mod stats;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_common::error::CommonError;
use courier_common::time::SharedClock;
use courier_domain::{
    ErrorKind, PipelineError, Priority, RequestDescriptor, RequestId, RequestSummary, Response,
    SchedulerConfig,
};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use self::entry::QueueEntry;
use self::queue::RequestQueue;
use self::stats::PipelineMetrics;
pub use self::stats::{PipelineStats, PipelineStatus};
use crate::retry::{Retrier, RetryObserver};

/// Resolves with the outcome of a submitted request.
#[derive(Debug)]
pub struct RequestHandle {
    id: RequestId,
    receiver: oneshot::Receiver<Result<Response, PipelineError>>,
}

impl RequestHandle {
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Future for RequestHandle {
    type Output = Result<Response, PipelineError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.receiver.poll_unpin(cx).map(|received| {
            received.unwrap_or_else(|_| Err(PipelineError::cancelled("request dropped by scheduler")))
        })
    }
}

#[derive(Debug)]
struct SchedulerState {
    queue: RequestQueue,
    active: HashMap<RequestId, QueueEntry>,
    max_concurrency: usize,
    paused: bool,
    closed: bool,
}

struct SchedulerInner {
    state: Mutex<SchedulerState>,
    notify: Arc<Notify>,
    shutdown: CancellationToken,
    retrier: Retrier,
    clock: SharedClock,
    metrics: PipelineMetrics,
    max_queue_size: usize,
    high_priority_ratio: f64,
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Bounded-concurrency priority scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Scheduler")
            .field("queued", &state.queue.len())
            .field("active", &state.active.len())
            .field("max_concurrency", &state.max_concurrency)
            .field("paused", &state.paused)
            .finish()
    }
}

impl Scheduler {
    /// Create the scheduler and start its dispatcher on the current runtime.
    ///
    /// # Errors
    /// Fails when called outside a Tokio runtime.
    pub fn start(
        config: &SchedulerConfig,
        retrier: Retrier,
        clock: SharedClock,
    ) -> Result<Self, PipelineError> {
        let runtime = Handle::try_current().map_err(|_| {
            PipelineError::from(CommonError::internal("scheduler requires an active Tokio runtime"))
        })?;

        let notify = Arc::new(Notify::new());
        let shutdown = CancellationToken::new();
        let inner = Arc::new(SchedulerInner {
            state: Mutex::new(SchedulerState {
                queue: RequestQueue::default(),
                active: HashMap::new(),
                max_concurrency: config.max_concurrency.max(1),
                paused: false,
                closed: false,
            }),
            notify: notify.clone(),
            shutdown: shutdown.clone(),
            retrier,
            clock,
            metrics: PipelineMetrics::default(),
            max_queue_size: config.max_queue_size,
            high_priority_ratio: config.high_priority_ratio,
        });

        runtime.spawn(dispatch_loop(Arc::downgrade(&inner), notify, shutdown));
        info!(
            max_concurrency = config.max_concurrency,
            max_queue_size = config.max_queue_size,
            "scheduler started"
        );
        Ok(Self { inner })
    }

    /// Queue a request.
    ///
    /// # Errors
    /// `QueueOverflow` when the queue is full, `Validation` for an id that is
    /// already scheduled, `Cancelled` after shutdown. Rejected requests never
    /// enter the queue.
    pub fn submit(&self, request: RequestDescriptor) -> Result<RequestHandle, PipelineError> {
        let id = request.id();
        let priority = request.priority();
        let (responder, receiver) = oneshot::channel();
        let entry = QueueEntry::new(Arc::new(request), self.inner.now(), responder);

        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(PipelineError::cancelled("scheduler is shut down"));
            }
            if state.queue.len() >= self.inner.max_queue_size {
                drop(state);
                self.inner.metrics.record_rejection();
                warn!(request_id = %id, capacity = self.inner.max_queue_size, "queue full, rejecting request");
                return Err(PipelineError::queue_overflow(self.inner.max_queue_size));
            }
            if state.active.contains_key(&id) || state.queue.iter().any(|queued| queued.id() == id) {
                return Err(PipelineError::validation(format!("request {id} is already scheduled")));
            }
            state.queue.push(entry);
        }

        self.inner.metrics.record_enqueue();
        debug!(request_id = %id, %priority, "request queued");
        self.inner.notify.notify_one();
        Ok(RequestHandle { id, receiver })
    }

    /// Queue a request and wait for its outcome.
    ///
    /// # Errors
    /// Any submission error, or the request's final error.
    #[instrument(skip_all, fields(request_id = %request.id(), priority = %request.priority()))]
    pub async fn enqueue(&self, request: RequestDescriptor) -> Result<Response, PipelineError> {
        self.submit(request)?.await
    }

    /// Cancel a queued or active request. The caller receives `Cancelled`
    /// immediately; an active request's transport call is dropped.
    ///
    /// Returns false for unknown or already settled ids.
    pub fn cancel(&self, id: RequestId) -> bool {
        let mut state = self.inner.state.lock();
        if let Some(mut entry) = state.queue.remove(id) {
            drop(state);
            entry.settle(Err(PipelineError::cancelled("request cancelled while queued")));
            self.inner.metrics.record_cancellation();
            debug!(request_id = %id, "cancelled queued request");
            return true;
        }
        match state.active.get_mut(&id) {
            Some(entry) if !entry.is_settled() => {
                entry.cancel.cancel();
                entry.settle(Err(PipelineError::cancelled("request cancelled while active")));
                self.inner.metrics.record_cancellation();
                debug!(request_id = %id, "cancelled active request");
                true
            }
            _ => false,
        }
    }

    /// Stop admitting new work. Active requests continue.
    pub fn pause(&self) {
        self.inner.state.lock().paused = true;
        info!("scheduler paused");
    }

    /// Resume admission, optionally with a new concurrency limit.
    pub fn resume(&self, max_concurrency: Option<usize>) {
        {
            let mut state = self.inner.state.lock();
            state.paused = false;
            if let Some(limit) = max_concurrency {
                state.max_concurrency = limit.max(1);
            }
        }
        info!(?max_concurrency, "scheduler resumed");
        self.inner.notify.notify_one();
    }

    /// Cancel every queued request; returns how many were removed.
    pub fn clear(&self) -> usize {
        let drained: Vec<QueueEntry> = self.inner.state.lock().queue.drain().collect();
        let count = drained.len();
        for mut entry in drained {
            entry.settle(Err(PipelineError::cancelled("request queue cleared")));
            self.inner.metrics.record_cancellation();
        }
        if count > 0 {
            info!(count, "cleared request queue");
        }
        count
    }

    /// Cancel queued and active work and stop the dispatcher. Later
    /// submissions fail with `Cancelled`.
    pub fn shutdown(&self) -> usize {
        let (queued, active_ids) = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            let queued: Vec<QueueEntry> = state.queue.drain().collect();
            let active_ids: Vec<RequestId> = state.active.keys().copied().collect();
            (queued, active_ids)
        };

        let mut cancelled = 0;
        for mut entry in queued {
            entry.settle(Err(PipelineError::cancelled("scheduler shut down")));
            self.inner.metrics.record_cancellation();
            cancelled += 1;
        }
        for id in active_ids {
            if self.cancel(id) {
                cancelled += 1;
            }
        }
        self.inner.shutdown.cancel();
        info!(cancelled, "scheduler shut down");
        cancelled
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn status(&self) -> PipelineStatus {
        let state = self.inner.state.lock();
        PipelineStatus {
            queue_length: state.queue.len(),
            active_count: state.active.len(),
            max_concurrency: state.max_concurrency,
            paused: state.paused,
            stats: self.inner.metrics.snapshot(),
        }
    }

    /// Queued requests in dispatch order.
    pub fn queued_requests(&self) -> Vec<RequestSummary> {
        self.inner.state.lock().queue.iter().map(QueueEntry::summary).collect()
    }

    /// Active requests, oldest first.
    pub fn active_requests(&self) -> Vec<RequestSummary> {
        let mut active: Vec<RequestSummary> =
            self.inner.state.lock().active.values().map(QueueEntry::summary).collect();
        active.sort_by_key(|summary| summary.started_at);
        active
    }
}

impl SchedulerInner {
    fn now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.clock.system_time())
    }

    /// Admit queued entries while slots are free.
    fn dispatch_ready(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if state.paused || state.closed {
            return;
        }

        while state.active.len() < state.max_concurrency && !state.queue.is_empty() {
            let high_active = state
                .active
                .values()
                .filter(|entry| entry.effective_priority == Priority::High)
                .count();
            let skip_high =
                high_active as f64 > self.high_priority_ratio * state.max_concurrency as f64;

            let Some(mut entry) = state.queue.pop_next(skip_high) else {
                break;
            };
            entry.activate(self.now());
            let id = entry.id();
            let request = Arc::clone(&entry.request);
            let cancel = entry.cancel.clone();
            debug!(
                request_id = %id,
                priority = %entry.effective_priority,
                active = state.active.len() + 1,
                skip_high,
                "admitting request"
            );
            state.active.insert(id, entry);

            let inner = Arc::clone(self);
            tokio::spawn(async move {
                let observer = EntryObserver { inner: inner.as_ref(), id };
                let result = inner.retrier.execute_with(&request, &cancel, &observer).await;
                inner.finish(id, result);
            });
        }
    }

    fn finish(&self, id: RequestId, result: Result<Response, PipelineError>) {
        let entry = self.state.lock().active.remove(&id);
        if let Some(mut entry) = entry {
            if !entry.is_settled() {
                match &result {
                    Ok(_) => self.metrics.record_completion(),
                    Err(e) if e.kind() == ErrorKind::Cancelled => {
                        self.metrics.record_cancellation();
                    }
                    Err(_) => self.metrics.record_failure(),
                }
                entry.settle(result);
            }
        }
        self.notify.notify_one();
    }
}

/// Mirrors retrier progress into the active entry.
struct EntryObserver<'a> {
    inner: &'a SchedulerInner,
    id: RequestId,
}

impl RetryObserver for EntryObserver<'_> {
    fn on_attempt(&self, attempt: u32) {
        if let Some(entry) = self.inner.state.lock().active.get_mut(&self.id) {
            entry.attempts = attempt;
        }
    }

    fn on_retry(&self, _attempt: u32, _delay: Duration, _error: &PipelineError) {
        self.inner.metrics.record_retry();
        if let Some(entry) = self.inner.state.lock().active.get_mut(&self.id) {
            entry.demote();
        }
    }
}

async fn dispatch_loop(inner: Weak<SchedulerInner>, notify: Arc<Notify>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = notify.notified() => {}
        }
        let Some(inner) = inner.upgrade() else { break };
        inner.dispatch_ready();
    }
    debug!("scheduler dispatcher stopped");
}
