use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

/// Scheduler counters
#[derive(Debug, Default)]
pub(crate) struct PipelineMetrics {
    enqueued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    retried: AtomicU64,
    rejected: AtomicU64,
}

impl PipelineMetrics {
    pub(crate) fn record_enqueue(&self) {
        self.enqueued.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn record_completion(&self) {
        self.completed.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn record_cancellation(&self) {
        self.cancelled.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retried.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn record_rejection(&self) {
        self.rejected.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            enqueued: self.enqueued.load(AtomicOrdering::Relaxed),
            completed: self.completed.load(AtomicOrdering::Relaxed),
            failed: self.failed.load(AtomicOrdering::Relaxed),
            cancelled: self.cancelled.load(AtomicOrdering::Relaxed),
            retried: self.retried.load(AtomicOrdering::Relaxed),
            rejected: self.rejected.load(AtomicOrdering::Relaxed),
            deduplicated: 0,
        }
    }
}

/// Lifetime request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub enqueued: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// Retry attempts across all requests.
    pub retried: u64,
    /// Rejected with `QueueOverflow`.
    pub rejected: u64,
    /// Callers served by another caller's in-flight execution. Filled in by
    /// the client, which owns the deduplicator.
    pub deduplicated: u64,
}

/// Point-in-time scheduler view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub queue_length: usize,
    pub active_count: usize,
    pub max_concurrency: usize,
    pub paused: bool,
    pub stats: PipelineStats,
}
