use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Method, Priority, RequestId};
use crate::impl_wire_name;

/// Lifecycle state of a scheduled request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Queued,
    Active,
    Retrying,
    Done,
    Failed,
    Cancelled,
}

impl_wire_name!(RequestStatus {
    Queued => "queued",
    Active => "active",
    Retrying => "retrying",
    Done => "done",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl RequestStatus {
    /// The request holds a concurrency slot.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active | Self::Retrying)
    }

    /// The request has settled.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

/// Point-in-time view of a queued or active request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub id: RequestId,
    pub method: Method,
    pub url: String,
    /// Priority the request was submitted with.
    pub priority: Priority,
    /// Priority after retry demotions.
    pub effective_priority: Priority,
    pub status: RequestStatus,
    /// Attempts started so far.
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}
