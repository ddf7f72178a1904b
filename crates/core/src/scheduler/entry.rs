use std::sync::Arc;

use chrono::{DateTime, Utc};
use courier_domain::{
    PipelineError, Priority, RequestDescriptor, RequestId, RequestStatus, RequestSummary,
    Response,
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

pub(crate) type Responder = oneshot::Sender<Result<Response, PipelineError>>;

/// One scheduled request and its mutable lifecycle state.
#[derive(Debug)]
pub(crate) struct QueueEntry {
    pub(crate) request: Arc<RequestDescriptor>,
    pub(crate) status: RequestStatus,
    pub(crate) attempts: u32,
    pub(crate) enqueued_at: DateTime<Utc>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) effective_priority: Priority,
    pub(crate) cancel: CancellationToken,
    responder: Option<Responder>,
}

impl QueueEntry {
    pub(crate) fn new(
        request: Arc<RequestDescriptor>,
        enqueued_at: DateTime<Utc>,
        responder: Responder,
    ) -> Self {
        let effective_priority = request.priority();
        Self {
            request,
            status: RequestStatus::Queued,
            attempts: 0,
            enqueued_at,
            started_at: None,
            effective_priority,
            cancel: CancellationToken::new(),
            responder: Some(responder),
        }
    }

    pub(crate) fn id(&self) -> RequestId {
        self.request.id()
    }

    pub(crate) fn activate(&mut self, now: DateTime<Utc>) {
        self.status = RequestStatus::Active;
        self.started_at = Some(now);
    }

    /// Record a retry: the entry drops one priority step.
    ///
    /// The entry is not re-queued. It keeps its concurrency slot through the
    /// backoff sleep; the lowered `effective_priority` only changes how it is
    /// counted by the anti-starvation rule and what introspection reports.
    pub(crate) fn demote(&mut self) {
        self.status = RequestStatus::Retrying;
        self.effective_priority = self.effective_priority.demote();
    }

    /// Deliver the final outcome. Returns false if it was already delivered.
    pub(crate) fn settle(&mut self, result: Result<Response, PipelineError>) -> bool {
        let Some(responder) = self.responder.take() else {
            return false;
        };
        self.status = match &result {
            Ok(_) => RequestStatus::Done,
            Err(e) if e.kind() == courier_domain::ErrorKind::Cancelled => RequestStatus::Cancelled,
            Err(_) => RequestStatus::Failed,
        };
        // the caller may have stopped waiting
        let _ = responder.send(result);
        true
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.responder.is_none()
    }

    pub(crate) fn summary(&self) -> RequestSummary {
        RequestSummary {
            id: self.id(),
            method: self.request.method(),
            url: self.request.url().to_string(),
            priority: self.request.priority(),
            effective_priority: self.effective_priority,
            status: self.status,
            attempts: self.attempts,
            enqueued_at: self.enqueued_at,
            started_at: self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use courier_domain::Method;

    use super::*;

    fn entry(priority: Priority) -> (QueueEntry, oneshot::Receiver<Result<Response, PipelineError>>) {
        let request = RequestDescriptor::builder(Method::Get, "/a").priority(priority).build().unwrap();
        let (tx, rx) = oneshot::channel();
        (QueueEntry::new(Arc::new(request), Utc::now(), tx), rx)
    }

    #[test]
    fn test_settle_delivers_once() {
        let (mut entry, mut rx) = entry(Priority::Normal);
        assert!(entry.settle(Ok(Response::ok("x"))));
        assert!(!entry.settle(Err(PipelineError::cancelled("late"))));
        assert_eq!(entry.status, RequestStatus::Done);
        assert_eq!(rx.try_recv().unwrap().unwrap().status(), 200);
    }

    #[test]
    fn test_demote_tracks_effective_priority() {
        let (mut entry, _rx) = entry(Priority::High);
        entry.demote();
        entry.demote();
        let summary = entry.summary();
        assert_eq!(summary.priority, Priority::High);
        assert_eq!(summary.effective_priority, Priority::Low);
        assert_eq!(summary.status, RequestStatus::Retrying);
    }
}
