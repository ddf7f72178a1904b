//! Attempt execution with timeout, classification and backoff
//!
//! [`Retrier`] owns the transport. Each attempt races the transport call
//! against the request timeout; non-2xx responses are classified into
//! [`PipelineError`]s and retried while the error is retryable and the
//! policy allows. A server-provided `Retry-After` replaces the computed
//! delay.

pub mod backoff;

use std::sync::Arc;
use std::time::Duration;

use courier_domain::{PipelineError, RequestDescriptor, Response, RetryPolicy};
use courier_common::error::ErrorClassification;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

pub use self::backoff::{delay_for, delay_with_rng};
use crate::ports::Transport;

/// Hooks the scheduler uses to track attempts of an active entry.
pub trait RetryObserver: Send + Sync {
    /// Attempt `attempt` (1-based) is about to start.
    fn on_attempt(&self, _attempt: u32) {}

    /// Attempt `attempt` failed with a retryable error; the next one starts
    /// after `delay`.
    fn on_retry(&self, _attempt: u32, _delay: Duration, _error: &PipelineError) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RetryObserver for NoopObserver {}

/// Executes requests against a [`Transport`] with retries.
#[derive(Clone)]
pub struct Retrier {
    transport: Arc<dyn Transport>,
    default_timeout: Duration,
    default_policy: RetryPolicy,
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("default_timeout", &self.default_timeout)
            .field("default_policy", &self.default_policy)
            .finish_non_exhaustive()
    }
}

impl Retrier {
    pub fn new(
        transport: Arc<dyn Transport>,
        default_timeout: Duration,
        default_policy: RetryPolicy,
    ) -> Self {
        Self { transport, default_timeout, default_policy }
    }

    /// Execute without cancellation or observation.
    pub async fn execute(&self, request: &RequestDescriptor) -> Result<Response, PipelineError> {
        self.execute_with(request, &CancellationToken::new(), &NoopObserver).await
    }

    /// Execute until success, a terminal error, exhausted retries or
    /// cancellation. Cancelling drops the in-flight transport call.
    #[instrument(
        skip_all,
        fields(request_id = %request.id(), method = %request.method(), url = %request.url())
    )]
    pub async fn execute_with(
        &self,
        request: &RequestDescriptor,
        cancel: &CancellationToken,
        observer: &dyn RetryObserver,
    ) -> Result<Response, PipelineError> {
        let policy = request.retry_policy().unwrap_or(&self.default_policy);
        let timeout = request.timeout().unwrap_or(self.default_timeout);
        let mut attempt: u32 = 0;

        loop {
            observer.on_attempt(attempt + 1);
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(PipelineError::cancelled("request cancelled")),
                outcome = self.attempt(request, timeout) => outcome,
            };

            let error = match outcome {
                Ok(response) => {
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "request succeeded after retrying");
                    }
                    return Ok(response);
                }
                Err(error) => error,
            };

            if !error.retryable() {
                debug!(error = %error, "terminal failure");
                return Err(error);
            }
            if attempt >= policy.max_retries {
                warn!(attempts = attempt + 1, error = %error, "retries exhausted");
                return Err(error);
            }

            let delay = error.retry_after().unwrap_or_else(|| delay_for(policy, attempt));
            observer.on_retry(attempt + 1, delay, &error);
            warn!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "attempt failed, retrying"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(PipelineError::cancelled("request cancelled")),
                () = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> Result<Response, PipelineError> {
        let response = tokio::time::timeout(timeout, self.transport.send(request))
            .await
            .map_err(|_| PipelineError::timeout(timeout))??;

        match PipelineError::from_response(&response) {
            Some(error) => Err(error),
            None => Ok(response),
        }
    }
}
