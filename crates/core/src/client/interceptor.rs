//! Request/response interceptors
//!
//! Request hooks run in registration order before dispatch; response hooks
//! run in reverse order after it, so the first interceptor registered sees
//! the final outcome.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use courier_common::time::SharedClock;
use courier_domain::constants::{AUTHORIZATION_HEADER, REQUEST_ID_HEADER};
use courier_domain::{ErrorKind, PipelineError, RequestDescriptor};
use tracing::{debug, info, warn};

use crate::auth::CredentialGate;
use crate::dedup::SharedResult;

/// Sends a request through the pipeline without running interceptors.
#[async_trait]
pub trait Replay: Send + Sync {
    async fn replay(&self, request: RequestDescriptor) -> SharedResult;
}

/// Hook around every request issued by a client.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Identifier used by `Client::remove_interceptor`.
    fn name(&self) -> &str;

    /// Augment the descriptor before dispatch. An error aborts the request.
    async fn on_request(
        &self,
        request: RequestDescriptor,
    ) -> Result<RequestDescriptor, PipelineError> {
        Ok(request)
    }

    /// Transform or recover the outcome. `replay` may be used to resend a
    /// modified copy of the request.
    async fn on_response(
        &self,
        _request: &RequestDescriptor,
        result: SharedResult,
        _replay: &dyn Replay,
    ) -> SharedResult {
        result
    }
}

/// Stamps `X-Request-Id` and logs each outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingInterceptor;

#[async_trait]
impl Interceptor for TracingInterceptor {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn on_request(
        &self,
        request: RequestDescriptor,
    ) -> Result<RequestDescriptor, PipelineError> {
        if request.header(REQUEST_ID_HEADER).is_some() {
            return Ok(request);
        }
        let id = request.id().to_string();
        Ok(request.with_header(REQUEST_ID_HEADER, id))
    }

    async fn on_response(
        &self,
        request: &RequestDescriptor,
        result: SharedResult,
        _replay: &dyn Replay,
    ) -> SharedResult {
        let elapsed_ms = (Utc::now() - request.created_at()).num_milliseconds();
        match &result {
            Ok(response) => debug!(
                request_id = %request.id(),
                method = %request.method(),
                url = request.url(),
                status = response.status(),
                elapsed_ms,
                "request completed"
            ),
            Err(e) => debug!(
                request_id = %request.id(),
                method = %request.method(),
                url = request.url(),
                kind = %e.kind(),
                elapsed_ms,
                "request failed"
            ),
        }
        result
    }
}

/// Injects bearer tokens and recovers a 401 with one refresh and replay.
#[derive(Debug)]
pub struct AuthInterceptor {
    gate: Arc<CredentialGate>,
    clock: SharedClock,
}

impl AuthInterceptor {
    pub fn new(gate: Arc<CredentialGate>, clock: SharedClock) -> Self {
        Self { gate, clock }
    }
}

#[async_trait]
impl Interceptor for AuthInterceptor {
    fn name(&self) -> &str {
        "auth"
    }

    async fn on_request(
        &self,
        request: RequestDescriptor,
    ) -> Result<RequestDescriptor, PipelineError> {
        let now = self.clock.system_time().into();
        match self.gate.current(now).await? {
            Some(token) => Ok(request.with_header(AUTHORIZATION_HEADER, token.bearer())),
            None => Ok(request),
        }
    }

    async fn on_response(
        &self,
        request: &RequestDescriptor,
        result: SharedResult,
        replay: &dyn Replay,
    ) -> SharedResult {
        let rejected = match &result {
            Err(e) if e.kind() == ErrorKind::Auth => e.clone(),
            _ => return result,
        };

        let token = match self.gate.refresh().await {
            Ok(token) => token,
            Err(refresh_error) => {
                warn!(request_id = %request.id(), "401 could not be recovered");
                return Err(PipelineError::new(
                    ErrorKind::Auth,
                    format!("{}; token refresh failed: {}", rejected.message(), refresh_error.message()),
                )
                .with_status(401)
                .with_cause(refresh_error));
            }
        };

        let retry = request.replay().with_header(AUTHORIZATION_HEADER, token.bearer());
        info!(request_id = %request.id(), replay_id = %retry.id(), "replaying request with refreshed token");
        replay.replay(retry).await
    }
}
