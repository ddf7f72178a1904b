//! Error types surfaced by the pipeline
//!
//! Every failure that leaves the client is a [`PipelineError`]: a closed
//! [`ErrorKind`] plus message, optional HTTP status, retryability, an optional
//! server-suggested delay and the underlying cause.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use serde::{Deserialize, Serialize};

use crate::constants::RETRY_AFTER_HEADER;
use crate::impl_wire_name;
use crate::types::Response;

/// Closed error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection refused, reset, DNS failure, or offline.
    Network,
    /// Attempt exceeded its deadline.
    Timeout,
    /// HTTP 401.
    Auth,
    /// HTTP 403.
    Permission,
    /// Other HTTP 4xx, or a malformed request or response.
    Validation,
    /// HTTP 429.
    RateLimit,
    /// HTTP 5xx.
    Server,
    /// Scheduler queue is full.
    QueueOverflow,
    /// Cancelled by the caller or by shutdown.
    Cancelled,
    /// `CacheOnly` request found no entry.
    CacheMiss,
    Unknown,
}

impl_wire_name!(ErrorKind {
    Network => "network",
    Timeout => "timeout",
    Auth => "auth",
    Permission => "permission",
    Validation => "validation",
    RateLimit => "rate_limit",
    Server => "server",
    QueueOverflow => "queue_overflow",
    Cancelled => "cancelled",
    CacheMiss => "cache_miss",
    Unknown => "unknown",
});

impl ErrorKind {
    /// Kinds the retrier repeats by default.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::RateLimit | Self::Server)
    }

    /// Classify an HTTP status; `None` for 1xx, 2xx and 3xx.
    pub const fn from_status(status: u16) -> Option<Self> {
        match status {
            401 => Some(Self::Auth),
            403 => Some(Self::Permission),
            429 => Some(Self::RateLimit),
            400..=499 => Some(Self::Validation),
            500..=599 => Some(Self::Server),
            _ => None,
        }
    }
}

/// Normalized pipeline failure.
///
/// Cloneable so one settled failure can be handed to every deduplicated
/// waiter.
#[derive(Debug, Clone)]
pub struct PipelineError {
    kind: ErrorKind,
    message: String,
    status_code: Option<u16>,
    retryable: bool,
    retry_after: Option<Duration>,
    cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl PipelineError {
    /// New error whose retryability follows the kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            retryable: kind.is_retryable(),
            retry_after: None,
            cause: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// Offline fail-fast; never retried.
    pub fn offline() -> Self {
        Self::network("device is offline").with_retryable(false)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(ErrorKind::Timeout, format!("request timed out after {after:?}"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn queue_overflow(capacity: usize) -> Self {
        Self::new(ErrorKind::QueueOverflow, format!("request queue is full ({capacity} entries)"))
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, reason)
    }

    pub fn cache_miss(key: &str) -> Self {
        Self::new(ErrorKind::CacheMiss, format!("no cached entry for '{key}'"))
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Classify a non-2xx response, honouring `Retry-After` on 429 and 503.
    ///
    /// Returns `None` for statuses that are not failures.
    pub fn from_response(response: &Response) -> Option<Self> {
        Self::from_response_at(response, Utc::now())
    }

    /// [`PipelineError::from_response`] with an explicit "now" for HTTP-date
    /// `Retry-After` values.
    pub fn from_response_at(response: &Response, now: DateTime<Utc>) -> Option<Self> {
        let status = response.status();
        let kind = ErrorKind::from_status(status)?;
        let snippet: String =
            String::from_utf8_lossy(response.body()).chars().take(200).collect();
        let message = if snippet.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", snippet.trim())
        };

        let mut err = Self::new(kind, message);
        err.status_code = Some(status);
        if matches!(status, 429 | 503) {
            err.retry_after = response
                .header(RETRY_AFTER_HEADER)
                .and_then(|value| parse_retry_after(value, now));
        }
        Some(err)
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    #[must_use]
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    #[must_use]
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    #[must_use]
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn retryable(&self) -> bool {
        self.retryable
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl StdError for PipelineError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn StdError + 'static))
    }
}

impl ErrorClassification for PipelineError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn severity(&self) -> ErrorSeverity {
        match self.kind {
            ErrorKind::Cancelled | ErrorKind::CacheMiss => ErrorSeverity::Info,
            ErrorKind::Timeout
            | ErrorKind::RateLimit
            | ErrorKind::QueueOverflow
            | ErrorKind::Network => ErrorSeverity::Warning,
            ErrorKind::Auth
            | ErrorKind::Permission
            | ErrorKind::Validation
            | ErrorKind::Server
            | ErrorKind::Unknown => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

impl From<CommonError> for PipelineError {
    fn from(err: CommonError) -> Self {
        let kind = match &err {
            CommonError::Timeout { .. } => ErrorKind::Timeout,
            CommonError::Validation { .. } | CommonError::Serialization { .. } => {
                ErrorKind::Validation
            }
            CommonError::Upstream { .. } => ErrorKind::Network,
            CommonError::Cancelled { .. } => ErrorKind::Cancelled,
            CommonError::Config { .. }
            | CommonError::Persistence { .. }
            | CommonError::Internal { .. } => ErrorKind::Unknown,
        };
        let retryable = err.is_retryable();
        Self::new(kind, err.to_string()).with_retryable(retryable).with_cause(err)
    }
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP date.
///
/// Dates in the past yield a zero delay.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ErrorKind::from_status(401), Some(ErrorKind::Auth));
        assert_eq!(ErrorKind::from_status(403), Some(ErrorKind::Permission));
        assert_eq!(ErrorKind::from_status(404), Some(ErrorKind::Validation));
        assert_eq!(ErrorKind::from_status(429), Some(ErrorKind::RateLimit));
        assert_eq!(ErrorKind::from_status(503), Some(ErrorKind::Server));
        assert_eq!(ErrorKind::from_status(204), None);
        assert_eq!(ErrorKind::from_status(304), None);
    }

    #[test]
    fn test_retryable_kinds() {
        for kind in [ErrorKind::Network, ErrorKind::Timeout, ErrorKind::RateLimit, ErrorKind::Server]
        {
            assert!(PipelineError::new(kind, "x").retryable(), "{kind} should retry");
        }
        for kind in [
            ErrorKind::Auth,
            ErrorKind::Permission,
            ErrorKind::Validation,
            ErrorKind::QueueOverflow,
            ErrorKind::Cancelled,
        ] {
            assert!(!PipelineError::new(kind, "x").retryable(), "{kind} should not retry");
        }
        assert!(!PipelineError::offline().retryable());
        assert_eq!(PipelineError::offline().kind(), ErrorKind::Network);
    }

    #[test]
    fn test_from_response_reads_retry_after_seconds() {
        let response = Response::new(429).with_header("Retry-After", "2");
        let err = PipelineError::from_response(&response).unwrap();
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(err.status_code(), Some(429));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert!(err.retryable());
    }

    #[test]
    fn test_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 50).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(10))
        );
        let later = Utc.with_ymd_and_hms(2015, 10, 21, 8, 0, 0).unwrap();
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", later), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn test_success_is_not_an_error() {
        assert!(PipelineError::from_response(&Response::ok("fine")).is_none());
    }

    #[test]
    fn test_error_message_includes_body_snippet() {
        let err = PipelineError::from_response(&Response::new(400).with_body("missing field"))
            .unwrap();
        assert_eq!(err.to_string(), "validation error: HTTP 400: missing field");
    }

    #[test]
    fn test_from_common_error_keeps_cause() {
        let err: PipelineError = CommonError::timeout("store", Duration::from_secs(1)).into();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.retryable());
        assert!(StdError::source(&err).is_some());
    }
}
