//! Shared error types for the Courier crates.
//!
//! [`CommonError`] covers failures that show up in more than one crate
//! (configuration, encoding, storage, deadlines, upstream services).
//! [`ErrorClassification`] is how the retrier and the log layer look at any
//! error: retryable or not, how severe, and whether the failing party asked
//! for a delay.
//!
//! Module errors compose `CommonError` instead of duplicating its variants:
//!
//! ```rust,ignore
//! #[derive(Debug, thiserror::Error)]
//! pub enum StoreError {
//!     #[error("entry is corrupt: {0}")]
//!     Corrupt(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Infrastructure failures shared across crates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommonError {
    /// Invalid or missing configuration.
    #[error("Configuration error{}: {message}", in_field(.field.as_deref()))]
    Config { message: String, field: Option<String> },

    /// A payload could not be encoded or decoded.
    #[error("Could not process {format} payload: {message}")]
    Serialization { format: &'static str, message: String },

    /// The backing store failed.
    #[error("Storage failure{}: {message}", for_key(.key.as_deref()))]
    Persistence { message: String, key: Option<String> },

    /// An operation ran past its deadline.
    #[error("'{operation}' did not finish within {after:?}")]
    Timeout { operation: String, after: Duration },

    /// A remote dependency answered with a failure.
    #[error("Upstream '{service}' failed: {message}")]
    Upstream { service: String, message: String, retryable: bool },

    /// Rejected input.
    #[error("Invalid '{field}': {message}")]
    Validation { field: String, message: String },

    /// Broken invariant.
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// A background task stopped before finishing.
    #[error("Task '{task}' cancelled{}", because(.reason.as_deref()))]
    Cancelled { task: String, reason: Option<String> },
}

fn in_field(field: Option<&str>) -> String {
    field.map(|f| format!(" in field '{f}'")).unwrap_or_default()
}

fn for_key(key: Option<&str>) -> String {
    key.map(|k| format!(" for key '{k}'")).unwrap_or_default()
}

fn because(reason: Option<&str>) -> String {
    reason.map(|r| format!(": {r}")).unwrap_or_default()
}

impl CommonError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Configuration error naming the offending field, e.g.
    /// `scheduler.max_concurrency`.
    pub fn config_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    pub fn serialization(format: &'static str, message: impl Into<String>) -> Self {
        Self::Serialization { format, message: message.into() }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence { message: message.into(), key: None }
    }

    pub fn persistence_key(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence { message: message.into(), key: Some(key.into()) }
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout { operation: operation.into(), after }
    }

    pub fn upstream(service: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self::Upstream { service: service.into(), message: message.into(), retryable }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    pub fn cancelled(task: impl Into<String>, reason: Option<&str>) -> Self {
        Self::Cancelled { task: task.into(), reason: reason.map(str::to_string) }
    }
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Upstream { retryable, .. } => *retryable,
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Cancelled { .. } => ErrorSeverity::Info,
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Internal { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Uniform view over any error that can cross a crate boundary.
pub trait ErrorClassification {
    /// Whether repeating the operation may succeed.
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    /// Whether the error signals a broken invariant.
    fn is_critical(&self) -> bool;

    /// Delay suggested by the failing party (e.g. a `Retry-After` header).
    fn retry_after(&self) -> Option<Duration>;
}

/// Severity used to pick log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        })
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("JSON", err.to_string())
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization("TOML", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `CommonError::config` rendering for the with and without
    /// field scenarios.
    ///
    /// Assertions:
    /// - Confirms the field name is part of the message when present.
    /// - Ensures configuration errors are non-retryable errors.
    #[test]
    fn test_config_error_rendering() {
        let plain = CommonError::config("no file found");
        assert_eq!(plain.to_string(), "Configuration error: no file found");

        let field = CommonError::config_field("max_concurrency", "must be at least 1");
        assert_eq!(
            field.to_string(),
            "Configuration error in field 'max_concurrency': must be at least 1"
        );
        assert!(!field.is_retryable());
        assert_eq!(field.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_timeout_is_retryable_warning() {
        let err = CommonError::timeout("persistent_get", Duration::from_secs(5));
        assert_eq!(err.to_string(), "'persistent_get' did not finish within 5s");
        assert!(err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_upstream_retryable_flag() {
        assert!(CommonError::upstream("identity", "busy", true).is_retryable());
        assert!(!CommonError::upstream("identity", "revoked", false).is_retryable());
    }

    #[test]
    fn test_internal_is_critical() {
        let err = CommonError::internal("index out of sync");
        assert!(err.is_critical());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_cancelled_and_persistence_rendering() {
        assert_eq!(
            CommonError::cancelled("sweeper", Some("shutdown")).to_string(),
            "Task 'sweeper' cancelled: shutdown"
        );
        assert_eq!(CommonError::cancelled("sweeper", None).to_string(), "Task 'sweeper' cancelled");
        assert_eq!(
            CommonError::persistence_key("courier:__index__", "disk full").to_string(),
            "Storage failure for key 'courier:__index__': disk full"
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }

    #[test]
    fn test_conversions_tag_format() {
        let json: CommonError =
            serde_json::from_str::<serde_json::Value>("{not json").unwrap_err().into();
        assert!(matches!(json, CommonError::Serialization { format: "JSON", .. }));

        let io: CommonError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(io, CommonError::Persistence { key: None, .. }));
        assert!(io.to_string().contains("missing"));
    }
}
