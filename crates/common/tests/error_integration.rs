//! Integration tests for `courier_common::error`.
//!
//! These suites validate classification and module error composition so the
//! retrier and logging layers see consistent failure semantics.

use std::time::Duration;

use courier_common::error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
use thiserror::Error;

/// Validates that `CommonError` classification surfaces the expected
/// retryable, severity and criticality combinations for each variant.
#[test]
fn classification_matrix_matches_expected_contract() {
    let cases = vec![
        (CommonError::config("missing base url"), false, ErrorSeverity::Error, false),
        (CommonError::serialization("JSON", "bad index"), false, ErrorSeverity::Error, false),
        (CommonError::persistence_key("courier:a", "disk full"), false, ErrorSeverity::Error, false),
        (
            CommonError::timeout("store_get", Duration::from_millis(250)),
            true,
            ErrorSeverity::Warning,
            false,
        ),
        (CommonError::upstream("identity", "busy", true), true, ErrorSeverity::Error, false),
        (CommonError::validation("ttl", "must be positive"), false, ErrorSeverity::Error, false),
        (CommonError::internal("broken invariant"), false, ErrorSeverity::Critical, true),
        (
            CommonError::cancelled("sweeper", Some("shutdown")),
            false,
            ErrorSeverity::Info,
            false,
        ),
    ];

    for (err, retryable, severity, critical) in cases {
        assert_eq!(err.is_retryable(), retryable, "retryable mismatch for {err}");
        assert_eq!(err.severity(), severity, "severity mismatch for {err}");
        assert_eq!(err.is_critical(), critical, "critical mismatch for {err}");
    }
}

#[derive(Debug, Error)]
enum StoreError {
    #[error("entry is corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ErrorClassification for StoreError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Corrupt(_) => false,
            Self::Common(e) => e.is_retryable(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Corrupt(_) => ErrorSeverity::Error,
            Self::Common(e) => e.severity(),
        }
    }

    fn is_critical(&self) -> bool {
        match self {
            Self::Corrupt(_) => false,
            Self::Common(e) => e.is_critical(),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Corrupt(_) => None,
            Self::Common(e) => e.retry_after(),
        }
    }
}

fn read_index(raw: &str) -> Result<serde_json::Value, StoreError> {
    let parsed: CommonResult<serde_json::Value> = serde_json::from_str(raw).map_err(Into::into);
    Ok(parsed?)
}

/// Validates that module errors composing `CommonError` delegate
/// classification and keep the original message.
#[test]
fn module_error_delegates_to_common() {
    let err = read_index("{broken").unwrap_err();
    assert!(matches!(err, StoreError::Common(CommonError::Serialization { .. })));
    assert!(err.to_string().contains("JSON"));
    assert!(!err.is_retryable());

    let timeout: StoreError = CommonError::timeout("store_get", Duration::from_secs(1)).into();
    assert!(timeout.is_retryable());
    assert_eq!(timeout.severity(), ErrorSeverity::Warning);

    let corrupt = StoreError::Corrupt("index".into());
    assert!(!corrupt.is_critical());
    assert_eq!(corrupt.retry_after(), None);
}

/// Validates `From<toml::de::Error>` tags TOML parse failures.
#[test]
fn toml_errors_are_tagged() {
    let err: CommonError = toml::from_str::<toml::Value>("= nope").unwrap_err().into();
    assert!(matches!(err, CommonError::Serialization { format: "TOML", .. }));
    assert!(err.to_string().starts_with("Could not process TOML payload"));
}
