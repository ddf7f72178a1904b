//! Port interfaces for the collaborators the pipeline drives
//!
//! Adapters live in `courier-infra`; tests provide in-memory mocks.

use std::time::Duration;

use async_trait::async_trait;
use courier_common::codec::CodecError;
use courier_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use courier_domain::{ErrorKind, LinkQuality, PipelineError, RequestDescriptor, Response, Token};
use thiserror::Error;

/// Performs one network call.
///
/// Implementations must not retry internally. A response with a non-2xx
/// status is returned as `Ok`; only failures to obtain a response at all
/// (connect, DNS, reset, malformed reply) are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestDescriptor) -> Result<Response, PipelineError>;
}

/// Supplies bearer tokens.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current token, if the user is signed in.
    async fn token(&self) -> Result<Option<Token>, PipelineError>;

    /// Obtain a fresh token. The pipeline never runs two refreshes at once.
    async fn refresh(&self) -> Result<Token, PipelineError>;
}

/// Reports reachability.
#[async_trait]
pub trait ConnectivityOracle: Send + Sync {
    async fn is_online(&self) -> bool;

    async fn quality(&self) -> LinkQuality {
        LinkQuality::Unknown
    }
}

/// Oracle used when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait]
impl ConnectivityOracle for AlwaysOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

/// Durable byte store backing the persistent cache tier.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Persistent store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cached payload rejected: {0}")]
    Codec(#[from] CodecError),

    #[error("corrupt cache record '{key}': {message}")]
    Corrupt { key: String, message: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl StoreError {
    pub fn corrupt(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt { key: key.into(), message: message.into() }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Common(err.into())
    }
}

impl ErrorClassification for StoreError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Io(_) | Self::Unavailable(_) => true,
            Self::Codec(_) | Self::Corrupt { .. } => false,
            Self::Common(e) => e.is_retryable(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Io(_) | Self::Unavailable(_) => ErrorSeverity::Warning,
            Self::Codec(e) => e.severity(),
            Self::Corrupt { .. } => ErrorSeverity::Error,
            Self::Common(e) => e.severity(),
        }
    }

    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        let retryable = err.is_retryable();
        PipelineError::new(ErrorKind::Unknown, err.to_string())
            .with_retryable(retryable)
            .with_cause(err)
    }
}
