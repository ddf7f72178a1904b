//! Conversions from external infrastructure errors into pipeline errors.

use courier_core::StoreError;
use courier_domain::{ErrorKind, PipelineError};

/* -------------------------------------------------------------------------- */
/* reqwest::Error → PipelineError */
/* -------------------------------------------------------------------------- */

/// Classify a transport failure.
///
/// Timeouts become `Timeout`, builder and url failures become `Validation`,
/// everything else that prevented a response is `Network`.
pub fn from_reqwest(err: reqwest::Error) -> PipelineError {
    let message = err.to_string();
    let kind = if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_builder() {
        ErrorKind::Validation
    } else {
        ErrorKind::Network
    };

    PipelineError::new(kind, format!("http: {message}")).with_cause(err)
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → StoreError */
/* -------------------------------------------------------------------------- */

/// Wrap an I/O failure, keeping the key that was being touched.
pub fn from_io(key: &str, err: std::io::Error) -> StoreError {
    tracing::debug!(key, error = %err, "persistent store I/O failed");
    StoreError::Io(err)
}
