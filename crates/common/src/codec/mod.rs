//! Pluggable byte codecs for cached payloads
//!
//! The persistent cache tier writes every value through a [`Codec`]. Codecs
//! compose with [`CodecChain`]: encoding runs the stages in order, decoding
//! runs them in reverse, so a chain of `[compression, encryption]` compresses
//! first and decrypts first.
//!
//! ```rust
//! use courier_common::codec::{
//!     Codec, CodecChain, CompressionAlgorithm, CompressionCodec, EncryptionCodec,
//! };
//!
//! let chain = CodecChain::new()
//!     .with(CompressionCodec::new(CompressionAlgorithm::Gzip, 6))
//!     .with(EncryptionCodec::new(&EncryptionCodec::generate_key())?);
//!
//! let stored = chain.encode(b"cached body")?;
//! assert_eq!(chain.decode(&stored)?, b"cached body");
//! # Ok::<(), courier_common::codec::CodecError>(())
//! ```

mod compression;
mod encryption;

use std::sync::Arc;
use std::time::Duration;

pub use compression::{CompressionAlgorithm, CompressionCodec};
pub use encryption::{EncryptedData, EncryptionCodec, KEY_LEN, NONCE_LEN};
use thiserror::Error;

use crate::error::{CommonError, ErrorClassification, ErrorSeverity};

/// Result alias for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Codec failures
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("compression failed: {0}")]
    Compression(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ErrorClassification for CodecError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Common(e) => e.is_retryable(),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Encryption(_) | Self::InvalidKey(_) => ErrorSeverity::Critical,
            Self::Compression(_) | Self::Malformed(_) => ErrorSeverity::Error,
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

/// Reversible byte transformation.
pub trait Codec: Send + Sync + std::fmt::Debug {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Transform plain bytes into their stored form.
    fn encode(&self, data: &[u8]) -> CodecResult<Vec<u8>>;

    /// Reverse [`Codec::encode`].
    fn decode(&self, data: &[u8]) -> CodecResult<Vec<u8>>;
}

/// Pass-through codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl Codec for IdentityCodec {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn encode(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decode(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// Ordered stack of codecs applied as one.
#[derive(Debug, Clone, Default)]
pub struct CodecChain {
    stages: Vec<Arc<dyn Codec>>,
}

impl CodecChain {
    /// Empty chain (behaves like [`IdentityCodec`]).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    #[must_use]
    pub fn with<C: Codec + 'static>(mut self, codec: C) -> Self {
        self.stages.push(Arc::new(codec));
        self
    }

    /// Append an already shared stage.
    #[must_use]
    pub fn with_shared(mut self, codec: Arc<dyn Codec>) -> Self {
        self.stages.push(codec);
        self
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True when the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Codec for CodecChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn encode(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        let mut buf = data.to_vec();
        for stage in &self.stages {
            buf = stage.encode(&buf)?;
        }
        Ok(buf)
    }

    fn decode(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        let mut buf = data.to_vec();
        for stage in self.stages.iter().rev() {
            buf = stage.decode(&buf).inspect_err(|e| {
                tracing::debug!(stage = stage.name(), error = %e, "codec stage rejected payload");
            })?;
        }
        Ok(buf)
    }
}
