use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use super::{Codec, CodecError, CodecResult};

/// Compression algorithms supported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    Gzip,
    Zlib,
}

/// flate2-backed compression stage
#[derive(Debug, Clone, Copy)]
pub struct CompressionCodec {
    algorithm: CompressionAlgorithm,
    level: u32,
}

impl CompressionCodec {
    /// Create a compression stage; `level` is clamped to 0..=9.
    pub fn new(algorithm: CompressionAlgorithm, level: u32) -> Self {
        Self { algorithm, level: level.min(9) }
    }

    /// Configured algorithm.
    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    /// Compress `data`.
    pub fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        let level = Compression::new(self.level);
        let result = match self.algorithm {
            CompressionAlgorithm::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), level);
                encoder.write_all(data).and_then(|()| encoder.finish())
            }
            CompressionAlgorithm::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), level);
                encoder.write_all(data).and_then(|()| encoder.finish())
            }
        };
        result.map_err(|e| CodecError::Compression(format!("{:?}: {e}", self.algorithm)))
    }

    /// Decompress `data`.
    pub fn decompress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        let result = match self.algorithm {
            CompressionAlgorithm::Gzip => GzDecoder::new(data).read_to_end(&mut out),
            CompressionAlgorithm::Zlib => ZlibDecoder::new(data).read_to_end(&mut out),
        };
        result
            .map(|_| out)
            .map_err(|e| CodecError::Malformed(format!("{:?} stream: {e}", self.algorithm)))
    }
}

impl Default for CompressionCodec {
    fn default() -> Self {
        Self::new(CompressionAlgorithm::Gzip, 6)
    }
}

impl Codec for CompressionCodec {
    fn name(&self) -> &'static str {
        match self.algorithm {
            CompressionAlgorithm::Gzip => "gzip",
            CompressionAlgorithm::Zlib => "zlib",
        }
    }

    fn encode(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        self.compress(data)
    }

    fn decode(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        self.decompress(data)
    }
}
