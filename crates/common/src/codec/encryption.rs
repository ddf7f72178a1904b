//! AES-256-GCM stage with optional Argon2 key derivation.
//!
//! Stored layout is `nonce (12 bytes) || ciphertext+tag`. A fresh random nonce
//! is drawn for every encode.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::Argon2;
use sha2::{Digest, Sha256};

use super::{Codec, CodecError, CodecResult};

/// Key length in bytes for AES-256.
pub const KEY_LEN: usize = 32;

/// Nonce length in bytes for AES-GCM.
pub const NONCE_LEN: usize = 12;

/// Split view of an encrypted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Serialize as `nonce || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse `nonce || ciphertext`.
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        if bytes.len() < NONCE_LEN {
            return Err(CodecError::Malformed(format!(
                "encrypted payload shorter than nonce ({} bytes)",
                bytes.len()
            )));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| CodecError::Malformed("nonce must be 12 bytes".to_string()))?;
        Ok(Self { nonce, ciphertext: ciphertext.to_vec() })
    }
}

/// AES-256-GCM encryption stage.
#[derive(Clone)]
pub struct EncryptionCodec {
    cipher: Aes256Gcm,
    fingerprint: String,
}

impl std::fmt::Debug for EncryptionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionCodec")
            .field("key", &"[REDACTED]")
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl EncryptionCodec {
    /// Create a stage from a raw 32-byte key.
    pub fn new(key: &[u8]) -> CodecResult<Self> {
        if key.len() != KEY_LEN {
            return Err(CodecError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CodecError::InvalidKey(format!("cipher init: {e}")))?;
        let digest = Sha256::digest(key);
        let fingerprint = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
        Ok(Self { cipher, fingerprint })
    }

    /// Derive the key from a password with Argon2.
    ///
    /// The salt must be stable across restarts for previously written entries
    /// to stay readable, and at least 8 bytes long.
    pub fn from_password(password: &str, salt: &[u8]) -> CodecResult<Self> {
        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(password.as_bytes(), salt, &mut key)
            .map_err(|e| CodecError::InvalidKey(format!("key derivation failed: {e}")))?;
        Self::new(&key)
    }

    /// Generate a random 32-byte key.
    pub fn generate_key() -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    /// Short hex fingerprint of the key, safe to log.
    pub fn key_fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Encrypt `data` under a fresh nonce.
    pub fn encrypt(&self, data: &[u8]) -> CodecResult<EncryptedData> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), data)
            .map_err(|e| CodecError::Encryption(e.to_string()))?;
        Ok(EncryptedData { nonce, ciphertext })
    }

    /// Decrypt and authenticate a payload.
    pub fn decrypt(&self, encrypted: &EncryptedData) -> CodecResult<Vec<u8>> {
        self.cipher
            .decrypt(Nonce::from_slice(&encrypted.nonce), encrypted.ciphertext.as_ref())
            .map_err(|_| CodecError::Encryption("authentication failed".to_string()))
    }
}

impl Codec for EncryptionCodec {
    fn name(&self) -> &'static str {
        "aes-256-gcm"
    }

    fn encode(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        Ok(self.encrypt(data)?.to_bytes())
    }

    fn decode(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        self.decrypt(&EncryptedData::from_bytes(data)?)
    }
}
