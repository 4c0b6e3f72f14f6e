//! Payload encryption for Pulse.
//!
//! This module provides the envelope the collector expects on every
//! request body:
//! - AES in CBC mode with PKCS#7 padding
//! - A fixed pre-shared key (AES-256 for the built-in key)
//! - A fixed all-zero IV, prepended to the ciphertext
//! - Standard padded base64 of `IV || ciphertext`
//!
//! # Security Notes
//!
//! The zero IV makes the output deterministic: identical plaintexts produce
//! identical envelopes, and there is no authentication tag. The collector's
//! decryptor depends on this exact layout, so it is kept as is. Treat the
//! envelope as obfuscation in transit on top of TLS, not as confidentiality
//! against anyone holding the client binary.

use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use zeroize::Zeroizing;

/// AES block size, also the IV length (128 bits = 16 bytes).
pub const BLOCK_SIZE: usize = 16;

/// Length of the built-in key (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Key shared with the collector.
pub(crate) const BUILTIN_KEY: &[u8; KEY_SIZE] = b"kVPCA?PUB4kQo,T<A9=2-S)+NRk)#<X5";

const ZERO_IV: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// Crypto errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Invalid key length.
    #[error("invalid key length: expected 16, 24 or 32, got {actual}")]
    InvalidKeyLength {
        /// Actual length.
        actual: usize,
    },
}

/// Symmetric envelope around request bodies.
///
/// Key material is wiped from memory when the envelope is dropped.
#[derive(Clone)]
pub struct Envelope {
    key: Zeroizing<Vec<u8>>,
}

impl Envelope {
    /// Envelope using the key shared with the collector.
    pub fn new() -> Self {
        Self {
            key: Zeroizing::new(BUILTIN_KEY.to_vec()),
        }
    }

    /// Envelope with a custom key.
    ///
    /// Accepts 16, 24 or 32 bytes (AES-128, AES-192, AES-256).
    pub fn with_key(key: &[u8]) -> Result<Self, CryptoError> {
        match key.len() {
            16 | 24 | 32 => Ok(Self {
                key: Zeroizing::new(key.to_vec()),
            }),
            actual => Err(CryptoError::InvalidKeyLength { actual }),
        }
    }

    /// Key length in bits.
    pub fn key_bits(&self) -> usize {
        self.key.len() * 8
    }

    /// Encrypt a plaintext and return the base64 envelope.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let ciphertext = self.encrypt_bytes(plaintext.as_bytes())?;

        let mut framed = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
        framed.extend_from_slice(&ZERO_IV);
        framed.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(framed))
    }

    fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key: &[u8] = &self.key;
        let ciphertext = match key.len() {
            16 => cbc::Encryptor::<aes::Aes128>::new_from_slices(key, &ZERO_IV)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
            24 => cbc::Encryptor::<aes::Aes192>::new_from_slices(key, &ZERO_IV)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
            32 => cbc::Encryptor::<aes::Aes256>::new_from_slices(key, &ZERO_IV)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
            actual => return Err(CryptoError::InvalidKeyLength { actual }),
        };
        ciphertext.map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

// Don't leak keys in debug output
impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Envelope {{ key: [REDACTED], bits: {} }}", self.key_bits())
    }
}
