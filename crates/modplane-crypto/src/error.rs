//! Error types for modplane-crypto

use thiserror::Error;

/// Errors that can occur while sealing or opening secure parameter values
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key source could not produce a key
    #[error("failed to get the key: {0}")]
    KeyUnavailable(String),

    /// Key has the wrong length for the cipher
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Key material is not valid hex
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(#[from] hex::FromHexError),

    /// Cipher refused to seal the plaintext
    #[error("failed to encrypt data")]
    EncryptFailed,

    /// Cipher refused to open the ciphertext (wrong key, tampering, truncation)
    #[error("failed to decrypt data: {0}")]
    DecryptFailed(String),

    /// Ciphertext envelope does not carry the expected prefix
    #[error("invalid value format")]
    InvalidFormat,

    /// Ciphertext envelope body is not valid base64
    #[error("failed to decode base64 string: {0}")]
    Base64(#[from] base64::DecodeError),
}
