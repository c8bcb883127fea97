//! Ciphertext envelope for values stored in configuration documents.
//!
//! A sealed value is rendered as `"<prefix>.<base64>"` (or bare base64 when
//! no prefix is configured). The envelope is what the secure-parameter layer
//! treats as "the ciphertext format".

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::cipher::{AesGcmEncryptor, Encryptor};
use crate::error::CryptoError;
use crate::Result;

/// String-level encryptor for configuration values.
pub trait ConfigEncryptor: Send + Sync {
    /// Seal raw bytes into an envelope string.
    fn encrypt_value(&self, data: &[u8]) -> Result<String>;
    /// Open an envelope string back into raw bytes.
    fn decrypt_value(&self, value: &str) -> Result<Vec<u8>>;
    /// Whether `value` looks like an envelope produced by this encryptor.
    fn is_format_match(&self, value: &str) -> bool;
}

/// Envelope encryptor wrapping a byte-level [`Encryptor`].
#[derive(Debug)]
pub struct DbConfigEncryptor<E = AesGcmEncryptor> {
    encryptor: E,
    prefix: String,
}

impl<E: Encryptor> DbConfigEncryptor<E> {
    /// An empty `prefix` produces bare base64 envelopes.
    pub fn new(encryptor: E, prefix: &str) -> Self {
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}.", prefix)
        };
        DbConfigEncryptor { encryptor, prefix }
    }

    fn ciphered(&self, value: &str) -> Result<Vec<u8>> {
        let body = value
            .strip_prefix(self.prefix.as_str())
            .ok_or(CryptoError::InvalidFormat)?;
        Ok(STANDARD.decode(body)?)
    }
}

impl<E: Encryptor> ConfigEncryptor for DbConfigEncryptor<E> {
    fn encrypt_value(&self, data: &[u8]) -> Result<String> {
        let sealed = self.encryptor.encrypt(data)?;
        Ok(format!("{}{}", self.prefix, STANDARD.encode(sealed)))
    }

    fn decrypt_value(&self, value: &str) -> Result<Vec<u8>> {
        let ciphered = self.ciphered(value)?;
        self.encryptor.decrypt(&ciphered)
    }

    fn is_format_match(&self, value: &str) -> bool {
        self.ciphered(value).is_ok()
    }
}
