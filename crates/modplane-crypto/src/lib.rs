//! Modplane-Crypto: Secure Parameter Encryption
//!
//! This crate provides the byte- and string-level encryption used to keep
//! module secure parameters encrypted at rest.
//!
//! ## Layer 0 - Primitives
//!
//! Focus: a self-contained ciphertext format and hard failure on bad keys.
//! Parameter-set semantics (what "encrypted" means for a whole config) live
//! in `modplane-core`.

pub mod cipher;
pub mod config;
pub mod envelope;
pub mod error;
pub mod key;

pub use cipher::{AesGcmEncryptor, Encryptor, KEY_LEN, NONCE_LEN};
pub use config::{CryptoConfig, DEFAULT_KEY_ENV, DEFAULT_PREFIX};
pub use envelope::{ConfigEncryptor, DbConfigEncryptor};
pub use error::CryptoError;
pub use key::{key_fingerprint, EnvKeySource, KeySource, StaticKey};

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Build an AES-GCM envelope encryptor from an in-memory key.
pub fn encryptor_from_key(key: &[u8], prefix: &str) -> Result<DbConfigEncryptor> {
    let cipher = AesGcmEncryptor::new(&StaticKey::new(key.to_vec()))?;
    Ok(DbConfigEncryptor::new(cipher, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encryptor_from_key_roundtrip() {
        let enc = encryptor_from_key(&[9u8; KEY_LEN], "foo").unwrap();
        let value = enc.encrypt_value(br#"{"key1":1.1,"key2":["s1","s2"]}"#).unwrap();
        assert!(value.starts_with("foo."));
        assert_eq!(
            enc.decrypt_value(&value).unwrap(),
            br#"{"key1":1.1,"key2":["s1","s2"]}"#
        );
    }

    #[test]
    fn test_encryptor_from_key_rejects_wrong_length() {
        assert!(encryptor_from_key(&[9u8; 31], "foo").is_err());
    }
}
