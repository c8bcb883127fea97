//! Key sources for the secure-parameter cipher.
//!
//! A key source hands out raw symmetric key bytes on demand. The core never
//! caches or retries: a failing source is a hard configuration error.

use sha2::{Digest, Sha256};

use crate::error::CryptoError;
use crate::Result;

/// Capability that returns raw key bytes.
pub trait KeySource: Send + Sync {
    fn key(&self) -> Result<Vec<u8>>;
}

/// Key held in memory, mostly useful for tests and embedding.
#[derive(Clone)]
pub struct StaticKey(Vec<u8>);

impl StaticKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        StaticKey(bytes.into())
    }
}

impl std::fmt::Debug for StaticKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StaticKey({})", key_fingerprint(&self.0))
    }
}

impl KeySource for StaticKey {
    fn key(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}

/// Hex-encoded key read from an environment variable at call time.
#[derive(Debug, Clone)]
pub struct EnvKeySource {
    var: String,
}

impl EnvKeySource {
    pub fn new(var: &str) -> Self {
        EnvKeySource {
            var: var.to_string(),
        }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

impl KeySource for EnvKeySource {
    fn key(&self) -> Result<Vec<u8>> {
        let raw = std::env::var(&self.var)
            .map_err(|_| CryptoError::KeyUnavailable(format!("{} is not set", self.var)))?;
        Ok(hex::decode(raw.trim())?)
    }
}

/// Short, non-reversible identifier for a key, safe to log.
pub fn key_fingerprint(key: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hex::encode(&hasher.finalize()[..8])
}
