//! Crypto configuration

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cipher::AesGcmEncryptor;
use crate::envelope::DbConfigEncryptor;
use crate::key::EnvKeySource;
use crate::Result;

/// Default environment variable holding the hex-encoded 32-byte key.
pub const DEFAULT_KEY_ENV: &str = "MODPLANE_DB_ENCRYPT_KEY";

/// Environment variable overriding the envelope prefix.
pub const PREFIX_ENV: &str = "MODPLANE_DB_ENCRYPT_PREFIX";

/// Default envelope prefix.
pub const DEFAULT_PREFIX: &str = "enc";

/// Secure parameter crypto configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CryptoConfig {
    /// Environment variable the key is read from
    pub key_env: String,
    /// Envelope prefix (empty for bare base64)
    pub prefix: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        CryptoConfig {
            key_env: DEFAULT_KEY_ENV.to_string(),
            prefix: std::env::var(PREFIX_ENV).unwrap_or_else(|_| DEFAULT_PREFIX.to_string()),
        }
    }
}

impl CryptoConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Read the key from a different environment variable
    pub fn with_key_env(mut self, var: &str) -> Self {
        self.key_env = var.to_string();
        self
    }

    /// Set envelope prefix
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Build the envelope encryptor described by this config.
    ///
    /// Fails if the key variable is unset, not hex, or not 32 bytes.
    pub fn build(&self) -> Result<DbConfigEncryptor> {
        let source = EnvKeySource::new(&self.key_env);
        let cipher = AesGcmEncryptor::new(&source)?;
        info!(key_env = %self.key_env, prefix = %self.prefix, "secure parameter encryptor configured");
        Ok(DbConfigEncryptor::new(cipher, &self.prefix))
    }
}
