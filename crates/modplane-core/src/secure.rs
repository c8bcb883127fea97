//! Secure-parameter encryption state machine.
//!
//! A secure config set is either fully encrypted (at rest) or fully
//! plaintext (while being reconciled or shown to a privileged caller).
//! [`SecureParamCrypto`] moves sets between the two states and tells them
//! apart; the owner helpers on [`ModuleDefinition`] and [`ModuleInstance`]
//! apply it to the sets each owner holds.

use modplane_crypto::ConfigEncryptor;
use serde_json::Value;
use tracing::debug;

use crate::domain::{
    ModplaneError, ModuleDefinition, ModuleInstance, Result, SecureConfig, ValidationError,
};
use crate::metrics::METRICS;
use crate::obs;

/// Encrypts and decrypts the `value` of secure parameters in place.
#[derive(Clone, Copy)]
pub struct SecureParamCrypto<'a> {
    encryptor: &'a dyn ConfigEncryptor,
}

impl<'a> SecureParamCrypto<'a> {
    pub fn new(encryptor: &'a dyn ConfigEncryptor) -> Self {
        Self { encryptor }
    }

    /// True iff `set` is non-empty and every non-null value is a non-empty
    /// string in the encryptor's ciphertext format.
    pub fn is_encrypted(&self, set: &SecureConfig) -> bool {
        if set.is_empty() {
            return false;
        }
        set.values().all(|param| match &param.value {
            Value::Null => true,
            Value::String(s) => !s.is_empty() && self.encryptor.is_format_match(s),
            _ => false,
        })
    }

    /// First parameter holding ciphertext in a set that is not fully
    /// encrypted. Such a set cannot be moved to either state safely.
    pub fn mixed_parameter<'s>(&self, set: &'s SecureConfig) -> Option<&'s str> {
        if self.is_encrypted(set) {
            return None;
        }
        set.iter()
            .find(|(_, param)| {
                matches!(&param.value, Value::String(s) if !s.is_empty() && self.encryptor.is_format_match(s))
            })
            .map(|(name, _)| name.as_str())
    }

    /// Decrypt `set` if it is encrypted; a plaintext set is left alone.
    ///
    /// Fails with `DecryptFailed` on a set mixing ciphertext and plaintext.
    pub fn decrypt_if_encrypted(&self, set: &mut SecureConfig) -> Result<()> {
        if self.is_encrypted(set) {
            return self.decrypt(&mut [set]);
        }
        match self.mixed_parameter(set) {
            Some(name) => Err(decrypt_failed(name, MIXED_SET)),
            None => Ok(()),
        }
    }

    /// Encrypt `set` unless it already is encrypted.
    ///
    /// Fails with `EncryptFailed` on a set mixing ciphertext and plaintext.
    pub fn encrypt_if_plaintext(&self, set: &mut SecureConfig) -> Result<()> {
        if self.is_encrypted(set) {
            return Ok(());
        }
        if let Some(name) = self.mixed_parameter(set) {
            return Err(ModplaneError::EncryptFailed {
                param: name.to_string(),
                reason: MIXED_SET.to_string(),
            });
        }
        self.encrypt(&mut [set])
    }

    /// Encrypt every parameter of every set.
    ///
    /// Not idempotent: encrypting an encrypted set wraps the ciphertext again.
    pub fn encrypt(&self, sets: &mut [&mut SecureConfig]) -> Result<()> {
        for set in sets.iter_mut() {
            for (name, param) in set.iter_mut() {
                let plain = serde_json::to_vec(&param.value)?;
                let sealed = self.encryptor.encrypt_value(&plain).map_err(|e| {
                    ModplaneError::EncryptFailed {
                        param: name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                param.value = Value::String(sealed);
            }
        }
        Ok(())
    }

    /// Decrypt every non-null parameter of every set.
    ///
    /// Stops at the first failure; parameters already processed stay
    /// decrypted.
    pub fn decrypt(&self, sets: &mut [&mut SecureConfig]) -> Result<()> {
        for set in sets.iter_mut() {
            for (name, param) in set.iter_mut() {
                let sealed = match &param.value {
                    Value::Null => continue,
                    Value::String(s) => s,
                    _ => return Err(decrypt_failed(name, "value is not a string")),
                };
                let plain = self
                    .encryptor
                    .decrypt_value(sealed)
                    .map_err(|e| decrypt_failed(name, &e.to_string()))?;
                param.value = serde_json::from_slice(&plain)
                    .map_err(|e| decrypt_failed(name, &e.to_string()))?;
            }
        }
        Ok(())
    }
}

const MIXED_SET: &str = "set mixes ciphertext and plaintext values";

fn decrypt_failed(param: &str, reason: &str) -> ModplaneError {
    METRICS.inc_decrypt_failures();
    obs::emit_decrypt_failed(param, reason);
    ModplaneError::DecryptFailed {
        param: param.to_string(),
        reason: reason.to_string(),
    }
}

impl ModuleDefinition {
    pub fn is_encrypted(&self, crypto: &SecureParamCrypto<'_>) -> bool {
        crypto.is_encrypted(&self.secure_default_config)
    }

    /// Encrypt the default secure config unless it already is.
    pub fn encrypt_secure_parameters(&mut self, crypto: &SecureParamCrypto<'_>) -> Result<()> {
        crypto.encrypt_if_plaintext(&mut self.secure_default_config)
    }

    /// Decrypt the default secure config if it is encrypted.
    pub fn decrypt_secure_parameters(&mut self, crypto: &SecureParamCrypto<'_>) -> Result<()> {
        crypto.decrypt_if_encrypted(&mut self.secure_default_config)
    }
}

impl ModuleInstance {
    /// Whether either secure set is encrypted.
    pub fn is_encrypted(&self, crypto: &SecureParamCrypto<'_>) -> bool {
        crypto.is_encrypted(&self.secure_default_config)
            || crypto.is_encrypted(&self.secure_current_config)
    }

    /// Encrypt each secure set that is not already encrypted.
    pub fn encrypt_secure_parameters(&mut self, crypto: &SecureParamCrypto<'_>) -> Result<()> {
        crypto.encrypt_if_plaintext(&mut self.secure_default_config)?;
        crypto.encrypt_if_plaintext(&mut self.secure_current_config)?;
        debug!(module = %self.info.name, "secure parameters encrypted");
        Ok(())
    }

    /// Decrypt each secure set that is encrypted. A set holding both
    /// ciphertext and plaintext values is rejected.
    pub fn decrypt_secure_parameters(&mut self, crypto: &SecureParamCrypto<'_>) -> Result<()> {
        crypto.decrypt_if_encrypted(&mut self.secure_default_config)?;
        crypto.decrypt_if_encrypted(&mut self.secure_current_config)
    }

    /// Check that every non-empty secure set is encrypted, as required
    /// before persisting.
    ///
    /// # Errors
    ///
    /// [`ValidationError::NotEncrypted`] naming each offending set.
    pub fn validate_encryption(&self, crypto: &SecureParamCrypto<'_>) -> Result<()> {
        let sets: Vec<String> = [
            ("secure_default_config", &self.secure_default_config),
            ("secure_current_config", &self.secure_current_config),
        ]
        .into_iter()
        .filter(|(_, set)| !set.is_empty() && !crypto.is_encrypted(set))
        .map(|(name, _)| name.to_string())
        .collect();

        if sets.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::NotEncrypted { sets }.into())
        }
    }
}
