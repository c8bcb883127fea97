//! Domain-level error taxonomy for modplane.

/// Structural problems found in a module definition or instance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("module name must not be empty")]
    EmptyName,

    #[error("{owner}: priority {priority} is outside 1..=100")]
    InvalidPriority { owner: String, priority: u64 },

    #[error("{owner}: duplicate entry {entry}")]
    DuplicateEntry { owner: String, entry: String },

    #[error("dependency #{index} of type {dep_type} has no module name")]
    MissingDependencyModule { index: usize, dep_type: String },

    #[error("{field} is not a valid version: {value}")]
    InvalidVersion { field: String, value: String },

    #[error("{document} is not a JSON Schema document")]
    InvalidSchema { document: String },

    #[error("event {event}: {reason}")]
    InvalidEvent { event: String, reason: String },

    #[error("secure config not encrypted: {}", sets.join(", "))]
    NotEncrypted { sets: Vec<String> },
}

/// modplane domain errors.
#[derive(Debug, thiserror::Error)]
pub enum ModplaneError {
    #[error("definition {definition} does not match instance module {instance}")]
    IdentityMismatch { instance: String, definition: String },

    #[error("invalid module definition: {0}")]
    InvalidDefinition(#[source] ValidationError),

    #[error("failed to decrypt secure parameter {param}: {reason}")]
    DecryptFailed { param: String, reason: String },

    #[error("failed to encrypt secure parameter {param}: {reason}")]
    EncryptFailed { param: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type for modplane domain operations.
pub type Result<T> = std::result::Result<T, ModplaneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_mismatch_display() {
        let err = ModplaneError::IdentityMismatch {
            instance: "syslog".to_string(),
            definition: "netflow".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("syslog"));
        assert!(msg.contains("netflow"));
    }

    #[test]
    fn test_not_encrypted_lists_sets() {
        let err = ValidationError::NotEncrypted {
            sets: vec![
                "secure_default_config".to_string(),
                "secure_current_config".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "secure config not encrypted: secure_default_config, secure_current_config"
        );
    }

    #[test]
    fn test_validation_converts_into_domain_error() {
        let err: ModplaneError = ValidationError::EmptyName.into();
        assert!(err.to_string().contains("validation error"));
    }
}
