//! Error types for schema-guided merging

use thiserror::Error;

/// Errors raised while compiling schemas or merging documents
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaMergeError {
    /// The schema itself does not compile
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// The merged document still fails validation
    #[error("merge result does not satisfy schema: {}", errors.join("; "))]
    Unresolvable { errors: Vec<String> },
}
