//! JSON Schema validation.
//!
//! Module schemas use draft-07 vocabulary (`definitions` and
//! `#/definitions/...` references), so the validator is pinned to that draft.

use jsonschema::{Draft, Validator};
use serde_json::Value;

use crate::error::SchemaMergeError;
use crate::Result;

/// Upper bound on reported validation errors per document.
pub const MAX_REPORTED_ERRORS: usize = 20;

/// Compiled draft-07 validator.
pub struct SchemaValidator {
    validator: Validator,
}

impl SchemaValidator {
    /// Compile `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaMergeError::InvalidSchema`] if the schema is malformed
    /// or references a definition that does not exist.
    pub fn new(schema: &Value) -> Result<Self> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft7)
            .build(schema)
            .map_err(|e| SchemaMergeError::InvalidSchema(e.to_string()))?;
        Ok(Self { validator })
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        self.validator.is_valid(value)
    }

    /// Human-readable validation errors, capped at [`MAX_REPORTED_ERRORS`].
    pub fn errors(&self, value: &Value) -> Vec<String> {
        self.validator
            .iter_errors(value)
            .take(MAX_REPORTED_ERRORS)
            .map(|e| e.to_string())
            .collect()
    }

    /// Validate `value`, collecting errors on failure.
    pub fn validate(&self, value: &Value) -> Result<()> {
        if self.is_valid(value) {
            return Ok(());
        }
        Err(SchemaMergeError::Unresolvable {
            errors: self.errors(value),
        })
    }
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator").finish_non_exhaustive()
    }
}

/// Compile `schema` and check `value` in one step.
///
/// A schema that fails to compile is treated as not matching.
pub fn is_valid(schema: &Value, value: &Value) -> bool {
    SchemaValidator::new(schema)
        .map(|v| v.is_valid(value))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_document_passes() {
        let schema = json!({"type": "object", "properties": {"a": {"type": "integer"}}});
        let validator = SchemaValidator::new(&schema).unwrap();
        assert!(validator.is_valid(&json!({"a": 1})));
        assert!(validator.validate(&json!({"a": 1})).is_ok());
    }

    #[test]
    fn test_invalid_document_reports_errors() {
        let schema = json!({"type": "object", "properties": {"a": {"type": "integer"}}});
        let validator = SchemaValidator::new(&schema).unwrap();
        let err = validator.validate(&json!({"a": "x"})).unwrap_err();
        match err {
            SchemaMergeError::Unresolvable { errors } => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_definitions_refs_resolve() {
        let schema = json!({
            "definitions": {"port": {"type": "integer", "minimum": 1}},
            "type": "object",
            "properties": {"port": {"$ref": "#/definitions/port"}}
        });
        assert!(is_valid(&schema, &json!({"port": 80})));
        assert!(!is_valid(&schema, &json!({"port": 0})));
    }

    #[test]
    fn test_malformed_schema_is_rejected() {
        let schema = json!({"type": 12});
        assert!(matches!(
            SchemaValidator::new(&schema),
            Err(SchemaMergeError::InvalidSchema(_))
        ));
        assert!(!is_valid(&schema, &json!({})));
    }
}
