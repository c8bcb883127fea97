//! Schema-Merge: Schema-Guided JSON Merging
//!
//! This crate reconciles a user-customised JSON document with a new default
//! document under a JSON Schema, and carries the built-in schema definitions
//! every module's action and event config schema relies on.
//!
//! ## Layer 0 - Primitives
//!
//! Focus: a pluggable merge strategy whose output either validates or is
//! reported as an error. Callers decide what to do on failure.

pub mod definitions;
pub mod error;
pub mod merge;
pub mod validator;

pub use definitions::{
    attach_definitions, property_schema, with_action_definitions, with_event_definitions,
};
pub use error::SchemaMergeError;
pub use merge::{SchemaGuidedMerge, SchemaMerge};
pub use validator::SchemaValidator;

/// Result type for schema merge operations
pub type Result<T> = std::result::Result<T, SchemaMergeError>;
