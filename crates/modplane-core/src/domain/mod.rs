//! Domain models for modplane.
//!
//! Canonical definitions for the core entities:
//! - `ModuleDefinition`: immutable template of one module version
//! - `ModuleInstance`: a module attached to a policy, with its current config
//! - `DependencyItem`: what a module needs from other modules or the agent
//! - `Agent`: the agent fields dependency checks read

pub mod agent;
pub mod dependency;
pub mod error;
pub mod module;
pub mod validation;

// Re-export main types and errors
pub use agent::Agent;
pub use dependency::{DependencyItem, DependencyType, SELF_MODULE};
pub use error::{ModplaneError, Result, ValidationError};
pub use module::{
    ActionConfig, ActionConfigItem, EventConfig, EventConfigAction, EventConfigItem,
    EventConfigSeq, EventType, FileChecksum, FilesChecksums, ModuleConfig, ModuleDefinition,
    ModuleInfo, ModuleInstance, ModuleState, ModuleStatus, SecureConfig, SecureParameter,
    SemVersion,
};
pub use validation::{validate_definition, validate_instance};
