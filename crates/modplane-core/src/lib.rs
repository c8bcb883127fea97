//! Modplane Core Library
//!
//! Module lifecycle on policies: reconciling a customized module instance
//! against a new module version, checking that the dependency graph between
//! modules and agents is consistent, and keeping secure parameters encrypted
//! at rest.
//!
//! ## Layer 1 - Lifecycle
//!
//! Every operation is a synchronous function over caller-loaded values. The
//! crate performs no I/O; persistence stays with the caller.

pub mod consistency;
pub mod domain;
pub mod lifecycle;
pub mod metrics;
pub mod obs;
pub mod reconcile;
pub mod secure;
pub mod telemetry;
pub mod version;

pub use domain::{
    validate_definition, validate_instance, ActionConfig, ActionConfigItem, Agent,
    DependencyItem, DependencyType, EventConfig, EventConfigAction, EventConfigItem,
    EventConfigSeq, EventType, FileChecksum, FilesChecksums, ModplaneError, ModuleConfig,
    ModuleDefinition, ModuleInfo, ModuleInstance, ModuleState, ModuleStatus, Result,
    SecureConfig, SecureParameter, SemVersion, ValidationError, SELF_MODULE,
};

pub use consistency::{
    agent_consistency, group_consistency, policy_consistency, ConsistencyReport,
    DependencyVerdict,
};
pub use lifecycle::{compare_changes, detach_module, ModuleChanges};
pub use metrics::METRICS;
pub use reconcile::{
    merge_action_config, merge_event_config, merge_plain_config, merge_secure_config,
    prune_dynamic_dependencies, reconcile, MergeOutcome, ReconcileSummary, Reconciler,
};
pub use secure::SecureParamCrypto;
pub use version::{compare_versions, VersionComparison};

pub use modplane_crypto::{ConfigEncryptor, CryptoConfig, CryptoError};
pub use schema_merge::{SchemaGuidedMerge, SchemaMerge};
