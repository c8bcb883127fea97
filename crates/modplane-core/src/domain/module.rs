//! Module definitions and per-policy module instances.
//!
//! A [`ModuleDefinition`] is the immutable template of one module version.
//! A [`ModuleInstance`] is that module attached to a policy: it snapshots
//! the definition and carries the user's current configuration on top.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::dependency::DependencyItem;

/// Free-form plain configuration document.
pub type ModuleConfig = Map<String, Value>;

/// Secure configuration: parameter name to parameter.
pub type SecureConfig = BTreeMap<String, SecureParameter>;

/// Action name to action configuration.
pub type ActionConfig = BTreeMap<String, ActionConfigItem>;

/// Event name to event configuration.
pub type EventConfig = BTreeMap<String, EventConfigItem>;

/// Module file path to checksum.
pub type FilesChecksums = BTreeMap<String, FileChecksum>;

/// Decode `null` as the type's default; older records store empty lists as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn empty_schema() -> Value {
    Value::Object(Map::new())
}

/// A secret parameter. `value` is ciphertext at rest and plaintext while
/// being reconciled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecureParameter {
    #[serde(default)]
    pub server_only: bool,
    #[serde(default)]
    pub value: Value,
}

impl SecureParameter {
    pub fn new(server_only: bool, value: Value) -> Self {
        Self { server_only, value }
    }
}

/// Module version triple.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct SemVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl std::fmt::Display for SemVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Descriptive metadata of a module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ModuleInfo {
    pub name: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub version: SemVersion,
    /// OS name to supported architectures.
    #[serde(default, deserialize_with = "null_as_default")]
    pub os: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub system: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub actions: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub events: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

/// Publication state of a module version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    #[default]
    Draft,
    Release,
}

/// Attachment status of an instance within its policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    #[default]
    Joined,
    Inactive,
}

/// Per-action configuration. Keys other than `priority` and `fields` are
/// free-form and live in `config`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ActionConfigItem {
    pub priority: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<String>,
    #[serde(flatten)]
    pub config: Map<String, Value>,
}

/// Kind of event a module emits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    #[default]
    Atomic,
    Aggregation,
    Correlation,
}

impl EventType {
    pub fn is_atomic(&self) -> bool {
        matches!(self, EventType::Atomic)
    }
}

/// Action triggered by an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventConfigAction {
    pub name: String,
    pub module_name: String,
    pub priority: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<String>,
}

/// Step of an aggregation or correlation sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventConfigSeq {
    pub name: String,
    pub min_count: u64,
}

/// Keys of [`EventConfigItem`] that are never part of its free-form config.
pub const EVENT_ITEM_KEYS: [&str; 7] = [
    "type",
    "fields",
    "actions",
    "seq",
    "group_by",
    "max_count",
    "max_time",
];

/// Per-event configuration.
///
/// Serialization drops `seq`, `group_by`, `max_count` and `max_time` for
/// atomic events and always writes them for the other types.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct EventConfigItem {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub actions: Vec<EventConfigAction>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub seq: Vec<EventConfigSeq>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub max_count: u64,
    #[serde(default)]
    pub max_time: u64,
    #[serde(flatten)]
    pub config: Map<String, Value>,
}

impl Serialize for EventConfigItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.event_type)?;
        map.serialize_entry("fields", &self.fields)?;
        map.serialize_entry("actions", &self.actions)?;
        if !self.event_type.is_atomic() {
            map.serialize_entry("seq", &self.seq)?;
            map.serialize_entry("group_by", &self.group_by)?;
            map.serialize_entry("max_count", &self.max_count)?;
            map.serialize_entry("max_time", &self.max_time)?;
        }
        for (key, value) in &self.config {
            if !EVENT_ITEM_KEYS.contains(&key.as_str()) {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

impl EventConfigItem {
    /// Whether any action of this event targets `module_name`.
    pub fn has_action_for(&self, module_name: &str) -> bool {
        self.actions.iter().any(|a| a.module_name == module_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FileChecksum {
    pub sha256: String,
}

/// Immutable template of one module version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleDefinition {
    #[serde(default)]
    pub id: u64,
    pub info: ModuleInfo,
    #[serde(default)]
    pub state: ModuleState,
    #[serde(default = "empty_schema")]
    pub config_schema: Value,
    #[serde(default)]
    pub default_config: ModuleConfig,
    #[serde(default = "empty_schema")]
    pub secure_config_schema: Value,
    #[serde(default)]
    pub secure_default_config: SecureConfig,
    #[serde(default = "empty_schema")]
    pub fields_schema: Value,
    #[serde(default = "empty_schema")]
    pub action_config_schema: Value,
    #[serde(default)]
    pub default_action_config: ActionConfig,
    #[serde(default = "empty_schema")]
    pub event_config_schema: Value,
    #[serde(default)]
    pub default_event_config: EventConfig,
    #[serde(default, deserialize_with = "null_as_default")]
    pub static_dependencies: Vec<DependencyItem>,
    #[serde(default)]
    pub changelog: Value,
    #[serde(default)]
    pub locale: Value,
    #[serde(default)]
    pub last_update: DateTime<Utc>,
}

impl ModuleDefinition {
    /// Empty definition for `name` at `version`; fill in configs and schemas
    /// with the `with_*` builders or by assigning fields.
    pub fn new(name: &str, version: SemVersion) -> Self {
        Self {
            id: 0,
            info: ModuleInfo {
                name: name.to_string(),
                version,
                ..ModuleInfo::default()
            },
            state: ModuleState::Release,
            config_schema: empty_schema(),
            default_config: ModuleConfig::new(),
            secure_config_schema: empty_schema(),
            secure_default_config: SecureConfig::new(),
            fields_schema: empty_schema(),
            action_config_schema: empty_schema(),
            default_action_config: ActionConfig::new(),
            event_config_schema: empty_schema(),
            default_event_config: EventConfig::new(),
            static_dependencies: Vec::new(),
            changelog: Value::Null,
            locale: Value::Null,
            last_update: DateTime::<Utc>::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Fresh instance of this definition, as attached to a policy for the
    /// first time.
    pub fn to_instance(&self) -> ModuleInstance {
        ModuleInstance {
            id: 0,
            policy_id: 0,
            status: ModuleStatus::Joined,
            join_date: DateTime::<Utc>::default(),
            info: self.info.clone(),
            state: self.state,
            config_schema: self.config_schema.clone(),
            default_config: self.default_config.clone(),
            current_config: self.default_config.clone(),
            secure_config_schema: self.secure_config_schema.clone(),
            secure_default_config: self.secure_default_config.clone(),
            secure_current_config: self.secure_default_config.clone(),
            fields_schema: self.fields_schema.clone(),
            action_config_schema: self.action_config_schema.clone(),
            default_action_config: self.default_action_config.clone(),
            current_action_config: self.default_action_config.clone(),
            event_config_schema: self.event_config_schema.clone(),
            default_event_config: self.default_event_config.clone(),
            current_event_config: self.default_event_config.clone(),
            static_dependencies: self.static_dependencies.clone(),
            dynamic_dependencies: Vec::new(),
            changelog: self.changelog.clone(),
            locale: self.locale.clone(),
            last_module_update: self.last_update,
            last_update: DateTime::<Utc>::default(),
            files_checksums: FilesChecksums::new(),
        }
    }
}

/// A module attached to a policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleInstance {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub policy_id: u64,
    #[serde(default)]
    pub status: ModuleStatus,
    #[serde(default)]
    pub join_date: DateTime<Utc>,
    pub info: ModuleInfo,
    #[serde(default)]
    pub state: ModuleState,
    #[serde(default = "empty_schema")]
    pub config_schema: Value,
    #[serde(default)]
    pub default_config: ModuleConfig,
    #[serde(default)]
    pub current_config: ModuleConfig,
    #[serde(default = "empty_schema")]
    pub secure_config_schema: Value,
    #[serde(default)]
    pub secure_default_config: SecureConfig,
    #[serde(default)]
    pub secure_current_config: SecureConfig,
    #[serde(default = "empty_schema")]
    pub fields_schema: Value,
    #[serde(default = "empty_schema")]
    pub action_config_schema: Value,
    #[serde(default)]
    pub default_action_config: ActionConfig,
    #[serde(default)]
    pub current_action_config: ActionConfig,
    #[serde(default = "empty_schema")]
    pub event_config_schema: Value,
    #[serde(default)]
    pub default_event_config: EventConfig,
    #[serde(default)]
    pub current_event_config: EventConfig,
    #[serde(default, deserialize_with = "null_as_default")]
    pub static_dependencies: Vec<DependencyItem>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dynamic_dependencies: Vec<DependencyItem>,
    #[serde(default)]
    pub changelog: Value,
    #[serde(default)]
    pub locale: Value,
    #[serde(default)]
    pub last_module_update: DateTime<Utc>,
    #[serde(default)]
    pub last_update: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files_checksums: FilesChecksums,
}

impl ModuleInstance {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Static and dynamic dependencies, static first.
    pub fn dependencies(&self) -> impl Iterator<Item = &DependencyItem> {
        self.static_dependencies
            .iter()
            .chain(self.dynamic_dependencies.iter())
    }
}
