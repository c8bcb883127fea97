//! Instance reconciliation against a new module definition.
//!
//! Each config kind is reconciled by an independent function returning the
//! new value and a [`MergeOutcome`]. A kind whose merge fails or does not
//! validate is replaced by the definition's default wholesale; other kinds
//! are unaffected.

use std::collections::BTreeSet;

use schema_merge::{
    property_schema, with_action_definitions, with_event_definitions, SchemaGuidedMerge,
    SchemaMerge, SchemaValidator,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::{
    validate_definition, validate_instance, ActionConfig, DependencyItem, EventConfig,
    EventConfigAction, EventConfigItem, ModplaneError, ModuleConfig, ModuleDefinition,
    ModuleInstance, Result, SecureConfig,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::secure::SecureParamCrypto;

/// Whether a config kind kept the user's values or was reset to default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    Merged,
    /// Replaced by the definition default; `reason` is the merge or
    /// validation failure that caused it.
    FellBack { reason: String },
}

impl MergeOutcome {
    pub fn fell_back(&self) -> bool {
        matches!(self, MergeOutcome::FellBack { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            MergeOutcome::Merged => None,
            MergeOutcome::FellBack { reason } => Some(reason.as_str()),
        }
    }
}

/// Per-kind outcomes of one reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub module: String,
    pub from_version: String,
    pub to_version: String,
    pub config: MergeOutcome,
    pub secure_config: MergeOutcome,
    pub action_config: MergeOutcome,
    pub event_config: MergeOutcome,
    pub dynamic_dependencies_kept: usize,
    pub dynamic_dependencies_dropped: usize,
}

impl ReconcileSummary {
    /// Names of the config kinds that fell back to default.
    pub fn fallbacks(&self) -> Vec<&'static str> {
        self.fallback_reasons()
            .into_iter()
            .map(|(kind, _)| kind)
            .collect()
    }

    /// Config kinds that fell back to default, with the failure behind each.
    pub fn fallback_reasons(&self) -> Vec<(&'static str, &str)> {
        [
            ("config", &self.config),
            ("secure_config", &self.secure_config),
            ("action_config", &self.action_config),
            ("event_config", &self.event_config),
        ]
        .into_iter()
        .filter_map(|(kind, outcome)| outcome.reason().map(|reason| (kind, reason)))
        .collect()
    }
}

/// Reconciles instances using a pluggable merge strategy.
pub struct Reconciler {
    merger: Box<dyn SchemaMerge>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(Box::new(SchemaGuidedMerge))
    }
}

impl Reconciler {
    pub fn new(merger: Box<dyn SchemaMerge>) -> Self {
        Self { merger }
    }

    /// Produce the state of `instance` upgraded to `definition`.
    ///
    /// Inputs are not modified. The returned instance holds plaintext
    /// secure parameters; the caller re-encrypts before persisting.
    ///
    /// # Errors
    ///
    /// - [`ModplaneError::IdentityMismatch`] if the module names differ.
    /// - [`ModplaneError::InvalidDefinition`] if the definition is malformed.
    /// - [`ModplaneError::DecryptFailed`] if a secure set cannot be decrypted.
    /// - [`ModplaneError::Validation`] if the reconciled instance is invalid.
    pub fn reconcile(
        &self,
        instance: &ModuleInstance,
        definition: &ModuleDefinition,
        crypto: &SecureParamCrypto<'_>,
    ) -> Result<ModuleInstance> {
        self.reconcile_with_summary(instance, definition, crypto)
            .map(|(inst, _)| inst)
    }

    /// Like [`Reconciler::reconcile`], also returning per-kind outcomes.
    pub fn reconcile_with_summary(
        &self,
        instance: &ModuleInstance,
        definition: &ModuleDefinition,
        crypto: &SecureParamCrypto<'_>,
    ) -> Result<(ModuleInstance, ReconcileSummary)> {
        if instance.name() != definition.name() {
            return Err(ModplaneError::IdentityMismatch {
                instance: instance.name().to_string(),
                definition: definition.name().to_string(),
            });
        }
        validate_definition(definition).map_err(ModplaneError::InvalidDefinition)?;

        let module = definition.name();
        let _span = obs::ReconcileSpan::enter(module, instance.policy_id);
        let from_version = instance.info.version.to_string();
        let to_version = definition.info.version.to_string();
        obs::emit_reconcile_started(module, &from_version, &to_version);
        METRICS.inc_reconciliations();

        let mut old = instance.clone();
        old.decrypt_secure_parameters(crypto)?;
        let mut def = definition.clone();
        def.decrypt_secure_parameters(crypto)?;

        let mut next = def.to_instance();
        next.id = old.id;
        next.policy_id = old.policy_id;
        next.status = old.status;
        next.join_date = old.join_date;
        next.last_update = old.last_update;
        next.files_checksums = old.files_checksums.clone();

        let merger = self.merger.as_ref();
        let (config, config_outcome) =
            merge_plain_config(&old.current_config, &def.default_config, &def.config_schema, merger);
        let (secure, secure_outcome) = merge_secure_config(
            &old.secure_current_config,
            &def.secure_default_config,
            &def.secure_config_schema,
            merger,
        );
        let (actions, action_outcome) = merge_action_config(
            &old.current_action_config,
            &def.default_action_config,
            &def.action_config_schema,
            merger,
        );
        let (events, event_outcome) = merge_event_config(
            &old.current_event_config,
            &def.default_event_config,
            &def.event_config_schema,
            merger,
        );
        let dynamic = prune_dynamic_dependencies(&old.dynamic_dependencies, &events);

        next.current_config = config;
        next.secure_current_config = secure;
        next.current_action_config = actions;
        next.current_event_config = events;
        next.dynamic_dependencies = dynamic;

        validate_instance(&next)?;

        let summary = ReconcileSummary {
            module: module.to_string(),
            from_version,
            to_version,
            config: config_outcome,
            secure_config: secure_outcome,
            action_config: action_outcome,
            event_config: event_outcome,
            dynamic_dependencies_kept: next.dynamic_dependencies.len(),
            dynamic_dependencies_dropped: old.dynamic_dependencies.len()
                - next.dynamic_dependencies.len(),
        };
        for (kind, reason) in summary.fallback_reasons() {
            METRICS.inc_config_fallbacks();
            obs::emit_config_fallback(module, kind, &reason);
        }
        let fallbacks = summary.fallbacks();
        obs::emit_reconcile_finished(module, &fallbacks, summary.dynamic_dependencies_kept);

        Ok((next, summary))
    }
}

/// Reconcile with the default schema-guided merge strategy.
pub fn reconcile(
    instance: &ModuleInstance,
    definition: &ModuleDefinition,
    crypto: &SecureParamCrypto<'_>,
) -> Result<ModuleInstance> {
    Reconciler::default().reconcile(instance, definition, crypto)
}

/// Plain config: union of current and new default keys, merged under the
/// config schema and trimmed to the default's key set.
pub fn merge_plain_config(
    current: &ModuleConfig,
    default: &ModuleConfig,
    schema: &Value,
    merger: &dyn SchemaMerge,
) -> (ModuleConfig, MergeOutcome) {
    let union = union_with_default(current.clone(), default);
    match merge_map(&Value::Object(union), &Value::Object(default.clone()), schema, merger) {
        Ok(merged) => (merged, MergeOutcome::Merged),
        Err(reason) => fallback("config", default.clone(), reason),
    }
}

/// Secure config: the plain-config procedure over decrypted parameters.
pub fn merge_secure_config(
    current: &SecureConfig,
    default: &SecureConfig,
    schema: &Value,
    merger: &dyn SchemaMerge,
) -> (SecureConfig, MergeOutcome) {
    let attempt = || -> std::result::Result<SecureConfig, String> {
        let mut union = current.clone();
        for (key, param) in default {
            union.entry(key.clone()).or_insert_with(|| param.clone());
        }
        let merged = merge_map(&to_value(&union)?, &to_value(default)?, schema, merger)?;
        decode(Value::Object(merged))
    };
    match attempt() {
        Ok(merged) => (merged, MergeOutcome::Merged),
        Err(reason) => fallback("secure_config", default.clone(), reason),
    }
}

/// Action config: priority and fields always come from the default, the
/// free-form sub-config is trimmed to the default's keys, then the whole
/// map is merged under the action schema with the built-in definitions.
pub fn merge_action_config(
    current: &ActionConfig,
    default: &ActionConfig,
    schema: &Value,
    merger: &dyn SchemaMerge,
) -> (ActionConfig, MergeOutcome) {
    let prepared: ActionConfig = default
        .iter()
        .map(|(name, def_item)| {
            let item = match current.get(name) {
                Some(cur_item) => {
                    let mut item = cur_item.clone();
                    item.priority = def_item.priority;
                    item.fields = def_item.fields.clone();
                    item.config = clear_map_keys(&cur_item.config, &def_item.config);
                    item
                }
                None => def_item.clone(),
            };
            (name.clone(), item)
        })
        .collect();

    let schema = with_action_definitions(schema);
    let attempt = || -> std::result::Result<ActionConfig, String> {
        let merged = merge_map(&to_value(&prepared)?, &to_value(default)?, &schema, merger)?;
        decode(Value::Object(merged))
    };
    match attempt() {
        Ok(merged) => (merged, MergeOutcome::Merged),
        Err(reason) => fallback("action_config", default.clone(), reason),
    }
}

/// Event config: fields come from the default, actions needing fields the
/// event no longer carries are dropped, the sub-config is trimmed, and each
/// event with its own property schema is merged item by item. The complete
/// map must validate under the event schema with the built-in definitions.
pub fn merge_event_config(
    current: &EventConfig,
    default: &EventConfig,
    schema: &Value,
    merger: &dyn SchemaMerge,
) -> (EventConfig, MergeOutcome) {
    let schema = with_event_definitions(schema);
    let merged: EventConfig = default
        .iter()
        .map(|(name, def_item)| {
            let item = match current.get(name) {
                Some(cur_item) => {
                    let mut item = cur_item.clone();
                    item.fields = def_item.fields.clone();
                    item.actions = filter_actions_by_fields(&cur_item.actions, &item.fields);
                    item.config = clear_map_keys(&cur_item.config, &def_item.config);
                    match property_schema(&schema, name) {
                        Some(item_schema) => merge_event_item(&item, def_item, &item_schema, merger),
                        None => item,
                    }
                }
                None => def_item.clone(),
            };
            (name.clone(), item)
        })
        .collect();

    let checked = to_value(&merged).and_then(|value| validate(&schema, &value));
    match checked {
        Ok(()) => (merged, MergeOutcome::Merged),
        Err(reason) => fallback("event_config", default.clone(), reason),
    }
}

/// Keep a dynamic dependency only while some event action still targets
/// its module.
pub fn prune_dynamic_dependencies(deps: &[DependencyItem], events: &EventConfig) -> Vec<DependencyItem> {
    deps.iter()
        .filter(|dep| events.values().any(|ev| ev.has_action_for(&dep.module_name)))
        .cloned()
        .collect()
}

fn merge_event_item(
    current: &EventConfigItem,
    default: &EventConfigItem,
    schema: &Value,
    merger: &dyn SchemaMerge,
) -> EventConfigItem {
    let attempt = || -> std::result::Result<EventConfigItem, String> {
        let merged = merger
            .merge(&to_value(current)?, &to_value(default)?, schema)
            .map_err(|e| e.to_string())?;
        decode(merged)
    };
    attempt().unwrap_or_else(|reason| {
        debug!(reason = %reason, "event item replaced by default");
        default.clone()
    })
}

fn filter_actions_by_fields(actions: &[EventConfigAction], fields: &[String]) -> Vec<EventConfigAction> {
    let available: BTreeSet<&str> = fields.iter().map(String::as_str).collect();
    actions
        .iter()
        .filter(|a| a.fields.iter().all(|f| available.contains(f.as_str())))
        .cloned()
        .collect()
}

/// Keys of `default`, each with the current value where one exists.
fn clear_map_keys(current: &Map<String, Value>, default: &Map<String, Value>) -> Map<String, Value> {
    default
        .iter()
        .map(|(key, def_val)| {
            let value = current.get(key).unwrap_or(def_val).clone();
            (key.clone(), value)
        })
        .collect()
}

fn union_with_default(mut current: ModuleConfig, default: &ModuleConfig) -> ModuleConfig {
    for (key, value) in default {
        current.entry(key.clone()).or_insert_with(|| value.clone());
    }
    current
}

/// Merge an object-shaped document, align it to the default's key set and
/// check the result against the schema.
fn merge_map(
    current: &Value,
    default: &Value,
    schema: &Value,
    merger: &dyn SchemaMerge,
) -> std::result::Result<Map<String, Value>, String> {
    let merged = merger
        .merge(current, default, schema)
        .map_err(|e| e.to_string())?;
    let (Value::Object(merged), Value::Object(default)) = (merged, default) else {
        return Err("merged document is not an object".to_string());
    };
    let aligned = clear_map_keys(&merged, default);
    validate(schema, &Value::Object(aligned.clone()))?;
    Ok(aligned)
}

fn validate(schema: &Value, value: &Value) -> std::result::Result<(), String> {
    let validator = SchemaValidator::new(schema).map_err(|e| e.to_string())?;
    validator.validate(value).map_err(|e| e.to_string())
}

fn to_value<T: Serialize>(value: &T) -> std::result::Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

fn decode<T: DeserializeOwned>(value: Value) -> std::result::Result<T, String> {
    serde_json::from_value(value).map_err(|e| e.to_string())
}

fn fallback<T>(kind: &str, default: T, reason: String) -> (T, MergeOutcome) {
    debug!(kind = %kind, reason = %reason, "config kind reset to default");
    (default, MergeOutcome::FellBack { reason })
}
