//! Structural validation of module definitions and instances.
//!
//! These checks cover what the type system cannot: priority bounds, list
//! uniqueness, dependency completeness and version syntax. Schema
//! conformance of configs is handled by the reconciler.

use std::collections::BTreeSet;

use serde_json::Value;

use super::dependency::{DependencyItem, DependencyType};
use super::error::ValidationError;
use super::module::{ActionConfig, EventConfig, ModuleDefinition, ModuleInfo, ModuleInstance};
use crate::version;

/// Inclusive priority bounds for actions.
pub const PRIORITY_RANGE: std::ops::RangeInclusive<u64> = 1..=100;

/// Validate a module definition.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_definition(def: &ModuleDefinition) -> Result<(), ValidationError> {
    validate_info(&def.info)?;
    validate_schemas(&[
        ("config_schema", &def.config_schema),
        ("secure_config_schema", &def.secure_config_schema),
        ("fields_schema", &def.fields_schema),
        ("action_config_schema", &def.action_config_schema),
        ("event_config_schema", &def.event_config_schema),
    ])?;
    validate_action_config(&def.default_action_config)?;
    validate_event_config(&def.default_event_config)?;
    validate_dependencies(&def.static_dependencies)
}

/// Validate a module instance, including its current configuration.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_instance(inst: &ModuleInstance) -> Result<(), ValidationError> {
    validate_info(&inst.info)?;
    validate_schemas(&[
        ("config_schema", &inst.config_schema),
        ("secure_config_schema", &inst.secure_config_schema),
        ("fields_schema", &inst.fields_schema),
        ("action_config_schema", &inst.action_config_schema),
        ("event_config_schema", &inst.event_config_schema),
    ])?;
    validate_action_config(&inst.default_action_config)?;
    validate_action_config(&inst.current_action_config)?;
    validate_event_config(&inst.default_event_config)?;
    validate_event_config(&inst.current_event_config)?;
    validate_dependencies(&inst.static_dependencies)?;
    validate_dependencies(&inst.dynamic_dependencies)
}

fn validate_info(info: &ModuleInfo) -> Result<(), ValidationError> {
    if info.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    for (owner, list) in [
        ("info.actions", &info.actions),
        ("info.events", &info.events),
        ("info.fields", &info.fields),
        ("info.tags", &info.tags),
    ] {
        check_unique(owner, list)?;
    }
    Ok(())
}

fn validate_schemas(schemas: &[(&str, &Value)]) -> Result<(), ValidationError> {
    for (document, schema) in schemas {
        if !(schema.is_object() || schema.is_boolean()) {
            return Err(ValidationError::InvalidSchema {
                document: document.to_string(),
            });
        }
    }
    Ok(())
}

fn check_unique(owner: &str, list: &[String]) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for entry in list {
        if !seen.insert(entry.as_str()) {
            return Err(ValidationError::DuplicateEntry {
                owner: owner.to_string(),
                entry: entry.clone(),
            });
        }
    }
    Ok(())
}

fn check_priority(owner: String, priority: u64) -> Result<(), ValidationError> {
    if PRIORITY_RANGE.contains(&priority) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPriority { owner, priority })
    }
}

fn validate_action_config(actions: &ActionConfig) -> Result<(), ValidationError> {
    for (name, item) in actions {
        check_priority(format!("action {name}"), item.priority)?;
        check_unique(&format!("action {name} fields"), &item.fields)?;
    }
    Ok(())
}

fn validate_event_config(events: &EventConfig) -> Result<(), ValidationError> {
    for (name, item) in events {
        check_unique(&format!("event {name} fields"), &item.fields)?;
        for action in &item.actions {
            if action.name.is_empty() || action.module_name.is_empty() {
                return Err(ValidationError::InvalidEvent {
                    event: name.clone(),
                    reason: "action without name or module".to_string(),
                });
            }
            check_priority(format!("event {name} action {}", action.name), action.priority)?;
        }
        if item.seq.iter().any(|s| s.min_count == 0) {
            return Err(ValidationError::InvalidEvent {
                event: name.clone(),
                reason: "sequence step with min_count 0".to_string(),
            });
        }
        if item.seq.is_empty() != item.group_by.is_empty() && !item.event_type.is_atomic() {
            return Err(ValidationError::InvalidEvent {
                event: name.clone(),
                reason: "seq and group_by must be set together".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_dependencies(deps: &[DependencyItem]) -> Result<(), ValidationError> {
    for (index, dep) in deps.iter().enumerate() {
        if dep.dep_type != DependencyType::AgentVersion && dep.module_name.is_empty() {
            return Err(ValidationError::MissingDependencyModule {
                index,
                dep_type: dep.dep_type.to_string(),
            });
        }
        for (field, value) in [
            ("min_module_version", &dep.min_module_version),
            ("min_agent_version", &dep.min_agent_version),
        ] {
            if !value.is_empty() && version::parse(value).is_none() {
                return Err(ValidationError::InvalidVersion {
                    field: field.to_string(),
                    value: value.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::module::{ActionConfigItem, EventConfigAction, EventConfigItem, SemVersion};

    fn definition() -> ModuleDefinition {
        ModuleDefinition::new("syslog", SemVersion::new(1, 0, 0))
    }

    #[test]
    fn test_minimal_definition_is_valid() {
        assert!(validate_definition(&definition()).is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let def = ModuleDefinition::new(" ", SemVersion::default());
        assert_eq!(validate_definition(&def), Err(ValidationError::EmptyName));
    }

    #[test]
    fn test_action_priority_bounds() {
        let mut def = definition();
        def.default_action_config.insert(
            "block".to_string(),
            ActionConfigItem {
                priority: 101,
                ..ActionConfigItem::default()
            },
        );
        let err = validate_definition(&def).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPriority { priority: 101, .. }));
    }

    #[test]
    fn test_event_action_requires_module() {
        let mut def = definition();
        def.default_event_config.insert(
            "login".to_string(),
            EventConfigItem {
                actions: vec![EventConfigAction {
                    name: "block".to_string(),
                    module_name: String::new(),
                    priority: 5,
                    fields: vec![],
                }],
                ..EventConfigItem::default()
            },
        );
        assert!(matches!(
            validate_definition(&def),
            Err(ValidationError::InvalidEvent { .. })
        ));
    }

    #[test]
    fn test_dependency_checks() {
        let mut def = definition();
        def.static_dependencies
            .push(DependencyItem::on_module(DependencyType::ToSendData, "", "1.0.0"));
        assert!(matches!(
            validate_definition(&def),
            Err(ValidationError::MissingDependencyModule { index: 0, .. })
        ));

        def.static_dependencies = vec![DependencyItem::on_agent("one.two")];
        assert!(matches!(
            validate_definition(&def),
            Err(ValidationError::InvalidVersion { .. })
        ));

        def.static_dependencies = vec![DependencyItem::on_agent("1.4.0-rc2")];
        assert!(validate_definition(&def).is_ok());
    }

    #[test]
    fn test_non_object_schema_rejected() {
        let mut def = definition();
        def.event_config_schema = serde_json::json!("nope");
        assert_eq!(
            validate_definition(&def),
            Err(ValidationError::InvalidSchema {
                document: "event_config_schema".to_string()
            })
        );
    }

    #[test]
    fn test_duplicate_info_fields_rejected() {
        let mut inst = definition().to_instance();
        inst.info.fields = vec!["ip".to_string(), "ip".to_string()];
        assert!(matches!(
            validate_instance(&inst),
            Err(ValidationError::DuplicateEntry { .. })
        ));
    }
}
