//! Inter-module dependency declarations.

use serde::{Deserialize, Serialize};

/// Module name that refers to the declaring module itself.
pub const SELF_MODULE: &str = "this";

/// What a dependency is needed for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    ToReceiveData,
    ToSendData,
    ToMakeAction,
    AgentVersion,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::ToReceiveData => "to_receive_data",
            DependencyType::ToSendData => "to_send_data",
            DependencyType::ToMakeAction => "to_make_action",
            DependencyType::AgentVersion => "agent_version",
        }
    }
}

impl std::fmt::Display for DependencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single dependency of a module on another module or on the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyItem {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub module_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub min_module_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub min_agent_version: String,
    #[serde(rename = "type")]
    pub dep_type: DependencyType,
}

impl DependencyItem {
    /// Dependency on another module at or above `min_version`.
    pub fn on_module(dep_type: DependencyType, module_name: &str, min_version: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            min_module_version: min_version.to_string(),
            min_agent_version: String::new(),
            dep_type,
        }
    }

    /// Dependency on the agent running at or above `min_version`.
    pub fn on_agent(min_version: &str) -> Self {
        Self {
            module_name: String::new(),
            min_module_version: String::new(),
            min_agent_version: min_version.to_string(),
            dep_type: DependencyType::AgentVersion,
        }
    }

    pub fn is_self_reference(&self) -> bool {
        self.module_name == SELF_MODULE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_omits_empty_fields() {
        let dep = DependencyItem::on_agent("1.4.0");
        let json = serde_json::to_value(&dep).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"min_agent_version": "1.4.0", "type": "agent_version"})
        );
    }

    #[test]
    fn test_module_dependency_roundtrip() {
        let raw = r#"{"module_name":"fw","min_module_version":"1.2.0","type":"to_make_action"}"#;
        let dep: DependencyItem = serde_json::from_str(raw).unwrap();
        assert_eq!(dep.dep_type, DependencyType::ToMakeAction);
        assert_eq!(dep.module_name, "fw");
        assert!(dep.min_agent_version.is_empty());
        assert_eq!(serde_json::to_string(&dep).unwrap(), raw);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let raw = r#"{"module_name":"fw","type":"to_watch"}"#;
        assert!(serde_json::from_str::<DependencyItem>(raw).is_err());
    }
}
