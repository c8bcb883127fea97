//! Built-in schema definitions shared by every module.
//!
//! Action and event config schemas written by module authors reference
//! these through `#/definitions/<name>`; they are injected before a schema
//! is compiled so authors never have to repeat them.

use serde_json::{json, Map, Value};

/// Event types known to the platform.
pub const EVENT_TYPES: [&str; 3] = ["atomic", "aggregation", "correlation"];

/// Definition names injected by [`with_action_definitions`].
pub fn action_definitions() -> Map<String, Value> {
    let mut defs = Map::new();
    defs.insert(
        "base.action".to_string(),
        json!({
            "type": "object",
            "properties": {
                "priority": {"type": "integer", "minimum": 1, "maximum": 100},
                "fields": {"type": "array", "items": {"type": "string"}, "uniqueItems": true}
            },
            "additionalProperties": true,
            "required": ["priority", "fields"]
        }),
    );
    defs
}

/// Definition names injected by [`with_event_definitions`].
pub fn event_definitions() -> Map<String, Value> {
    let mut defs = Map::new();
    defs.insert(
        "fields".to_string(),
        json!({"type": "array", "items": {"type": "string"}, "uniqueItems": true}),
    );
    defs.insert(
        "actions".to_string(),
        json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "module_name": {"type": "string"},
                    "priority": {"type": "integer", "minimum": 1, "maximum": 100},
                    "fields": {"$ref": "#/definitions/fields"}
                },
                "additionalProperties": false,
                "required": ["name", "module_name", "priority", "fields"]
            }
        }),
    );
    for event_type in EVENT_TYPES {
        defs.insert(
            format!("types.{event_type}"),
            json!({"type": "string", "default": event_type, "enum": [event_type]}),
        );
    }
    defs.insert(
        "events.atomic".to_string(),
        json!({
            "type": "object",
            "properties": {
                "type": {"$ref": "#/definitions/types.atomic"},
                "actions": {"$ref": "#/definitions/actions"},
                "fields": {"$ref": "#/definitions/fields"}
            },
            "required": ["type", "actions", "fields"]
        }),
    );
    defs.insert(
        "events.complex".to_string(),
        json!({
            "type": "object",
            "properties": {
                "type": {"type": "string"},
                "actions": {"$ref": "#/definitions/actions"},
                "fields": {"$ref": "#/definitions/fields"},
                "seq": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "min_count": {"type": "integer", "minimum": 1}
                        },
                        "required": ["name", "min_count"]
                    }
                },
                "group_by": {
                    "type": "array",
                    "minItems": 1,
                    "uniqueItems": true,
                    "items": {"type": "string"}
                },
                "max_count": {"type": "integer", "minimum": 0},
                "max_time": {"type": "integer", "minimum": 0}
            },
            "required": ["type", "actions", "fields", "seq", "group_by", "max_count", "max_time"]
        }),
    );
    defs.insert("events.aggregation".to_string(), complex_event("aggregation", 1));
    defs.insert("events.correlation".to_string(), complex_event("correlation", 20));
    defs
}

fn complex_event(event_type: &str, max_seq: u64) -> Value {
    json!({
        "allOf": [
            {"$ref": "#/definitions/events.complex"},
            {
                "type": "object",
                "properties": {
                    "type": {"$ref": format!("#/definitions/types.{event_type}")},
                    "seq": {"type": "array", "maxItems": max_seq}
                },
                "required": ["type", "seq"]
            }
        ]
    })
}

/// Copy of `schema` with the built-in action definitions merged into its
/// `definitions` block. Built-ins replace author definitions of the same name.
pub fn with_action_definitions(schema: &Value) -> Value {
    inject(schema, action_definitions())
}

/// Copy of `schema` with the built-in event definitions merged into its
/// `definitions` block. Built-ins replace author definitions of the same name.
pub fn with_event_definitions(schema: &Value) -> Value {
    inject(schema, event_definitions())
}

fn inject(schema: &Value, builtins: Map<String, Value>) -> Value {
    let mut out = match schema {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    let defs = out
        .entry("definitions")
        .or_insert_with(|| Value::Object(Map::new()));
    if !defs.is_object() {
        *defs = Value::Object(Map::new());
    }
    if let Value::Object(defs) = defs {
        defs.extend(builtins);
    }
    Value::Object(out)
}

/// Attach the root document's `definitions` to a nested schema so it can be
/// compiled on its own.
pub fn attach_definitions(schema: &Value, root: &Value) -> Value {
    let (Value::Object(map), Some(defs)) = (schema, root.get("definitions")) else {
        return schema.clone();
    };
    let mut out = map.clone();
    out.entry("definitions").or_insert_with(|| defs.clone());
    Value::Object(out)
}

/// Standalone sub-schema for `properties.<name>`, if the schema declares one.
pub fn property_schema(schema: &Value, name: &str) -> Option<Value> {
    let prop = schema.get("properties")?.get(name)?;
    Some(attach_definitions(prop, schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::is_valid;

    fn event_schema() -> Value {
        with_event_definitions(&json!({
            "type": "object",
            "properties": {
                "login_failed": {"$ref": "#/definitions/events.atomic"},
                "brute_force": {"$ref": "#/definitions/events.aggregation"}
            }
        }))
    }

    #[test]
    fn test_action_definitions_are_injected() {
        let schema = with_action_definitions(&json!({
            "type": "object",
            "properties": {"block_ip": {"$ref": "#/definitions/base.action"}}
        }));
        assert!(is_valid(&schema, &json!({"block_ip": {"priority": 10, "fields": ["ip"], "ttl": 60}})));
        assert!(!is_valid(&schema, &json!({"block_ip": {"priority": 0, "fields": []}})));
        assert!(!is_valid(&schema, &json!({"block_ip": {"fields": []}})));
    }

    #[test]
    fn test_builtin_replaces_author_definition() {
        let schema = with_action_definitions(&json!({
            "definitions": {"base.action": {"type": "string"}, "custom": {"type": "integer"}}
        }));
        let defs = schema.get("definitions").unwrap();
        assert_eq!(defs["base.action"]["type"], "object");
        assert_eq!(defs["custom"]["type"], "integer");
    }

    #[test]
    fn test_atomic_event_shape() {
        let schema = event_schema();
        let ok = json!({"login_failed": {"type": "atomic", "fields": [], "actions": []}});
        let wrong_type = json!({"login_failed": {"type": "correlation", "fields": [], "actions": []}});
        assert!(is_valid(&schema, &ok));
        assert!(!is_valid(&schema, &wrong_type));
    }

    #[test]
    fn test_aggregation_event_limits_seq() {
        let schema = event_schema();
        let base = json!({
            "type": "aggregation",
            "fields": [],
            "actions": [],
            "seq": [{"name": "login_failed", "min_count": 5}],
            "group_by": ["ip"],
            "max_count": 0,
            "max_time": 60
        });
        assert!(is_valid(&schema, &json!({"brute_force": base.clone()})));

        let mut two = base;
        two["seq"] = json!([
            {"name": "login_failed", "min_count": 5},
            {"name": "login_ok", "min_count": 1}
        ]);
        assert!(!is_valid(&schema, &json!({"brute_force": two})));
    }

    #[test]
    fn test_event_actions_reject_unknown_keys() {
        let schema = event_schema();
        let doc = json!({"login_failed": {
            "type": "atomic",
            "fields": ["ip"],
            "actions": [{"name": "block", "module_name": "fw", "priority": 5, "fields": ["ip"], "extra": 1}]
        }});
        assert!(!is_valid(&schema, &doc));
    }

    #[test]
    fn test_property_schema_carries_definitions() {
        let schema = event_schema();
        let sub = property_schema(&schema, "login_failed").unwrap();
        assert!(sub.get("definitions").is_some());
        assert!(is_valid(&sub, &json!({"type": "atomic", "fields": [], "actions": []})));
        assert!(property_schema(&schema, "missing").is_none());
    }
}
