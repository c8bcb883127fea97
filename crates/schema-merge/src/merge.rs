//! Schema-guided merge of a customised document onto a new default.
//!
//! The merge keeps as much of `current` as still validates against the
//! schema and repairs the rest from `default`. Every decision is local to
//! the sub-schema of the value being visited; a value that cannot be
//! repaired is replaced by its default counterpart.

use serde_json::{Map, Value};
use tracing::debug;

use crate::definitions::attach_definitions;
use crate::validator::{self, SchemaValidator};
use crate::Result;

/// Pluggable merge strategy.
pub trait SchemaMerge: Send + Sync {
    /// Merge `current` onto `default` so that the result validates against
    /// `schema`.
    fn merge(&self, current: &Value, default: &Value, schema: &Value) -> Result<Value>;
}

/// Nesting bound for schema traversal; recursive schemas stop here and
/// fall back to the default value.
const MAX_DEPTH: usize = 32;

/// Default strategy driven by the schema's structure.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaGuidedMerge;

impl SchemaGuidedMerge {
    pub fn new() -> Self {
        SchemaGuidedMerge
    }
}

impl SchemaMerge for SchemaGuidedMerge {
    fn merge(&self, current: &Value, default: &Value, schema: &Value) -> Result<Value> {
        let validator = SchemaValidator::new(schema)?;
        if validator.is_valid(current) {
            return Ok(current.clone());
        }
        let walker = Walker { root: schema };
        let merged = walker.merge(current, default, schema, false, 0);
        validator.validate(&merged)?;
        debug!("document repaired against schema");
        Ok(merged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Composition {
    AllOf,
    AnyOf,
    OneOf,
    Single,
}

fn usize_keyword(schema: &Value, name: &str) -> Option<usize> {
    schema
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| *n > 0)
}

struct Walker<'a> {
    root: &'a Value,
}

impl Walker<'_> {
    fn is_valid(&self, value: &Value, schema: &Value) -> bool {
        validator::is_valid(&attach_definitions(schema, self.root), value)
    }

    /// Follow local `#/...` references until a concrete schema is reached.
    fn resolve(&self, schema: &Value) -> Value {
        let mut current = schema.clone();
        for _ in 0..MAX_DEPTH {
            let Some(target) = current
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| r.strip_prefix('#'))
                .and_then(|pointer| self.root.pointer(pointer))
            else {
                break;
            };
            current = target.clone();
        }
        current
    }

    fn branches(&self, schema: &Value) -> (Vec<Value>, Composition) {
        let schema = self.resolve(schema);
        for (keyword, composition) in [
            ("allOf", Composition::AllOf),
            ("anyOf", Composition::AnyOf),
            ("oneOf", Composition::OneOf),
        ] {
            if let Some(list) = schema.get(keyword).and_then(Value::as_array) {
                if !list.is_empty() {
                    let branches = list
                        .iter()
                        .filter(|b| !b.is_null())
                        .map(|b| self.resolve(b))
                        .collect();
                    return (branches, composition);
                }
            }
        }
        (vec![schema], Composition::Single)
    }

    fn merge(&self, current: &Value, default: &Value, schema: &Value, force: bool, depth: usize) -> Value {
        if self.is_valid(current, schema) {
            return current.clone();
        }
        if force || depth >= MAX_DEPTH {
            return default.clone();
        }
        match (current, default) {
            (Value::Array(cur), Value::Array(def)) => self.merge_array(cur, def, default, schema, depth + 1),
            (Value::Object(cur), Value::Object(def)) => self.merge_object(cur, def, default, schema, depth + 1),
            // Kind mismatch, or a scalar that already failed validation.
            _ => default.clone(),
        }
    }

    fn merge_object(
        &self,
        current: &Map<String, Value>,
        defaults: &Map<String, Value>,
        default: &Value,
        schema: &Value,
        depth: usize,
    ) -> Value {
        let (branches, composition) = self.branches(schema);
        let single = branches.len() == 1;
        let mut result = Value::Object(current.clone());

        for branch in &branches {
            let Value::Object(cur) = &result else {
                return default.clone();
            };
            let props = branch.get("properties").and_then(Value::as_object);
            let prop_schema = |key: &str| props.and_then(|p| p.get(key));
            let required: Vec<&str> = branch
                .get("required")
                .and_then(Value::as_array)
                .map(|r| r.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            let additional = branch.get("additionalProperties") != Some(&Value::Bool(false));
            let max_props = usize_keyword(branch, "maxProperties");
            let min_props = usize_keyword(branch, "minProperties");

            let mut merged = Map::new();

            // Required keys the default provides.
            for (key, def_val) in defaults {
                if !required.contains(&key.as_str()) {
                    continue;
                }
                let value = match (cur.get(key), prop_schema(key)) {
                    (None, _) => def_val.clone(),
                    (Some(cur_val), Some(ps)) => {
                        if self.is_valid(cur_val, ps) {
                            cur_val.clone()
                        } else {
                            self.merge(cur_val, def_val, ps, false, depth)
                        }
                    }
                    (Some(cur_val), None) => cur_val.clone(),
                };
                merged.insert(key.clone(), value);
            }

            // Remaining current keys, pruned by the schema.
            for (key, cur_val) in cur {
                if max_props.is_some_and(|max| merged.len() >= max) {
                    break;
                }
                if merged.contains_key(key) {
                    continue;
                }
                match prop_schema(key) {
                    Some(ps) => {
                        if self.is_valid(cur_val, ps) {
                            merged.insert(key.clone(), cur_val.clone());
                        } else if let Some(def_val) = defaults.get(key) {
                            if self.is_valid(def_val, ps) {
                                merged.insert(key.clone(), self.merge(cur_val, def_val, ps, false, depth));
                            }
                        }
                    }
                    None if additional => {
                        merged.insert(key.clone(), cur_val.clone());
                    }
                    None => {}
                }
            }

            // Top up from default until minProperties holds.
            if let Some(min) = min_props {
                for (key, def_val) in defaults {
                    if merged.len() >= min {
                        break;
                    }
                    merged
                        .entry(key.clone())
                        .or_insert_with(|| def_val.clone());
                }
            }

            result = self.merge(&Value::Object(merged), default, branch, single, depth);
            if composition != Composition::AllOf {
                break;
            }
        }
        result
    }

    fn merge_array(
        &self,
        current: &[Value],
        defaults: &[Value],
        default: &Value,
        schema: &Value,
        depth: usize,
    ) -> Value {
        // An emptied array was cleared on purpose or never set.
        if current.is_empty() {
            return default.clone();
        }

        let (branches, composition) = self.branches(schema);
        let single = branches.len() == 1;
        let mut result = Value::Array(current.to_vec());

        for branch in &branches {
            let items_schema = branch.get("items").filter(|i| i.is_object() || i.is_boolean());
            result = match (items_schema, &result) {
                (Some(items), Value::Array(cur)) => {
                    let kept = self.merge_items(cur, defaults, items, branch, depth);
                    if kept.is_empty() && !defaults.is_empty() {
                        default.clone()
                    } else {
                        self.merge(&Value::Array(kept), default, branch, single, depth)
                    }
                }
                _ => self.merge(&result, default, branch, single, depth),
            };
            if composition != Composition::AllOf {
                break;
            }
        }
        result
    }

    fn merge_items(
        &self,
        current: &[Value],
        defaults: &[Value],
        items: &Value,
        branch: &Value,
        depth: usize,
    ) -> Vec<Value> {
        let max_items = usize_keyword(branch, "maxItems");
        let min_items = usize_keyword(branch, "minItems");
        let mut kept = Vec::new();

        for (i, item) in current.iter().enumerate() {
            if max_items.is_some_and(|max| kept.len() >= max) {
                break;
            }
            if self.is_valid(item, items) {
                kept.push(item.clone());
            } else if let Some(def_item) = defaults.get(i) {
                let repaired = self.merge(item, def_item, items, false, depth);
                if self.is_valid(&repaired, items) {
                    kept.push(repaired);
                }
            }
        }

        if let Some(min) = min_items {
            for def_item in defaults.iter().rev() {
                if kept.len() >= min {
                    break;
                }
                if self.is_valid(def_item, items) {
                    kept.push(def_item.clone());
                }
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn merge(current: Value, default: Value, schema: Value) -> Value {
        SchemaGuidedMerge.merge(&current, &default, &schema).unwrap()
    }

    #[test]
    fn test_valid_current_is_kept_verbatim() {
        let schema = json!({"type": "object", "properties": {"a": {"type": "integer"}}});
        assert_eq!(merge(json!({"a": 7}), json!({"a": 1}), schema), json!({"a": 7}));
    }

    #[test]
    fn test_invalid_scalar_property_falls_back_to_default() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "integer"}, "b": {"type": "string"}},
            "required": ["a", "b"]
        });
        let out = merge(json!({"a": "bad", "b": "keep"}), json!({"a": 1, "b": "x"}), schema);
        assert_eq!(out, json!({"a": 1, "b": "keep"}));
    }

    #[test]
    fn test_removed_keys_are_pruned_when_additional_forbidden() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "integer"}},
            "additionalProperties": false,
            "required": ["a"]
        });
        let out = merge(json!({"a": 5, "gone": true}), json!({"a": 1}), schema);
        assert_eq!(out, json!({"a": 5}));
    }

    #[test]
    fn test_missing_required_key_comes_from_default() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "integer"}, "new": {"type": "boolean"}},
            "required": ["a", "new"]
        });
        let out = merge(json!({"a": 5}), json!({"a": 1, "new": false}), schema);
        assert_eq!(out, json!({"a": 5, "new": false}));
    }

    #[test]
    fn test_nested_objects_are_repaired_in_place() {
        let schema = json!({
            "type": "object",
            "properties": {
                "inner": {
                    "type": "object",
                    "properties": {"x": {"type": "integer"}, "y": {"type": "integer"}},
                    "required": ["x", "y"]
                }
            },
            "required": ["inner"]
        });
        let out = merge(
            json!({"inner": {"x": 9, "y": "oops"}}),
            json!({"inner": {"x": 0, "y": 0}}),
            schema,
        );
        assert_eq!(out, json!({"inner": {"x": 9, "y": 0}}));
    }

    #[test]
    fn test_kind_mismatch_takes_default() {
        let schema = json!({"type": "object", "properties": {"a": {"type": "array"}}, "required": ["a"]});
        let out = merge(json!({"a": {"not": "array"}}), json!({"a": [1]}), schema);
        assert_eq!(out, json!({"a": [1]}));
    }

    #[test]
    fn test_array_items_filtered_and_bounded() {
        let schema = json!({
            "type": "object",
            "properties": {
                "ports": {"type": "array", "items": {"type": "integer"}, "maxItems": 2}
            },
            "required": ["ports"]
        });
        let out = merge(
            json!({"ports": [80, "x", 443, 8080]}),
            json!({"ports": [22]}),
            schema,
        );
        assert_eq!(out, json!({"ports": [80, 443]}));
    }

    #[test]
    fn test_array_topped_up_to_min_items() {
        let schema = json!({
            "type": "array",
            "items": {"type": "string", "minLength": 2},
            "minItems": 2
        });
        let out = merge(json!(["ok", "x"]), json!(["aa", "bb"]), schema);
        assert_eq!(out, json!(["ok", "bb"]));
    }

    #[test]
    fn test_empty_array_takes_default() {
        let schema = json!({"type": "array", "items": {"type": "integer"}, "minItems": 1});
        assert_eq!(merge(json!([]), json!([3]), schema), json!([3]));
    }

    #[test]
    fn test_refs_and_all_of_are_followed() {
        let schema = json!({
            "definitions": {
                "base": {
                    "type": "object",
                    "properties": {"level": {"type": "integer", "maximum": 10}},
                    "required": ["level"]
                }
            },
            "type": "object",
            "properties": {
                "item": {
                    "allOf": [
                        {"$ref": "#/definitions/base"},
                        {"properties": {"name": {"type": "string"}}, "required": ["name"]}
                    ]
                }
            },
            "required": ["item"]
        });
        let out = merge(
            json!({"item": {"level": 99, "name": "keep", "extra": 1}}),
            json!({"item": {"level": 1, "name": "default"}}),
            schema,
        );
        assert_eq!(out["item"]["level"], json!(1));
        assert_eq!(out["item"]["name"], json!("keep"));
    }

    #[test]
    fn test_invalid_default_is_unresolvable() {
        let schema = json!({"type": "object", "properties": {"a": {"type": "integer"}}, "required": ["a"]});
        let err = SchemaGuidedMerge
            .merge(&json!({"a": "x"}), &json!({"a": "y"}), &schema)
            .unwrap_err();
        assert!(matches!(err, crate::SchemaMergeError::Unresolvable { .. }));
    }

    #[test]
    fn test_invalid_schema_is_an_error() {
        let err = SchemaGuidedMerge
            .merge(&json!({}), &json!({}), &json!({"type": 5}))
            .unwrap_err();
        assert!(matches!(err, crate::SchemaMergeError::InvalidSchema(_)));
    }
}
