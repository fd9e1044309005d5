//! # Request Data Preparation
//!
//! Mutates incoming data before the schema check: scalar coercion,
//! default insertion and removal of undeclared properties. The schema check
//! itself is left to the `jsonschema` engine, which never mutates.

use crate::config::{CoercionMode, RemoveAdditional, SourceOptions};
use serde_json::{Map, Number, Value};

/// Guards `$ref` chains that point at each other without consuming data.
const MAX_REF_HOPS: usize = 32;

/// Applies the source policy to `value` following `schema`.
///
/// `definitions` holds the shared fragments addressed by local
/// `#/definitions/<id>` references.
pub(crate) fn prepare(
    value: &mut Value,
    schema: &Value,
    definitions: &Map<String, Value>,
    options: &SourceOptions,
) {
    let Some(schema) = resolve(schema, definitions) else {
        return;
    };
    let Some(map) = schema.as_object() else {
        return;
    };

    if let Some(all_of) = map.get("allOf").and_then(Value::as_array) {
        for sub in all_of {
            prepare(value, sub, definitions, options);
        }
    }
    for key in ["anyOf", "oneOf"] {
        if let Some(branches) = map.get(key).and_then(Value::as_array) {
            if let Some(branch) = first_matching_branch(value, branches, definitions) {
                prepare(value, branch, definitions, options);
            }
        }
    }

    if options.coerce_types != CoercionMode::None {
        if let Some(types) = declared_types(map) {
            coerce(value, &types, options.coerce_types);
        }
    }

    match value {
        Value::Object(object) => prepare_object(object, map, definitions, options),
        Value::Array(items) => {
            if let Some(item_schema) = map.get("items").filter(|s| !s.is_array()) {
                for item in items.iter_mut() {
                    prepare(item, item_schema, definitions, options);
                }
            }
        }
        _ => {}
    }
}

fn prepare_object(
    object: &mut Map<String, Value>,
    schema: &Map<String, Value>,
    definitions: &Map<String, Value>,
    options: &SourceOptions,
) {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return;
    };

    if options.use_defaults {
        for (name, prop) in properties {
            if object.contains_key(name) {
                continue;
            }
            if let Some(default) = resolve(prop, definitions).and_then(|p| p.get("default")) {
                object.insert(name.clone(), default.clone());
            }
        }
    }

    let strip = match options.remove_additional {
        RemoveAdditional::None => false,
        RemoveAdditional::Declared => schema.get("additionalProperties") == Some(&Value::Bool(false)),
        RemoveAdditional::All => true,
    };
    if strip {
        object.retain(|name, _| properties.contains_key(name));
    }

    for (name, prop) in properties {
        if let Some(child) = object.get_mut(name) {
            prepare(child, prop, definitions, options);
        }
    }
}

/// Follows local references until a concrete schema is reached.
pub(crate) fn resolve<'a>(schema: &'a Value, definitions: &'a Map<String, Value>) -> Option<&'a Value> {
    let mut current = schema;
    for _ in 0..MAX_REF_HOPS {
        match current.get("$ref").and_then(Value::as_str) {
            Some(reference) => {
                let key = reference.strip_prefix("#/definitions/").unwrap_or(reference);
                current = definitions.get(key)?;
            }
            None => return Some(current),
        }
    }
    None
}

fn first_matching_branch<'a>(
    value: &Value,
    branches: &'a [Value],
    definitions: &Map<String, Value>,
) -> Option<&'a Value> {
    let actual = json_type_of(value);
    branches.iter().find(|branch| {
        resolve(branch, definitions)
            .and_then(|b| b.as_object())
            .and_then(declared_types)
            .is_some_and(|types| types.iter().any(|t| type_matches(t, actual, value)))
    })
}

fn declared_types(schema: &Map<String, Value>) -> Option<Vec<String>> {
    match schema.get("type")? {
        Value::String(t) => Some(vec![t.clone()]),
        Value::Array(ts) => Some(ts.iter().filter_map(Value::as_str).map(String::from).collect()),
        _ => None,
    }
}

fn json_type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_matches(declared: &str, actual: &str, value: &Value) -> bool {
    match declared {
        "integer" => value.as_f64().is_some_and(|n| n.fract() == 0.0),
        other => other == actual,
    }
}

fn coerce(value: &mut Value, types: &[String], mode: CoercionMode) {
    let actual = json_type_of(value);
    if types.iter().any(|t| type_matches(t, actual, value)) {
        return;
    }

    if mode == CoercionMode::Array {
        if types.iter().any(|t| t == "array") {
            let single = value.take();
            *value = Value::Array(vec![single]);
            return;
        }
        if let Value::Array(items) = value {
            if items.len() == 1 {
                let single = items.remove(0);
                *value = single;
            }
        }
    }

    for target in types {
        if let Some(coerced) = coerce_scalar(value, target) {
            *value = coerced;
            return;
        }
    }
}

fn coerce_scalar(value: &Value, target: &str) -> Option<Value> {
    match (target, value) {
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("string", Value::Bool(b)) => Some(Value::String(b.to_string())),
        ("string", Value::Null) => Some(Value::String(String::new())),

        ("number", Value::String(s)) => {
            let n: f64 = s.trim().parse().ok().filter(|_| !s.trim().is_empty())?;
            number_value(n)
        }
        ("integer", Value::String(s)) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Some(Value::Number(i.into()));
            }
            let n: f64 = trimmed.parse().ok()?;
            if n.fract() == 0.0 {
                number_value(n)
            } else {
                None
            }
        }
        ("number" | "integer", Value::Bool(b)) => Some(Value::Number(i64::from(*b).into())),
        ("number" | "integer", Value::Null) => Some(Value::Number(0.into())),

        ("boolean", Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(Value::Bool(true)),
            Some(f) if f == 0.0 => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Null) => Some(Value::Bool(false)),

        ("null", Value::String(s)) if s.is_empty() => Some(Value::Null),
        ("null", Value::Bool(false)) => Some(Value::Null),
        ("null", Value::Number(n)) if n.as_f64() == Some(0.0) => Some(Value::Null),
        _ => None,
    }
}

fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Some(Value::Number((n as i64).into()));
    }
    Number::from_f64(n).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn text() -> SourceOptions {
        SourceOptions::text()
    }

    #[test]
    fn test_query_scalars_are_coerced() {
        let schema = json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer" },
                "ratio": { "type": "number" },
                "active": { "type": "boolean" },
                "name": { "type": "string" }
            }
        });
        let mut value = json!({ "limit": "10", "ratio": "0.5", "active": "true", "name": 7 });
        prepare(&mut value, &schema, &Map::new(), &text());
        assert_eq!(value, json!({ "limit": 10, "ratio": 0.5, "active": true, "name": "7" }));
    }

    #[test]
    fn test_unparseable_text_is_left_alone() {
        let schema = json!({ "type": "object", "properties": { "limit": { "type": "integer" } } });
        let mut value = json!({ "limit": "ten" });
        prepare(&mut value, &schema, &Map::new(), &text());
        assert_eq!(value, json!({ "limit": "ten" }));
    }

    #[test]
    fn test_array_wrapping() {
        let schema = json!({
            "type": "object",
            "properties": {
                "ids": { "type": "array", "items": { "type": "integer" } },
                "one": { "type": "integer" }
            }
        });
        let mut value = json!({ "ids": "3", "one": ["4"] });
        prepare(&mut value, &schema, &Map::new(), &text());
        assert_eq!(value, json!({ "ids": [3], "one": 4 }));
    }

    #[test]
    fn test_body_is_not_coerced() {
        let schema = json!({ "type": "object", "properties": { "age": { "type": "integer" } } });
        let mut value = json!({ "age": "42" });
        prepare(&mut value, &schema, &Map::new(), &SourceOptions::default());
        assert_eq!(value, json!({ "age": "42" }));
    }

    #[test]
    fn test_defaults_and_removal_follow_refs() {
        let mut definitions = Map::new();
        definitions.insert(
            "Phone".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "number": { "type": "string" },
                    "kind": { "type": "string", "default": "mobile" }
                }
            }),
        );
        let schema = json!({
            "type": "object",
            "properties": {
                "phones": { "type": "array", "items": { "$ref": "#/definitions/Phone" } }
            }
        });
        let mut value = json!({
            "phones": [{ "number": "555", "extra": 1 }],
            "unknown": true
        });
        prepare(&mut value, &schema, &definitions, &SourceOptions::default());
        assert_eq!(
            value,
            json!({ "phones": [{ "number": "555", "kind": "mobile" }] })
        );
    }

    #[test]
    fn test_declared_removal_only_where_closed() {
        let schema = json!({
            "type": "object",
            "properties": {
                "open": { "type": "object", "properties": { "a": { "type": "string" } } },
                "closed": {
                    "type": "object",
                    "properties": { "a": { "type": "string" } },
                    "additionalProperties": false
                }
            }
        });
        let options = SourceOptions {
            remove_additional: RemoveAdditional::Declared,
            ..SourceOptions::default()
        };
        let mut value = json!({ "open": { "a": "x", "b": 1 }, "closed": { "a": "x", "b": 1 } });
        prepare(&mut value, &schema, &Map::new(), &options);
        assert_eq!(value, json!({ "open": { "a": "x", "b": 1 }, "closed": { "a": "x" } }));
    }

    #[test]
    fn test_nullable_branch_selection() {
        let mut definitions = Map::new();
        definitions.insert(
            "Phone".to_string(),
            json!({ "type": "object", "properties": { "number": { "type": "string" } } }),
        );
        let schema = json!({ "anyOf": [{ "$ref": "#/definitions/Phone" }, { "type": "null" }] });
        let mut value = json!({ "number": "1", "junk": 2 });
        prepare(&mut value, &schema, &definitions, &SourceOptions::default());
        assert_eq!(value, json!({ "number": "1" }));
    }

    #[test]
    fn test_ref_cycle_terminates() {
        let mut definitions = Map::new();
        definitions.insert("A".to_string(), json!({ "$ref": "#/definitions/B" }));
        definitions.insert("B".to_string(), json!({ "$ref": "#/definitions/A" }));
        let mut value = json!({ "x": 1 });
        prepare(&mut value, &json!({ "$ref": "A" }), &definitions, &text());
        assert_eq!(value, json!({ "x": 1 }));
    }
}
