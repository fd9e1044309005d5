//! Normalizes synthesized schemas into the shape OpenAPI tooling expects:
//! component references, no `$id`, and typed object schemas in place of
//! boolean schemas.

use crate::schema::rewrite_refs;
use serde_json::{json, Value};

/// Prefix of component references.
pub const COMPONENTS_PREFIX: &str = "#/components/schemas/";

/// Prepares a schema for embedding in a document.
pub fn component_schema(schema: &Value, known: &[String]) -> Value {
    let mut out = schema.clone();
    if let Some(map) = out.as_object_mut() {
        map.shift_remove("$id");
    }
    rewrite_refs(&mut out, known, COMPONENTS_PREFIX);
    normalize_boolean_schemas(&mut out);
    out
}

/// Every JSON type, in the order OpenAPI tooling lists them.
const ANY_TYPES: [&str; 7] = ["array", "boolean", "integer", "null", "number", "object", "string"];

/// Schema accepting any instance.
///
/// Typed document models reject `{}`, so the type list is spelled out.
pub fn any_schema() -> Value {
    json!({ "type": ANY_TYPES })
}

/// Rewrites boolean schemas (`true` / `false`) into object schemas.
///
/// - `true` becomes [`any_schema`]
/// - `false` becomes [`any_schema`] negated with `not`
pub fn normalize_boolean_schemas(value: &mut Value) {
    match value {
        Value::Bool(flag) => {
            *value = if *flag {
                any_schema()
            } else {
                json!({ "type": ANY_TYPES, "not": any_schema() })
            };
        }
        Value::Object(map) => {
            for key in ["properties", "patternProperties", "definitions"] {
                if let Some(named) = map.get_mut(key).and_then(Value::as_object_mut) {
                    for schema in named.values_mut() {
                        normalize_boolean_schemas(schema);
                    }
                }
            }
            for key in ["items", "not", "contains", "propertyNames", "if", "then", "else"] {
                if let Some(schema) = map.get_mut(key) {
                    normalize_boolean_schemas(schema);
                }
            }
            for key in ["allOf", "anyOf", "oneOf", "prefixItems"] {
                if let Some(list) = map.get_mut(key).and_then(Value::as_array_mut) {
                    for schema in list.iter_mut() {
                        normalize_boolean_schemas(schema);
                    }
                }
            }
            // Boolean `additionalProperties` is valid in every OpenAPI version.
            if let Some(additional) = map.get_mut("additionalProperties") {
                if !additional.is_boolean() {
                    normalize_boolean_schemas(additional);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_component_schema() {
        let fragment = json!({
            "$id": "Customer",
            "title": "Customer",
            "type": "object",
            "properties": {
                "raw": true,
                "phones": { "type": "array", "items": { "$ref": "Phone" } },
                "other": { "$ref": "https://example.com/other.json" }
            },
            "additionalProperties": false
        });
        let out = component_schema(&fragment, &["Phone".to_string(), "Customer".to_string()]);
        assert_eq!(
            out,
            json!({
                "title": "Customer",
                "type": "object",
                "properties": {
                    "raw": any_schema(),
                    "phones": {
                        "type": "array",
                        "items": { "$ref": "#/components/schemas/Phone" }
                    },
                    "other": { "$ref": "https://example.com/other.json" }
                },
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn test_false_schema() {
        let mut value = json!({ "anyOf": [false, { "type": "string" }] });
        normalize_boolean_schemas(&mut value);
        assert_eq!(
            value,
            json!({ "anyOf": [{ "type": ANY_TYPES, "not": any_schema() }, { "type": "string" }] })
        );
    }

    #[test]
    fn test_id_removal_keeps_key_order() {
        let fragment = json!({
            "$id": "Phone",
            "title": "Phone",
            "type": "object",
            "required": ["number"]
        });
        let out = component_schema(&fragment, &[]);
        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["title", "type", "required"]);
    }

    #[test]
    fn test_normalized_schemas_parse_into_utoipa() {
        use utoipa::openapi::{schema::Schema, RefOr};

        for raw in [json!(true), json!(false)] {
            let schema = component_schema(&raw, &[]);
            let parsed: Result<RefOr<Schema>, _> = serde_json::from_value(schema.clone());
            assert!(parsed.is_ok(), "{} did not parse", schema);
        }
    }
}
