//! # JSON Schema Synthesizer
//!
//! Converts entity declarations into JSON Schema fragments.
//!
//! Titled entities become shared definitions addressed by `$id` and every
//! referrer points at them with `{"$ref": <title>}`; untitled entities are
//! inlined. The cache is keyed by entity identity, never by name.

use crate::error::{AppError, AppResult};
use crate::registry::{EntityDefinition, EntityId, EntityRegistry, FieldDefinition, FieldType};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Synthesis cache plus the shared definition set handed to validation engines.
#[derive(Debug, Default, Clone)]
pub struct SchemaSynthesizer {
    cache: HashMap<EntityId, Arc<Value>>,
    definitions: IndexMap<String, Arc<Value>>,
    owners: HashMap<String, EntityId>,
    titled_in_progress: HashSet<EntityId>,
    // Untitled entities entered since the innermost titled one.
    untitled_stack: HashSet<EntityId>,
}

impl SchemaSynthesizer {
    /// Creates an empty synthesizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesizes (or returns the cached) fragment for an entity.
    ///
    /// Repeated calls for the same identity return the same `Arc`.
    pub fn synthesize(&mut self, registry: &EntityRegistry, id: EntityId) -> AppResult<Arc<Value>> {
        if let Some(hit) = self.cache.get(&id) {
            return Ok(hit.clone());
        }

        let def = registry.get(id)?;
        let built = if def.title.is_some() {
            // Untitled entities above a titled one may recur below it.
            self.titled_in_progress.insert(id);
            let outer = std::mem::take(&mut self.untitled_stack);
            let built = self.build_entity(registry, &def);
            self.untitled_stack = outer;
            self.titled_in_progress.remove(&id);
            built
        } else {
            if !self.untitled_stack.insert(id) {
                return Err(AppError::Schema(format!(
                    "Cyclic reference through untitled entity {}; give it a title to share it by $ref",
                    id
                )));
            }
            let built = self.build_entity(registry, &def);
            self.untitled_stack.remove(&id);
            built
        };
        let fragment = Arc::new(built?);

        self.cache.insert(id, fragment.clone());
        if let Some(title) = &def.title {
            self.add_definition(title, id, fragment.clone())?;
        }
        Ok(fragment)
    }

    /// Schema for a declared field or parameter type.
    ///
    /// Titled entity references come back as `{"$ref": <title>}` and their
    /// fragments land in [`definitions`](Self::definitions).
    pub fn field_schema(&mut self, registry: &EntityRegistry, ty: &FieldType) -> AppResult<Value> {
        match ty {
            FieldType::Scalar(scalar) => {
                let (type_name, format) = scalar.json_type();
                let mut map = Map::new();
                map.insert("type".to_string(), json!(type_name));
                if let Some(format) = format {
                    map.insert("format".to_string(), json!(format));
                }
                Ok(Value::Object(map))
            }
            FieldType::Raw(value) => Ok(value.clone()),
            FieldType::Entity(id) => self.entity_reference(registry, *id),
            FieldType::Array(inner) => {
                let items = self.field_schema(registry, inner)?;
                Ok(json!({ "type": "array", "items": items }))
            }
        }
    }

    /// Cached fragment for an identity, if synthesized.
    pub fn fragment(&self, id: EntityId) -> Option<Arc<Value>> {
        self.cache.get(&id).cloned()
    }

    /// Shared definitions by stable id, in synthesis order.
    pub fn definitions(&self) -> &IndexMap<String, Arc<Value>> {
        &self.definitions
    }

    /// Shared definition for a stable id.
    pub fn definition(&self, stable_id: &str) -> Option<Arc<Value>> {
        self.definitions.get(stable_id).cloned()
    }

    fn entity_reference(&mut self, registry: &EntityRegistry, id: EntityId) -> AppResult<Value> {
        let def = registry.get(id)?;
        match &def.title {
            Some(title) => {
                // A titled entity under construction is referenced, not re-entered.
                if !self.titled_in_progress.contains(&id) {
                    self.synthesize(registry, id)?;
                }
                Ok(json!({ "$ref": title }))
            }
            None => {
                let fragment = self.synthesize(registry, id)?;
                Ok((*fragment).clone())
            }
        }
    }

    fn build_entity(&mut self, registry: &EntityRegistry, def: &EntityDefinition) -> AppResult<Value> {
        let mut map = Map::new();
        if let Some(title) = &def.title {
            map.insert("$id".to_string(), json!(title));
            map.insert("title".to_string(), json!(title));
        }
        if let Some(desc) = &def.description {
            map.insert("description".to_string(), json!(desc));
        }
        map.insert("type".to_string(), json!("object"));

        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &def.fields {
            let schema = self.property_schema(registry, field)?;
            properties.insert(field.name.clone(), schema);
            if field.is_enforced_required() {
                required.push(json!(field.name));
            }
        }
        map.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            map.insert("required".to_string(), Value::Array(required));
        }
        if let Some(additional) = def.additional_properties {
            map.insert("additionalProperties".to_string(), json!(additional));
        }
        Ok(Value::Object(map))
    }

    fn property_schema(&mut self, registry: &EntityRegistry, field: &FieldDefinition) -> AppResult<Value> {
        if field.validation.disabled {
            return Ok(Value::Bool(true));
        }
        let base = self.field_schema(registry, &field.ty)?;
        Ok(decorate(base, field))
    }

    fn add_definition(&mut self, stable_id: &str, id: EntityId, fragment: Arc<Value>) -> AppResult<()> {
        match self.owners.get(stable_id) {
            Some(owner) if *owner != id => Err(AppError::Registration(format!(
                "Stable id '{}' is claimed by both {} and {}",
                stable_id, owner, id
            ))),
            Some(_) => Ok(()),
            None => {
                tracing::debug!(stable_id, entity = %id, "schema fragment registered");
                self.owners.insert(stable_id.to_string(), id);
                self.definitions.insert(stable_id.to_string(), fragment);
                Ok(())
            }
        }
    }
}

/// The `$id` of a fragment, if it has one.
pub fn stable_id(schema: &Value) -> Option<&str> {
    schema.get("$id").and_then(Value::as_str)
}

/// Rewrites `{"$ref": <stable id>}` into `{"$ref": <prefix><stable id>}`.
///
/// Only exact stable ids are touched; user-authored references pass through.
pub fn rewrite_refs(value: &mut Value, known: &[String], prefix: &str) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get_mut("$ref") {
                if known.iter().any(|id| id.as_str() == reference.as_str()) {
                    *reference = format!("{}{}", prefix, reference);
                }
            }
            for (key, child) in map.iter_mut() {
                match key.as_str() {
                    "$ref" | "default" | "enum" | "const" | "examples" => {}
                    // Keys of these maps are names, not keywords.
                    "properties" | "patternProperties" | "definitions" => {
                        if let Value::Object(named) = child {
                            for schema in named.values_mut() {
                                rewrite_refs(schema, known, prefix);
                            }
                        }
                    }
                    _ => rewrite_refs(child, known, prefix),
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                rewrite_refs(item, known, prefix);
            }
        }
        _ => {}
    }
}

/// Applies field-level annotations to a property schema.
///
/// `$ref` siblings are ignored by draft 7 engines, so annotated references are
/// wrapped in `allOf`.
fn decorate(base: Value, field: &FieldDefinition) -> Value {
    let has_annotations =
        field.description.is_some() || field.default.is_some() || !field.keywords.is_empty();
    if !has_annotations && !field.nullable {
        return base;
    }

    let mut schema = if base.get("$ref").is_some() {
        if field.nullable {
            json!({ "anyOf": [base, { "type": "null" }] })
        } else {
            json!({ "allOf": [base] })
        }
    } else {
        let mut base = base;
        if field.nullable {
            if let Some(map) = base.as_object_mut() {
                match map.get("type").cloned() {
                    Some(Value::String(t)) => {
                        map.insert("type".to_string(), json!([t, "null"]));
                    }
                    Some(Value::Array(mut types)) => {
                        if !types.contains(&json!("null")) {
                            types.push(json!("null"));
                        }
                        map.insert("type".to_string(), Value::Array(types));
                    }
                    _ => {}
                }
            }
        }
        base
    };

    if let Some(map) = schema.as_object_mut() {
        for (key, value) in &field.keywords {
            map.insert(key.clone(), value.clone());
        }
        if let Some(desc) = &field.description {
            map.insert("description".to_string(), json!(desc));
        }
        if let Some(default) = &field.default {
            map.insert("default".to_string(), default.clone());
        }
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{EntityDefinition, FieldDefinition, ScalarType};
    use pretty_assertions::assert_eq;

    struct Phone;
    struct Customer;
    struct Supplier;
    struct Node;
    struct Loop;
    struct Address;
    struct Twin;

    fn registry() -> EntityRegistry {
        let mut reg = EntityRegistry::new();
        reg.register(
            EntityDefinition::builder::<Phone>()
                .title("Phone")
                .field(FieldDefinition::new("number", ScalarType::String).required())
                .build(),
        )
        .unwrap();
        reg.register(
            EntityDefinition::builder::<Address>()
                .field(FieldDefinition::new("city", ScalarType::String))
                .build(),
        )
        .unwrap();
        reg.register(
            EntityDefinition::builder::<Customer>()
                .title("Customer")
                .field(FieldDefinition::new("firstname", ScalarType::String).required())
                .field(FieldDefinition::new(
                    "phones",
                    FieldType::array(FieldType::entity::<Phone>()),
                ))
                .field(FieldDefinition::new("address", FieldType::entity::<Address>()))
                .build(),
        )
        .unwrap();
        reg.register(
            EntityDefinition::builder::<Supplier>()
                .title("Supplier")
                .field(FieldDefinition::new("hotline", FieldType::entity::<Phone>()))
                .build(),
        )
        .unwrap();
        reg
    }

    #[test]
    fn test_customer_with_phones() {
        let reg = registry();
        let mut synth = SchemaSynthesizer::new();
        let customer = synth.synthesize(&reg, EntityId::of::<Customer>()).unwrap();

        assert_eq!(
            *customer,
            json!({
                "$id": "Customer",
                "title": "Customer",
                "type": "object",
                "properties": {
                    "firstname": { "type": "string" },
                    "phones": { "type": "array", "items": { "$ref": "Phone" } },
                    "address": {
                        "type": "object",
                        "properties": { "city": { "type": "string" } }
                    }
                },
                "required": ["firstname"]
            })
        );
        let keys: Vec<&String> = synth.definitions().keys().collect();
        assert_eq!(keys, vec!["Phone", "Customer"]);
    }

    #[test]
    fn test_shared_reference_emitted_once() {
        let reg = registry();
        let mut synth = SchemaSynthesizer::new();
        synth.synthesize(&reg, EntityId::of::<Customer>()).unwrap();
        let supplier = synth.synthesize(&reg, EntityId::of::<Supplier>()).unwrap();
        assert_eq!(supplier["properties"]["hotline"], json!({ "$ref": "Phone" }));
        let phones = synth.definitions().keys().filter(|k| *k == "Phone").count();
        assert_eq!(phones, 1);
    }

    #[test]
    fn test_cache_returns_same_fragment() {
        let reg = registry();
        let mut synth = SchemaSynthesizer::new();
        let first = synth.synthesize(&reg, EntityId::of::<Customer>()).unwrap();
        let second = synth.synthesize(&reg, EntityId::of::<Customer>()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_identity_not_structure() {
        struct PhoneCopy;
        let mut reg = registry();
        reg.register(
            EntityDefinition::builder::<PhoneCopy>()
                .title("PhoneCopy")
                .field(FieldDefinition::new("number", ScalarType::String).required())
                .build(),
        )
        .unwrap();
        let mut synth = SchemaSynthesizer::new();
        let a = synth.synthesize(&reg, EntityId::of::<Phone>()).unwrap();
        let b = synth.synthesize(&reg, EntityId::of::<PhoneCopy>()).unwrap();
        assert_ne!(stable_id(&a), stable_id(&b));
        assert_eq!(synth.definitions().len(), 2);
    }

    #[test]
    fn test_titled_self_reference() {
        let mut reg = EntityRegistry::new();
        reg.register(
            EntityDefinition::builder::<Node>()
                .title("Node")
                .field(FieldDefinition::new("children", FieldType::array(FieldType::entity::<Node>())))
                .build(),
        )
        .unwrap();
        let mut synth = SchemaSynthesizer::new();
        let node = synth.synthesize(&reg, EntityId::of::<Node>()).unwrap();
        assert_eq!(node["properties"]["children"]["items"], json!({ "$ref": "Node" }));
    }

    #[test]
    fn test_untitled_cycle_is_rejected() {
        let mut reg = EntityRegistry::new();
        reg.register(
            EntityDefinition::builder::<Loop>()
                .field(FieldDefinition::new("next", FieldType::entity::<Loop>()))
                .build(),
        )
        .unwrap();
        let mut synth = SchemaSynthesizer::new();
        let err = synth.synthesize(&reg, EntityId::of::<Loop>()).unwrap_err();
        assert!(matches!(err, AppError::Schema(_)));
        assert!(synth.fragment(EntityId::of::<Loop>()).is_none());
    }

    #[test]
    fn test_cycle_through_titled_entity_in_any_order() {
        struct Owner;
        struct Pet;

        let mut reg = EntityRegistry::new();
        reg.register(
            EntityDefinition::builder::<Pet>()
                .field(FieldDefinition::new("owner", FieldType::entity::<Owner>()))
                .build(),
        )
        .unwrap();
        reg.register(
            EntityDefinition::builder::<Owner>()
                .title("Owner")
                .field(FieldDefinition::new("pet", FieldType::entity::<Pet>()))
                .build(),
        )
        .unwrap();

        let mut untitled_first = SchemaSynthesizer::new();
        let pet = untitled_first.synthesize(&reg, EntityId::of::<Pet>()).unwrap();
        assert_eq!(
            *pet,
            json!({ "type": "object", "properties": { "owner": { "$ref": "Owner" } } })
        );
        let owner = untitled_first.definition("Owner").unwrap();
        assert_eq!(owner["properties"]["pet"], *pet);

        let mut titled_first = SchemaSynthesizer::new();
        titled_first.synthesize(&reg, EntityId::of::<Owner>()).unwrap();
        let again = titled_first.synthesize(&reg, EntityId::of::<Pet>()).unwrap();
        assert_eq!(again, pet);
    }

    #[test]
    fn test_unregistered_reference() {
        let mut reg = EntityRegistry::new();
        reg.register(
            EntityDefinition::builder::<Twin>()
                .title("Twin")
                .field(FieldDefinition::new("other", FieldType::entity::<Customer>()))
                .build(),
        )
        .unwrap();
        let mut synth = SchemaSynthesizer::new();
        let err = synth.synthesize(&reg, EntityId::of::<Twin>()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_conflicting_ids_across_registries() {
        let mut a = EntityRegistry::new();
        a.register(EntityDefinition::builder::<Phone>().title("Shared").build())
            .unwrap();
        let mut b = EntityRegistry::new();
        b.register(EntityDefinition::builder::<Twin>().title("Shared").build())
            .unwrap();

        let mut synth = SchemaSynthesizer::new();
        synth.synthesize(&a, EntityId::of::<Phone>()).unwrap();
        let err = synth.synthesize(&b, EntityId::of::<Twin>()).unwrap_err();
        assert!(matches!(err, AppError::Registration(_)));
    }

    #[test]
    fn test_field_decorations() {
        struct Item;
        let mut reg = registry();
        reg.register(
            EntityDefinition::builder::<Item>()
                .title("Item")
                .field(
                    FieldDefinition::new("qty", ScalarType::Integer)
                        .default_value(json!(1))
                        .keyword("minimum", json!(1)),
                )
                .field(FieldDefinition::new("note", ScalarType::String).nullable())
                .field(FieldDefinition::new("phone", FieldType::entity::<Phone>()).nullable())
                .field(FieldDefinition::new("blob", ScalarType::String).required().disable_validation())
                .build(),
        )
        .unwrap();
        let mut synth = SchemaSynthesizer::new();
        let item = synth.synthesize(&reg, EntityId::of::<Item>()).unwrap();
        assert_eq!(
            item["properties"]["qty"],
            json!({ "type": "integer", "minimum": 1, "default": 1 })
        );
        assert_eq!(item["properties"]["note"], json!({ "type": ["string", "null"] }));
        assert_eq!(
            item["properties"]["phone"],
            json!({ "anyOf": [{ "$ref": "Phone" }, { "type": "null" }] })
        );
        assert_eq!(item["properties"]["blob"], json!(true));
        assert!(item.get("required").is_none());
    }
}
