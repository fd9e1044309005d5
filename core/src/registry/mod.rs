//! # Entity Registry
//!
//! Process-wide table from entity identity to its declaration.
//!
//! - **entity**: field and entity descriptors.
//! - **params**: route and parameter descriptors.
//!
//! Registration must happen before any schema, validator or resolver is
//! compiled; compiled artifacts are not invalidated by later changes.

pub mod entity;
pub mod params;

use crate::error::{AppError, AppResult};
use crate::schema::SchemaSynthesizer;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

pub use entity::{
    Entity, EntityBuilder, EntityDefinition, EntityId, FieldDefinition, FieldType,
    GraphqlFieldOptions, ScalarType, ValidationOptions,
};
pub use params::{ParamConfig, ParamOptions, ParamSource, RouteDescriptor};

const STABLE_ID_PATTERN: &str = r"^[a-zA-Z0-9._-]+$";

/// Registry of entity declarations keyed by identity.
#[derive(Debug, Default, Clone)]
pub struct EntityRegistry {
    entities: IndexMap<EntityId, Arc<EntityDefinition>>,
    titles: HashMap<String, EntityId>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or re-registers) a declaration. Last write wins per identity.
    ///
    /// Fails when the title is not a valid stable id, or is already claimed
    /// by a different entity.
    pub fn register(&mut self, definition: EntityDefinition) -> AppResult<()> {
        if let Some(title) = &definition.title {
            validate_stable_id(title)?;
            if let Some(owner) = self.titles.get(title) {
                if *owner != definition.id {
                    return Err(AppError::Registration(format!(
                        "Stable id '{}' is already used by {}, cannot assign it to {}",
                        title, owner, definition.id
                    )));
                }
            }
        }

        if let Some(previous) = self.entities.get(&definition.id) {
            if let Some(old_title) = &previous.title {
                self.titles.remove(old_title);
            }
            tracing::debug!(entity = %definition.id, "entity re-registered");
        }

        if let Some(title) = &definition.title {
            self.titles.insert(title.clone(), definition.id);
        }
        self.entities.insert(definition.id, Arc::new(definition));
        Ok(())
    }

    /// Registers a type implementing [`Entity`].
    pub fn register_entity<T: Entity>(&mut self) -> AppResult<()> {
        self.register(T::definition())
    }

    /// Looks up a declaration.
    pub fn get(&self, id: EntityId) -> AppResult<Arc<EntityDefinition>> {
        self.entities
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Entity {} is not registered", id)))
    }

    /// Whether the identity has been registered.
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Looks up the entity owning a stable id.
    pub fn by_title(&self, title: &str) -> Option<Arc<EntityDefinition>> {
        self.titles
            .get(title)
            .and_then(|id| self.entities.get(id))
            .cloned()
    }

    /// All declarations in registration order.
    pub fn definitions(&self) -> &IndexMap<EntityId, Arc<EntityDefinition>> {
        &self.entities
    }

    /// Standalone JSON Schema for one entity, with every referenced fragment
    /// embedded under `definitions`.
    pub fn json_schema(&self, id: EntityId) -> AppResult<Value> {
        let mut synth = SchemaSynthesizer::new();
        let fragment = synth.synthesize(self, id)?;
        let mut root = (*fragment).clone();
        if let Value::Object(map) = &mut root {
            let own_id = map.get("$id").cloned();
            let defs: serde_json::Map<String, Value> = synth
                .definitions()
                .iter()
                .filter(|(key, _)| own_id.as_ref().and_then(Value::as_str) != Some(key.as_str()))
                .map(|(key, value)| (key.clone(), (**value).clone()))
                .collect();
            if !defs.is_empty() {
                map.insert("definitions".to_string(), Value::Object(defs));
            }
        }
        Ok(root)
    }
}

/// Checks that a title can serve as a `$id` and OpenAPI component key.
pub fn validate_stable_id(title: &str) -> AppResult<()> {
    static STABLE_ID_RE: OnceLock<Regex> = OnceLock::new();
    let re = STABLE_ID_RE.get_or_init(|| Regex::new(STABLE_ID_PATTERN).expect("Invalid regex"));
    if re.is_match(title) {
        Ok(())
    } else {
        Err(AppError::Registration(format!(
            "Entity title '{}' must match {}",
            title, STABLE_ID_PATTERN
        )))
    }
}

/// The process-wide registry.
pub fn global() -> &'static RwLock<EntityRegistry> {
    static GLOBAL: OnceLock<RwLock<EntityRegistry>> = OnceLock::new();
    GLOBAL.get_or_init(|| RwLock::new(EntityRegistry::new()))
}

/// Registers a declaration in the process-wide registry.
pub fn register_global(definition: EntityDefinition) -> AppResult<()> {
    let mut registry = global()
        .write()
        .map_err(|_| AppError::General("Entity registry lock poisoned".into()))?;
    registry.register(definition)
}

/// Snapshot of the process-wide registry, for compilation passes.
pub fn global_snapshot() -> AppResult<EntityRegistry> {
    let registry = global()
        .read()
        .map_err(|_| AppError::General("Entity registry lock poisoned".into()))?;
    Ok(registry.clone())
}
