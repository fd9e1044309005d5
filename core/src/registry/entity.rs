//! # Entity Declarations
//!
//! Explicit descriptors that replace annotation-driven metadata. An entity is
//! identified by a Rust type; fields reference other entities through that
//! identity rather than by name.

use serde_json::{Map, Value};
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a declared entity.
///
/// Equality and hashing use the `TypeId` only; the type name is kept for
/// diagnostics and as a fallback GraphQL name.
#[derive(Clone, Copy)]
pub struct EntityId {
    type_id: TypeId,
    type_name: &'static str,
}

impl EntityId {
    /// Identity of the Rust type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified Rust type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Last path segment of the type name (e.g. `Customer`).
    pub fn short_name(&self) -> &'static str {
        let base = self.type_name.split('<').next().unwrap_or(self.type_name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.type_name)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// Primitive semantic types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    /// Text.
    String,
    /// Whole number.
    Integer,
    /// Floating point number.
    Number,
    /// `true` / `false`.
    Boolean,
    /// Opaque identifier, transported as a string.
    Id,
    /// RFC 3339 timestamp.
    DateTime,
    /// Calendar date.
    Date,
    /// UUID string.
    Uuid,
}

impl ScalarType {
    /// JSON Schema `type` and optional `format`.
    pub fn json_type(&self) -> (&'static str, Option<&'static str>) {
        match self {
            ScalarType::String | ScalarType::Id => ("string", None),
            ScalarType::Integer => ("integer", None),
            ScalarType::Number => ("number", None),
            ScalarType::Boolean => ("boolean", None),
            ScalarType::DateTime => ("string", Some("date-time")),
            ScalarType::Date => ("string", Some("date")),
            ScalarType::Uuid => ("string", Some("uuid")),
        }
    }

    /// Built-in GraphQL scalar name.
    pub fn graphql_name(&self) -> &'static str {
        match self {
            ScalarType::Integer => "Int",
            ScalarType::Number => "Float",
            ScalarType::Boolean => "Boolean",
            ScalarType::Id | ScalarType::Uuid => "ID",
            ScalarType::String | ScalarType::DateTime | ScalarType::Date => "String",
        }
    }
}

/// Declared type of a field or parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// A primitive.
    Scalar(ScalarType),
    /// A literal JSON Schema, passed through untouched (may contain user `$ref`s).
    Raw(Value),
    /// A reference to another registered entity.
    Entity(EntityId),
    /// An array of the inner type.
    Array(Box<FieldType>),
}

impl FieldType {
    /// Reference to entity `T`.
    pub fn entity<T: 'static>() -> Self {
        FieldType::Entity(EntityId::of::<T>())
    }

    /// Array of `inner`.
    pub fn array(inner: FieldType) -> Self {
        FieldType::Array(Box::new(inner))
    }

    /// The entity this type ultimately points at, if any.
    pub fn referenced_entity(&self) -> Option<EntityId> {
        match self {
            FieldType::Entity(id) => Some(*id),
            FieldType::Array(inner) => inner.referenced_entity(),
            FieldType::Scalar(_) | FieldType::Raw(_) => None,
        }
    }
}

impl From<ScalarType> for FieldType {
    fn from(s: ScalarType) -> Self {
        FieldType::Scalar(s)
    }
}

/// Validation switches shared by fields and parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Accept any value and never require it.
    pub disabled: bool,
}

/// GraphQL-specific field options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphqlFieldOptions {
    /// Field name override.
    pub name: Option<String>,
    /// Named type override (e.g. `"ID"`).
    pub type_name: Option<String>,
    /// Nullability override; defaults to `!required`.
    pub nullable: Option<bool>,
    /// Description override.
    pub description: Option<String>,
    /// Leave the field out of the GraphQL type.
    pub exclude: bool,
}

/// A single declared field of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    /// Property name.
    pub name: String,
    /// Semantic type.
    pub ty: FieldType,
    /// Whether the property must be present.
    pub required: bool,
    /// Validation switches.
    pub validation: ValidationOptions,
    /// Description emitted into schemas.
    pub description: Option<String>,
    /// Declared default value.
    pub default: Option<Value>,
    /// Whether `null` is accepted in addition to the declared type.
    pub nullable: bool,
    /// Extra JSON Schema keywords (`minLength`, `pattern`, ...).
    pub keywords: Map<String, Value>,
    /// GraphQL options.
    pub graphql: GraphqlFieldOptions,
}

impl FieldDefinition {
    /// Creates an optional field with validation enabled.
    pub fn new(name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            required: false,
            validation: ValidationOptions::default(),
            description: None,
            default: None,
            nullable: false,
            keywords: Map::new(),
            graphql: GraphqlFieldOptions::default(),
        }
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Disables validation for this field.
    pub fn disable_validation(mut self) -> Self {
        self.validation.disabled = true;
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the default value.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Accepts `null`.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Adds a JSON Schema keyword.
    pub fn keyword(mut self, key: impl Into<String>, value: Value) -> Self {
        self.keywords.insert(key.into(), value);
        self
    }

    /// Replaces the GraphQL options.
    pub fn graphql(mut self, options: GraphqlFieldOptions) -> Self {
        self.graphql = options;
        self
    }

    /// Whether the field participates in the `required` list.
    pub fn is_enforced_required(&self) -> bool {
        self.required && !self.validation.disabled
    }
}

/// A declared entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDefinition {
    /// Identity.
    pub id: EntityId,
    /// Stable id used for `$ref`s and component names. Untitled entities are inlined.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Ordered fields.
    pub fields: Vec<FieldDefinition>,
    /// Explicit `additionalProperties` setting.
    pub additional_properties: Option<bool>,
}

impl EntityDefinition {
    /// Starts a declaration for the Rust type `T`.
    pub fn builder<T: 'static>() -> EntityBuilder {
        EntityBuilder::new(EntityId::of::<T>())
    }

    /// Name used for GraphQL types: the title, or the Rust type's short name.
    pub fn graphql_name(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| self.id.short_name().to_string())
    }
}

/// Builder for [`EntityDefinition`].
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    def: EntityDefinition,
}

impl EntityBuilder {
    fn new(id: EntityId) -> Self {
        Self {
            def: EntityDefinition {
                id,
                title: None,
                description: None,
                fields: Vec::new(),
                additional_properties: None,
            },
        }
    }

    /// Sets the title (stable id).
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.def.title = Some(title.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.def.description = Some(description.into());
        self
    }

    /// Appends a field.
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.def.fields.push(field);
        self
    }

    /// Sets `additionalProperties`.
    pub fn additional_properties(mut self, allowed: bool) -> Self {
        self.def.additional_properties = Some(allowed);
        self
    }

    /// Finishes the declaration.
    pub fn build(self) -> EntityDefinition {
        self.def
    }
}

/// A type that can describe itself as an entity.
pub trait Entity: 'static {
    /// Returns the declaration for this type.
    fn definition() -> EntityDefinition;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Customer;
    mod nested {
        pub struct Customer;
    }

    #[test]
    fn test_identity_is_type_based() {
        assert_eq!(EntityId::of::<Customer>(), EntityId::of::<Customer>());
        assert_ne!(EntityId::of::<Customer>(), EntityId::of::<nested::Customer>());
        assert_eq!(EntityId::of::<nested::Customer>().short_name(), "Customer");
    }

    #[test]
    fn test_referenced_entity() {
        let ty = FieldType::array(FieldType::entity::<Customer>());
        assert_eq!(ty.referenced_entity(), Some(EntityId::of::<Customer>()));
        assert_eq!(FieldType::from(ScalarType::Integer).referenced_entity(), None);
    }

    #[test]
    fn test_disabled_field_never_required() {
        let f = FieldDefinition::new("x", ScalarType::String)
            .required()
            .disable_validation();
        assert!(!f.is_enforced_required());
    }

    #[test]
    fn test_graphql_name_fallback() {
        let def = EntityDefinition::builder::<Customer>().build();
        assert_eq!(def.graphql_name(), "Customer");
        let titled = EntityDefinition::builder::<Customer>().title("Client").build();
        assert_eq!(titled.graphql_name(), "Client");
    }
}
