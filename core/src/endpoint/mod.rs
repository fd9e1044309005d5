//! # Endpoint Schema Builder
//!
//! Turns a route's parameter list into one composite schema partitioned by
//! wire source (`params`, `querystring`, `headers`, `body`).
//!
//! Injected sources (context, request, response) contribute nothing.
//! Parameters are processed strictly in declaration order so entity
//! fragments are emitted deterministically.

use crate::error::{AppError, AppResult};
use crate::registry::{EntityRegistry, ParamConfig, ParamSource, RouteDescriptor};
use crate::schema::SchemaSynthesizer;
use serde_json::{json, Map, Value};
use std::fmt;

/// A named section of the request data bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    /// Path parameters.
    Params,
    /// Query string.
    Querystring,
    /// Headers.
    Headers,
    /// Body.
    Body,
}

impl Partition {
    /// All partitions in validation order.
    pub const ALL: [Partition; 4] = [
        Partition::Params,
        Partition::Querystring,
        Partition::Headers,
        Partition::Body,
    ];

    /// Key in the request data bundle.
    pub fn name(&self) -> &'static str {
        match self {
            Partition::Params => "params",
            Partition::Querystring => "querystring",
            Partition::Headers => "headers",
            Partition::Body => "body",
        }
    }

    /// Partition fed by a parameter source; `None` for injected sources.
    pub fn for_source(source: ParamSource) -> Option<Self> {
        match source {
            ParamSource::Path => Some(Partition::Params),
            ParamSource::Query => Some(Partition::Querystring),
            ParamSource::Header => Some(Partition::Headers),
            ParamSource::Body => Some(Partition::Body),
            ParamSource::Context
            | ParamSource::Request
            | ParamSource::Response
            | ParamSource::Argument => None,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An object-typed partition built from named parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectPartition {
    /// Property schemas by parameter name.
    pub properties: Map<String, Value>,
    /// Required parameter names. Only ever appended to.
    pub required: Vec<String>,
}

impl ObjectPartition {
    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".to_string(), json!("object"));
        map.insert("properties".to_string(), Value::Object(self.properties.clone()));
        if !self.required.is_empty() {
            map.insert("required".to_string(), json!(self.required));
        }
        Value::Object(map)
    }
}

/// Composite request schema for one route.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSchema {
    /// `Controller.method` of the route.
    pub route: String,
    params: Option<ObjectPartition>,
    querystring: Option<ObjectPartition>,
    headers: Option<ObjectPartition>,
    body: Option<Value>,
    body_required: bool,
}

impl EndpointSchema {
    /// Creates an empty schema for a route.
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            params: None,
            querystring: None,
            headers: None,
            body: None,
            body_required: false,
        }
    }

    /// Whether the partition was declared by at least one parameter.
    pub fn has_partition(&self, partition: Partition) -> bool {
        match partition {
            Partition::Body => self.body.is_some(),
            _ => self.object(partition).is_some(),
        }
    }

    /// Declared partitions in validation order.
    pub fn partitions(&self) -> Vec<Partition> {
        Partition::ALL
            .into_iter()
            .filter(|p| self.has_partition(*p))
            .collect()
    }

    /// Schema of one partition.
    pub fn partition_schema(&self, partition: Partition) -> Option<Value> {
        match partition {
            Partition::Body => self.body.clone(),
            _ => self.object(partition).map(ObjectPartition::to_value),
        }
    }

    /// Object partition details (not available for the body).
    pub fn object(&self, partition: Partition) -> Option<&ObjectPartition> {
        match partition {
            Partition::Params => self.params.as_ref(),
            Partition::Querystring => self.querystring.as_ref(),
            Partition::Headers => self.headers.as_ref(),
            Partition::Body => None,
        }
    }

    /// Whether a missing body fails validation.
    pub fn body_required(&self) -> bool {
        self.body_required
    }

    /// Top-level required partitions.
    pub fn required_partitions(&self) -> Vec<Partition> {
        if self.body_required {
            vec![Partition::Body]
        } else {
            Vec::new()
        }
    }

    /// The composite schema as a single JSON object.
    pub fn to_value(&self) -> Value {
        let mut properties = Map::new();
        for partition in self.partitions() {
            if let Some(schema) = self.partition_schema(partition) {
                properties.insert(partition.name().to_string(), schema);
            }
        }
        let mut map = Map::new();
        map.insert("type".to_string(), json!("object"));
        map.insert("properties".to_string(), Value::Object(properties));
        let required: Vec<&str> = self.required_partitions().iter().map(Partition::name).collect();
        if !required.is_empty() {
            map.insert("required".to_string(), json!(required));
        }
        Value::Object(map)
    }

    fn object_mut(&mut self, partition: Partition) -> Option<&mut ObjectPartition> {
        let slot = match partition {
            Partition::Params => &mut self.params,
            Partition::Querystring => &mut self.querystring,
            Partition::Headers => &mut self.headers,
            Partition::Body => return None,
        };
        Some(slot.get_or_insert_with(ObjectPartition::default))
    }

    fn add_property(&mut self, partition: Partition, name: &str, schema: Value, required: bool) {
        if let Some(object) = self.object_mut(partition) {
            object.properties.insert(name.to_string(), schema);
            if required && !object.required.iter().any(|r| r == name) {
                object.required.push(name.to_string());
            }
        }
    }

    fn set_body(&mut self, schema: Value, required: bool) -> AppResult<()> {
        if self.body.is_some() {
            return Err(AppError::Registration(format!(
                "Route {} declares more than one body parameter",
                self.route
            )));
        }
        self.body = Some(schema);
        self.body_required = required;
        Ok(())
    }
}

/// Builds the endpoint schema of a route.
///
/// Entity fragments referenced by parameters are synthesized into `synth`,
/// so the same synthesizer must later back the route's validator.
pub fn build_endpoint_schema(
    synth: &mut SchemaSynthesizer,
    registry: &EntityRegistry,
    route: &RouteDescriptor,
) -> AppResult<EndpointSchema> {
    let mut endpoint = EndpointSchema::new(route.qualified_name());

    for param in &route.params {
        let Some(partition) = Partition::for_source(param.source) else {
            continue;
        };
        let schema = param_schema(synth, registry, param)?;
        let required = param.is_enforced_required();
        match partition {
            Partition::Body => endpoint.set_body(schema, required)?,
            _ => endpoint.add_property(partition, &param.name, schema, required),
        }
    }

    tracing::debug!(
        route = %endpoint.route,
        partitions = ?endpoint.partitions(),
        "endpoint schema built"
    );
    Ok(endpoint)
}

fn param_schema(
    synth: &mut SchemaSynthesizer,
    registry: &EntityRegistry,
    param: &ParamConfig,
) -> AppResult<Value> {
    if param.options.validation.disabled {
        return Ok(Value::Bool(true));
    }
    let mut schema = synth.field_schema(registry, &param.ty)?;
    if let (Some(desc), Some(map)) = (&param.options.description, schema.as_object_mut()) {
        if !map.contains_key("$ref") {
            map.insert("description".to_string(), json!(desc));
        }
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{EntityDefinition, FieldDefinition, FieldType, ScalarType};
    use pretty_assertions::assert_eq;

    struct Customer;
    struct Filter;

    fn registry() -> EntityRegistry {
        let mut reg = EntityRegistry::new();
        reg.register(
            EntityDefinition::builder::<Customer>()
                .title("Customer")
                .field(FieldDefinition::new("firstname", ScalarType::String).required())
                .build(),
        )
        .unwrap();
        reg.register(
            EntityDefinition::builder::<Filter>()
                .field(FieldDefinition::new("term", ScalarType::String))
                .build(),
        )
        .unwrap();
        reg
    }

    #[test]
    fn test_partitions_by_source() {
        let reg = registry();
        let route = RouteDescriptor::new("Customers", "update", "put", "/customers/{id}")
            .param(ParamConfig::context())
            .param(ParamConfig::path("id", ScalarType::Uuid).required())
            .param(ParamConfig::query("verbose", ScalarType::Boolean))
            .param(ParamConfig::header("x-tenant", ScalarType::String).required())
            .param(ParamConfig::body("customer", FieldType::entity::<Customer>()).required());

        let mut synth = SchemaSynthesizer::new();
        let endpoint = build_endpoint_schema(&mut synth, &reg, &route).unwrap();

        assert_eq!(
            endpoint.partitions(),
            vec![
                Partition::Params,
                Partition::Querystring,
                Partition::Headers,
                Partition::Body
            ]
        );
        assert_eq!(
            endpoint.to_value(),
            json!({
                "type": "object",
                "properties": {
                    "params": {
                        "type": "object",
                        "properties": { "id": { "type": "string", "format": "uuid" } },
                        "required": ["id"]
                    },
                    "querystring": {
                        "type": "object",
                        "properties": { "verbose": { "type": "boolean" } }
                    },
                    "headers": {
                        "type": "object",
                        "properties": { "x-tenant": { "type": "string" } },
                        "required": ["x-tenant"]
                    },
                    "body": { "$ref": "Customer" }
                },
                "required": ["body"]
            })
        );
        assert!(synth.definition("Customer").is_some());
    }

    #[test]
    fn test_partition_absent_without_params() {
        let reg = registry();
        let route = RouteDescriptor::new("Customers", "list", "get", "/customers")
            .param(ParamConfig::context())
            .param(ParamConfig::query("limit", ScalarType::Integer));
        let mut synth = SchemaSynthesizer::new();
        let endpoint = build_endpoint_schema(&mut synth, &reg, &route).unwrap();
        assert_eq!(endpoint.partitions(), vec![Partition::Querystring]);
        assert!(endpoint.partition_schema(Partition::Body).is_none());
        assert!(endpoint.to_value().get("required").is_none());
    }

    #[test]
    fn test_disabled_validation_accepts_anything() {
        let reg = registry();
        let route = RouteDescriptor::new("Customers", "search", "get", "/customers")
            .param(ParamConfig::query("raw", ScalarType::Integer).required().disable_validation())
            .param(ParamConfig::query("page", ScalarType::Integer).required());
        let mut synth = SchemaSynthesizer::new();
        let endpoint = build_endpoint_schema(&mut synth, &reg, &route).unwrap();
        let query = endpoint.object(Partition::Querystring).unwrap();
        assert_eq!(query.properties["raw"], json!(true));
        assert_eq!(query.required, vec!["page".to_string()]);
    }

    #[test]
    fn test_untitled_body_is_inlined() {
        let reg = registry();
        let route = RouteDescriptor::new("Customers", "filter", "post", "/customers/filter")
            .param(ParamConfig::body("filter", FieldType::entity::<Filter>()));
        let mut synth = SchemaSynthesizer::new();
        let endpoint = build_endpoint_schema(&mut synth, &reg, &route).unwrap();
        assert_eq!(
            endpoint.partition_schema(Partition::Body).unwrap(),
            json!({ "type": "object", "properties": { "term": { "type": "string" } } })
        );
        assert!(!endpoint.body_required());
        assert!(synth.definitions().is_empty());
    }

    #[test]
    fn test_duplicate_body_rejected() {
        let reg = registry();
        let route = RouteDescriptor::new("Customers", "odd", "post", "/odd")
            .param(ParamConfig::body("a", ScalarType::String))
            .param(ParamConfig::body("b", ScalarType::String));
        let mut synth = SchemaSynthesizer::new();
        let err = build_endpoint_schema(&mut synth, &reg, &route).unwrap_err();
        assert!(matches!(err, AppError::Registration(_)));
    }

    #[test]
    fn test_unregistered_param_type() {
        struct Ghost;
        let reg = registry();
        let route = RouteDescriptor::new("Ghosts", "create", "post", "/ghosts")
            .param(ParamConfig::body("ghost", FieldType::entity::<Ghost>()));
        let mut synth = SchemaSynthesizer::new();
        let err = build_endpoint_schema(&mut synth, &reg, &route).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
