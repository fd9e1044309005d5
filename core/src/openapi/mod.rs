//! # OpenAPI Generation
//!
//! Renders registered routes and the shared entity definitions as an
//! OpenAPI 3.1 document.
//!
//! - **normalization**: component references and boolean schema rewriting.
//!
//! The document is built as a `serde_json::Value`; [`parse_openapi_document`]
//! turns it into the typed `utoipa` model for consumers that want one.

pub mod normalization;

use crate::config::OpenApiConfig;
use crate::endpoint::{EndpointSchema, Partition};
use crate::error::{AppError, AppResult};
use crate::registry::RouteDescriptor;
use crate::schema::SchemaSynthesizer;
use heck::ToLowerCamelCase;
use serde_json::{json, Map, Value};

pub use normalization::{any_schema, component_schema, normalize_boolean_schemas, COMPONENTS_PREFIX};

/// OpenAPI version emitted in the `openapi` field.
pub const OPENAPI_VERSION: &str = "3.1.0";

const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Builds an OpenAPI document for `routes`.
///
/// Each route must have a matching endpoint schema (by `Controller.method`),
/// built with the same synthesizer passed here.
pub fn generate_openapi_document(
    routes: &[RouteDescriptor],
    endpoints: &[EndpointSchema],
    synth: &SchemaSynthesizer,
    config: &OpenApiConfig,
) -> AppResult<Value> {
    let known: Vec<String> = synth.definitions().keys().cloned().collect();

    let mut paths = Map::new();
    for route in routes {
        let name = route.qualified_name();
        let endpoint = endpoints
            .iter()
            .find(|e| e.route == name)
            .ok_or_else(|| AppError::NotFound(format!("No endpoint schema for {}", name)))?;

        let method = route.http_method.to_ascii_lowercase();
        if !HTTP_METHODS.contains(&method.as_str()) {
            return Err(AppError::General(format!(
                "Unsupported HTTP method '{}' on {}",
                route.http_method, name
            )));
        }

        let item = paths
            .entry(route.path.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(item) = item else {
            continue;
        };
        if item.contains_key(&method) {
            return Err(AppError::Registration(format!(
                "Duplicate operation {} {}",
                route.http_method, route.path
            )));
        }
        item.insert(method, build_operation(route, endpoint, &known));
    }

    let mut schemas = Map::new();
    for (id, fragment) in synth.definitions() {
        schemas.insert(id.clone(), component_schema(fragment, &known));
    }

    let mut info = Map::new();
    info.insert("title".to_string(), json!(config.title));
    info.insert("version".to_string(), json!(config.version));
    if let Some(desc) = &config.description {
        info.insert("description".to_string(), json!(desc));
    }

    let mut doc = Map::new();
    doc.insert("openapi".to_string(), json!(OPENAPI_VERSION));
    doc.insert("info".to_string(), Value::Object(info));
    doc.insert("paths".to_string(), Value::Object(paths));
    if !schemas.is_empty() {
        doc.insert("components".to_string(), json!({ "schemas": schemas }));
    }

    tracing::debug!(
        routes = routes.len(),
        schemas = synth.definitions().len(),
        "openapi document generated"
    );
    Ok(Value::Object(doc))
}

/// Deserializes a generated document into the `utoipa` model.
pub fn parse_openapi_document(doc: &Value) -> AppResult<utoipa::openapi::OpenApi> {
    serde_json::from_value(doc.clone())
        .map_err(|e| AppError::General(format!("Failed to parse OpenAPI document: {}", e)))
}

fn build_operation(route: &RouteDescriptor, endpoint: &EndpointSchema, known: &[String]) -> Value {
    let mut op = Map::new();
    op.insert(
        "operationId".to_string(),
        json!(format!("{}_{}", route.controller, route.method).to_lower_camel_case()),
    );
    if let Some(summary) = &route.summary {
        op.insert("summary".to_string(), json!(summary));
    }
    if !route.tags.is_empty() {
        op.insert("tags".to_string(), json!(route.tags));
    }

    let mut parameters = Vec::new();
    for (partition, location) in [
        (Partition::Params, "path"),
        (Partition::Querystring, "query"),
        (Partition::Headers, "header"),
    ] {
        let Some(object) = endpoint.object(partition) else {
            continue;
        };
        for (name, schema) in &object.properties {
            // Path parameters are always required in OpenAPI.
            let required = location == "path" || object.required.contains(name);
            let mut param = Map::new();
            param.insert("name".to_string(), json!(name));
            param.insert("in".to_string(), json!(location));
            param.insert("required".to_string(), json!(required));
            param.insert("schema".to_string(), component_schema(schema, known));
            parameters.push(Value::Object(param));
        }
    }
    if !parameters.is_empty() {
        op.insert("parameters".to_string(), Value::Array(parameters));
    }

    if let Some(body) = endpoint.partition_schema(Partition::Body) {
        op.insert(
            "requestBody".to_string(),
            json!({
                "required": endpoint.body_required(),
                "content": {
                    "application/json": { "schema": component_schema(&body, known) }
                }
            }),
        );
    }

    let mut responses = Map::new();
    responses.insert("200".to_string(), json!({ "description": "OK" }));
    if !endpoint.partitions().is_empty() {
        responses.insert("400".to_string(), json!({ "description": "Validation failed" }));
    }
    op.insert("responses".to_string(), Value::Object(responses));
    Value::Object(op)
}
