//! # Validator Compiler
//!
//! Compiles an endpoint schema into a single validation entrypoint.
//!
//! - **engine**: one engine per request source, each with its own policy.
//! - **coerce**: in-place coercion, defaults and property stripping.
//!
//! Compilation happens once, at route registration; each request only runs
//! the compiled predicates.

mod coerce;
pub mod engine;

use crate::config::ValidatorConfig;
use crate::endpoint::{EndpointSchema, Partition};
use crate::error::{AppError, AppResult, ValidationError, ValidationIssue};
use crate::schema::SchemaSynthesizer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use engine::{CompiledPredicate, ValidationEngine};

/// Raw request values keyed by partition, as handed over by the HTTP layer.
///
/// Absent object partitions are validated as empty objects; an absent body is
/// only an error when the route requires one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestData {
    /// Path parameters.
    pub params: Option<Value>,
    /// Query string.
    pub querystring: Option<Value>,
    /// Headers.
    pub headers: Option<Value>,
    /// Body.
    pub body: Option<Value>,
}

impl RequestData {
    /// Empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the path parameters.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Sets the query string.
    pub fn with_querystring(mut self, querystring: Value) -> Self {
        self.querystring = Some(querystring);
        self
    }

    /// Sets the headers.
    pub fn with_headers(mut self, headers: Value) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The slot holding a partition.
    pub fn slot_mut(&mut self, partition: Partition) -> &mut Option<Value> {
        match partition {
            Partition::Params => &mut self.params,
            Partition::Querystring => &mut self.querystring,
            Partition::Headers => &mut self.headers,
            Partition::Body => &mut self.body,
        }
    }
}

/// The four per-source engines shared by every route of an application.
#[derive(Debug, Clone)]
pub struct EngineSet {
    engines: Vec<ValidationEngine>,
}

impl EngineSet {
    /// Creates one engine per source from the configuration.
    pub fn new(config: &ValidatorConfig) -> Self {
        let engines = Partition::ALL
            .into_iter()
            .map(|partition| {
                let options = match partition {
                    Partition::Params => config.params.clone(),
                    Partition::Querystring => config.querystring.clone(),
                    Partition::Headers => config.headers.clone(),
                    Partition::Body => config.body.clone(),
                };
                ValidationEngine::new(partition, options)
            })
            .collect();
        Self { engines }
    }

    /// Engine for a source.
    pub fn engine(&self, partition: Partition) -> Option<&ValidationEngine> {
        self.engines.iter().find(|e| e.partition() == partition)
    }

    /// Loads every fragment synthesized so far into all engines.
    pub fn load_definitions(&mut self, synth: &SchemaSynthesizer) {
        for engine in &mut self.engines {
            engine.load_definitions(synth);
        }
    }

    /// Compiles the validator of one route.
    pub fn compile(
        &mut self,
        endpoint: &EndpointSchema,
        synth: &SchemaSynthesizer,
    ) -> AppResult<RouteValidator> {
        self.load_definitions(synth);

        let mut predicates = Vec::new();
        for partition in endpoint.partitions() {
            let Some(schema) = endpoint.partition_schema(partition) else {
                continue;
            };
            let engine = self.engine(partition).ok_or_else(|| {
                AppError::General(format!("No validation engine for {}", partition))
            })?;
            predicates.push(engine.compile(&schema)?);
        }

        tracing::debug!(
            route = %endpoint.route,
            predicates = predicates.len(),
            "route validator compiled"
        );
        Ok(RouteValidator {
            route: endpoint.route.clone(),
            predicates,
            body_required: endpoint.body_required(),
        })
    }
}

/// Compiles a route validator with a fresh engine set.
pub fn compile_validator(
    endpoint: &EndpointSchema,
    synth: &SchemaSynthesizer,
    config: &ValidatorConfig,
) -> AppResult<RouteValidator> {
    EngineSet::new(config).compile(endpoint, synth)
}

/// The compiled validation entrypoint of one route.
#[derive(Debug)]
pub struct RouteValidator {
    route: String,
    predicates: Vec<CompiledPredicate>,
    body_required: bool,
}

impl RouteValidator {
    /// `Controller.method` of the route.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Partitions with a compiled predicate, in validation order.
    pub fn partitions(&self) -> Vec<Partition> {
        self.predicates.iter().map(CompiledPredicate::partition).collect()
    }

    /// Validates (and prepares in place) one request.
    ///
    /// Every partition is checked before failing, so the error lists all
    /// violations across sources.
    pub async fn validate(&self, data: &mut RequestData) -> AppResult<()> {
        let mut issues: Vec<ValidationIssue> = Vec::new();

        for predicate in &self.predicates {
            let partition = predicate.partition();
            let slot = data.slot_mut(partition);
            if slot.is_none() {
                if partition == Partition::Body {
                    if self.body_required {
                        issues.push(missing_body());
                    }
                    continue;
                }
                *slot = Some(Value::Object(Map::new()));
            }
            if let Some(value) = slot.as_mut() {
                issues.extend(predicate.check(value));
            }
        }

        tracing::trace!(route = %self.route, issues = issues.len(), "request validated");
        if issues.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(ValidationError::new(issues)))
        }
    }
}

fn missing_body() -> ValidationIssue {
    ValidationIssue {
        path: "/body".to_string(),
        keyword: "required".to_string(),
        message: "must have required property 'body'".to_string(),
        schema_path: "/required".to_string(),
    }
}
