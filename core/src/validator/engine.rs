//! # Validation Engines
//!
//! One engine per request source. Each carries its own coercion policy and
//! its own copy of the shared entity definitions, so `$ref`s inside any
//! partition schema resolve locally.

use crate::config::SourceOptions;
use crate::endpoint::Partition;
use crate::error::{AppError, AppResult, ValidationIssue};
use crate::schema::{rewrite_refs, SchemaSynthesizer};
use crate::validator::coerce::prepare;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

/// A configured validator factory for one request source.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    partition: Partition,
    options: SourceOptions,
    definitions: Arc<Map<String, Value>>,
}

impl ValidationEngine {
    /// Creates an engine with no definitions loaded.
    pub fn new(partition: Partition, options: SourceOptions) -> Self {
        Self {
            partition,
            options,
            definitions: Arc::new(Map::new()),
        }
    }

    /// Source this engine validates.
    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// The engine's policy.
    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    /// Stable ids currently loaded.
    pub fn loaded_ids(&self) -> Vec<&str> {
        self.definitions.keys().map(String::as_str).collect()
    }

    /// Loads every synthesized fragment not yet present.
    pub fn load_definitions(&mut self, synth: &SchemaSynthesizer) {
        let has_missing = synth
            .definitions()
            .keys()
            .any(|id| !self.definitions.contains_key(id.as_str()));
        if !has_missing {
            return;
        }

        let known: Vec<String> = synth.definitions().keys().cloned().collect();
        let definitions = Arc::make_mut(&mut self.definitions);
        // Earlier entries were localized against an older id set; redo them all.
        definitions.clear();
        for (id, fragment) in synth.definitions() {
            let mut local = (**fragment).clone();
            if let Some(map) = local.as_object_mut() {
                map.shift_remove("$id");
            }
            localize_refs(&mut local, &known);
            definitions.insert(id.clone(), local);
        }
        tracing::debug!(
            partition = %self.partition,
            count = definitions.len(),
            "engine definitions loaded"
        );
    }

    /// Compiles a partition schema into a predicate.
    pub fn compile(&self, schema: &Value) -> AppResult<CompiledPredicate> {
        let known: Vec<String> = self.definitions.keys().cloned().collect();
        let mut local = schema.clone();
        localize_refs(&mut local, &known);

        // `$ref` siblings are ignored in draft 7, so the partition sits under `allOf`.
        let root = if self.definitions.is_empty() {
            local.clone()
        } else {
            json!({
                "definitions": Value::Object((*self.definitions).clone()),
                "allOf": [local.clone()],
            })
        };

        let validator = jsonschema::draft7::new(&root).map_err(|e| {
            AppError::Schema(format!(
                "Failed to compile {} schema: {}",
                self.partition, e
            ))
        })?;

        Ok(CompiledPredicate {
            partition: self.partition,
            options: self.options.clone(),
            schema: local,
            definitions: self.definitions.clone(),
            validator,
        })
    }
}

/// A compiled check for one partition.
pub struct CompiledPredicate {
    partition: Partition,
    options: SourceOptions,
    schema: Value,
    definitions: Arc<Map<String, Value>>,
    validator: jsonschema::Validator,
}

impl CompiledPredicate {
    /// Partition this predicate checks.
    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// The localized partition schema.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Prepares `value` in place and returns every violation, with paths
    /// prefixed by the partition name.
    pub fn check(&self, value: &mut Value) -> Vec<ValidationIssue> {
        prepare(value, &self.schema, &self.definitions, &self.options);

        let limit = if self.options.all_errors { usize::MAX } else { 1 };
        let prefix = format!("/{}", self.partition.name());
        self.validator
            .iter_errors(value)
            .take(limit)
            .map(|error| {
                let schema_path = error.schema_path.to_string();
                ValidationIssue {
                    path: format!("{}{}", prefix, error.instance_path),
                    keyword: keyword_of(&schema_path),
                    message: error.to_string(),
                    schema_path,
                }
            })
            .collect()
    }
}

// Manual Debug: the compiled validator carries no useful representation.
impl fmt::Debug for CompiledPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPredicate")
            .field("partition", &self.partition)
            .field("options", &self.options)
            .field("schema", &self.schema)
            .field("definitions", &self.definitions.len())
            .finish()
    }
}

/// Last segment of a schema path, i.e. the failing keyword.
fn keyword_of(schema_path: &str) -> String {
    schema_path
        .rsplit('/')
        .find(|segment| !segment.is_empty() && segment.parse::<usize>().is_err())
        .unwrap_or("schema")
        .to_string()
}

/// Points stable-id references at the local `definitions` map.
pub(crate) fn localize_refs(value: &mut Value, known: &[String]) {
    rewrite_refs(value, known, "#/definitions/");
}
