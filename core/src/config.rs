//! # Configuration
//!
//! Validation policy per request source and generator settings.
//! Everything has a default, so an empty document yields a working setup.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// How leniently scalar values are coerced before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionMode {
    /// Values are validated exactly as received.
    #[default]
    None,
    /// Text is converted to the declared scalar type when it parses.
    Scalar,
    /// Like `Scalar`, and single values are wrapped when an array is expected.
    Array,
}

/// Which undeclared object properties are removed before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveAdditional {
    /// Keep everything.
    None,
    /// Remove only where the schema says `additionalProperties: false`.
    Declared,
    /// Remove every property not listed under `properties`.
    #[default]
    All,
}

/// Engine options for a single request source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    /// Scalar coercion mode.
    pub coerce_types: CoercionMode,
    /// Additional property removal mode.
    pub remove_additional: RemoveAdditional,
    /// Insert declared `default` values for missing properties.
    pub use_defaults: bool,
    /// Report every violation instead of the first one.
    pub all_errors: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            coerce_types: CoercionMode::None,
            remove_additional: RemoveAdditional::All,
            use_defaults: true,
            all_errors: true,
        }
    }
}

impl SourceOptions {
    /// Defaults for text-carrying sources (path, query string, headers).
    pub fn text() -> Self {
        Self {
            coerce_types: CoercionMode::Array,
            ..Self::default()
        }
    }
}

/// Per-source validation policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Path parameters.
    pub params: SourceOptions,
    /// Query string.
    pub querystring: SourceOptions,
    /// Headers.
    pub headers: SourceOptions,
    /// Request body.
    pub body: SourceOptions,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            params: SourceOptions::text(),
            querystring: SourceOptions::text(),
            headers: SourceOptions::text(),
            body: SourceOptions::default(),
        }
    }
}

/// GraphQL synthesis settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphqlConfig {
    /// Suffix appended to an entity's type name for its input object type.
    pub input_suffix: String,
}

impl Default for GraphqlConfig {
    fn default() -> Self {
        Self {
            input_suffix: "Input".to_string(),
        }
    }
}

/// OpenAPI document settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenApiConfig {
    /// `info.title`.
    pub title: String,
    /// `info.version`.
    pub version: String,
    /// `info.description`.
    pub description: Option<String>,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            title: "API".to_string(),
            version: "1.0.0".to_string(),
            description: None,
        }
    }
}

/// Root configuration object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Request validation policy.
    pub validation: ValidatorConfig,
    /// GraphQL settings.
    pub graphql: GraphqlConfig,
    /// OpenAPI settings.
    pub openapi: OpenApiConfig,
}

impl FrameworkConfig {
    /// Parses a YAML document.
    pub fn from_yaml_str(yaml: &str) -> AppResult<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| AppError::Config(format!("Failed to parse config YAML: {}", e)))
    }

    /// Converts an already parsed JSON value.
    pub fn from_json_value(value: serde_json::Value) -> AppResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| AppError::Config(format!("Failed to parse config JSON: {}", e)))
    }

    /// Loads a `.yaml`, `.yml` or `.json` file.
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("yaml");
        match ext {
            "json" => {
                let value: serde_json::Value = serde_json::from_str(&content)
                    .map_err(|e| AppError::Config(format!("Invalid JSON in {:?}: {}", path, e)))?;
                Self::from_json_value(value)
            }
            "yaml" | "yml" => Self::from_yaml_str(&content),
            other => Err(AppError::Config(format!(
                "Unsupported config extension '{}' for {:?}",
                other, path
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let cfg = FrameworkConfig::default();
        assert_eq!(cfg.validation.querystring.coerce_types, CoercionMode::Array);
        assert_eq!(cfg.validation.body.coerce_types, CoercionMode::None);
        assert_eq!(cfg.validation.body.remove_additional, RemoveAdditional::All);
        assert!(cfg.validation.headers.use_defaults);
        assert!(cfg.validation.params.all_errors);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let cfg = FrameworkConfig::from_yaml_str("{}").unwrap();
        assert_eq!(cfg, FrameworkConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let yaml = r#"
validation:
  body:
    coerce_types: scalar
    remove_additional: declared
openapi:
  title: Shop
"#;
        let cfg = FrameworkConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.validation.body.coerce_types, CoercionMode::Scalar);
        assert_eq!(
            cfg.validation.body.remove_additional,
            RemoveAdditional::Declared
        );
        assert!(cfg.validation.body.use_defaults);
        assert_eq!(cfg.openapi.title, "Shop");
        assert_eq!(cfg.openapi.version, "1.0.0");
    }

    #[test]
    fn test_from_json_value() {
        let cfg = FrameworkConfig::from_json_value(json!({
            "graphql": { "input_suffix": "Args" }
        }))
        .unwrap();
        assert_eq!(cfg.graphql.input_suffix, "Args");
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decoro.yml");
        fs::write(&path, "validation:\n  querystring:\n    all_errors: false\n").unwrap();
        let cfg = FrameworkConfig::from_path(&path).unwrap();
        assert!(!cfg.validation.querystring.all_errors);

        let bad = dir.path().join("decoro.toml");
        fs::write(&bad, "").unwrap();
        assert!(matches!(
            FrameworkConfig::from_path(&bad),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_yaml() {
        let res = FrameworkConfig::from_yaml_str("validation: [1, 2");
        assert!(matches!(res, Err(AppError::Config(_))));
    }
}
