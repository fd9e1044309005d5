//! # Error Handling
//!
//! Provides the unified `AppError` enum used across the workspace, and the
//! aggregated `ValidationError` raised by compiled route validators.

use derive_more::{Display, From};
use serde::Serialize;
use std::fmt;

/// The Global Error Enum.
///
/// We use `derive_more` for boilerplate.
/// Note: String errors default to `General`.
#[derive(Debug, Display, From)]
pub enum AppError {
    /// A type identity was looked up but never registered.
    #[from(ignore)]
    #[display("Not Found: {_0}")]
    NotFound(String),

    /// Invalid or conflicting declarations (bad title, duplicate stable id).
    #[from(ignore)]
    #[display("Registration Error: {_0}")]
    Registration(String),

    /// Schema synthesis or compilation failure.
    #[from(ignore)]
    #[display("Schema Error: {_0}")]
    Schema(String),

    /// One or more request validation failures, aggregated across sources.
    #[display("Validation Error: {_0}")]
    Validation(ValidationError),

    /// Failure raised by a GraphQL resolver's underlying handler.
    #[from(ignore)]
    #[display("Resolver Error: {_0}")]
    Resolver(String),

    /// A document-database hook vetoed the operation.
    #[from(ignore)]
    #[display("Hook Error: {_0}")]
    Hook(String),

    /// Configuration could not be loaded or parsed.
    #[from(ignore)]
    #[display("Config Error: {_0}")]
    Config(String),

    /// Wrapper for standard IO errors.
    #[display("IO Error: {_0}")]
    Io(std::io::Error),

    /// Generic errors.
    #[display("General Error: {_0}")]
    General(String),
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for AppError {}

/// Helper type alias for Result using AppError.
pub type AppResult<T> = Result<T, AppError>;

/// A single field-level violation.
///
/// `path` is a JSON pointer rooted at the request data bundle, so a query
/// parameter `name` reads `/querystring/name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Instance location, prefixed with the partition name.
    pub path: String,
    /// The failing JSON Schema keyword (`type`, `required`, ...).
    pub keyword: String,
    /// Human readable message.
    pub message: String,
    /// Location of the failing keyword inside the partition schema.
    pub schema_path: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.message)
    }
}

/// Aggregated validation failure for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Every violation, ordered by partition then by engine report order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Creates an aggregated error from collected issues.
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    /// HTTP status the transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        400
    }

    /// Paths of all issues, in order.
    pub fn paths(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.path.as_str()).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} issue(s): {}", self.issues.len(), joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_io_conversion() {
        let io_err = Error::new(ErrorKind::Other, "test");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_string_conversion() {
        let msg = String::from("something wrong");
        let app_err: AppError = msg.into();
        match app_err {
            AppError::General(s) => assert_eq!(s, "something wrong"),
            _ => panic!("String should convert to AppError::General"),
        }
    }

    #[test]
    fn test_validation_display() {
        let err = ValidationError::new(vec![
            ValidationIssue {
                path: "/querystring/limit".into(),
                keyword: "type".into(),
                message: "\"abc\" is not of type \"integer\"".into(),
                schema_path: "/properties/limit/type".into(),
            },
            ValidationIssue {
                path: "/body".into(),
                keyword: "required".into(),
                message: "must have required property 'body'".into(),
                schema_path: "/required".into(),
            },
        ]);
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.paths(), vec!["/querystring/limit", "/body"]);
        let app_err: AppError = err.into();
        assert!(format!("{}", app_err).starts_with("Validation Error: 2 issue(s)"));
    }

    #[test]
    fn test_not_found_manual_creation() {
        let app_err = AppError::NotFound("Customer".into());
        assert_eq!(format!("{}", app_err), "Not Found: Customer");
    }
}
