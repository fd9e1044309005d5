//! # Route Descriptors
//!
//! Controller method metadata handed over by the HTTP layer: where each
//! parameter comes from, its declared type and its validation switches.

use crate::registry::entity::{FieldType, ValidationOptions};
use std::fmt;

/// The wire location (or injection point) of a handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSource {
    /// Path segment.
    Path,
    /// Query string.
    Query,
    /// Header.
    Header,
    /// Request body.
    Body,
    /// Handler-injected request context.
    Context,
    /// Raw request object.
    Request,
    /// Raw response object.
    Response,
    /// Named GraphQL argument.
    Argument,
}

impl ParamSource {
    /// Whether the value is read from the wire (and therefore validated).
    pub fn is_wire(&self) -> bool {
        matches!(
            self,
            ParamSource::Path | ParamSource::Query | ParamSource::Header | ParamSource::Body
        )
    }
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamSource::Path => "path",
            ParamSource::Query => "query",
            ParamSource::Header => "header",
            ParamSource::Body => "body",
            ParamSource::Context => "context",
            ParamSource::Request => "request",
            ParamSource::Response => "response",
            ParamSource::Argument => "argument",
        };
        f.write_str(s)
    }
}

/// Per-parameter options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamOptions {
    /// Whether the parameter must be present.
    pub required: bool,
    /// Validation switches.
    pub validation: ValidationOptions,
    /// Description used for documentation.
    pub description: Option<String>,
}

/// A declared handler parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamConfig {
    /// Position in the handler's argument list.
    pub index: usize,
    /// Where the value comes from.
    pub source: ParamSource,
    /// Wire name (ignored for injected sources).
    pub name: String,
    /// Declared type.
    pub ty: FieldType,
    /// Options.
    pub options: ParamOptions,
}

impl ParamConfig {
    /// Creates a parameter; the index is assigned when added to a route.
    pub fn new(source: ParamSource, name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        Self {
            index: 0,
            source,
            name: name.into(),
            ty: ty.into(),
            options: ParamOptions::default(),
        }
    }

    /// Path parameter.
    pub fn path(name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        Self::new(ParamSource::Path, name, ty)
    }

    /// Query parameter.
    pub fn query(name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        Self::new(ParamSource::Query, name, ty)
    }

    /// Header parameter.
    pub fn header(name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        Self::new(ParamSource::Header, name, ty)
    }

    /// Body parameter.
    pub fn body(name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        Self::new(ParamSource::Body, name, ty)
    }

    /// GraphQL argument.
    pub fn arg(name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        Self::new(ParamSource::Argument, name, ty)
    }

    /// Whether the value is injected by the framework instead of supplied
    /// by the caller.
    pub fn is_injected(&self) -> bool {
        matches!(
            self.source,
            ParamSource::Context | ParamSource::Request | ParamSource::Response
        )
    }

    /// Injected request context.
    pub fn context() -> Self {
        Self::new(
            ParamSource::Context,
            "context",
            FieldType::Raw(serde_json::Value::Bool(true)),
        )
    }

    /// Marks the parameter as required.
    pub fn required(mut self) -> Self {
        self.options.required = true;
        self
    }

    /// Disables validation for this parameter.
    pub fn disable_validation(mut self) -> Self {
        self.options.validation.disabled = true;
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.options.description = Some(description.into());
        self
    }

    /// Whether the parameter lands in its partition's `required` list.
    pub fn is_enforced_required(&self) -> bool {
        self.options.required && !self.options.validation.disabled
    }
}

/// A controller method bound to an HTTP route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDescriptor {
    /// Controller name.
    pub controller: String,
    /// Handler method name.
    pub method: String,
    /// HTTP verb, upper case.
    pub http_method: String,
    /// URL template (e.g. `/customers/{id}`).
    pub path: String,
    /// Parameters in declaration order.
    pub params: Vec<ParamConfig>,
    /// Short summary for documentation.
    pub summary: Option<String>,
    /// Documentation tags.
    pub tags: Vec<String>,
}

impl RouteDescriptor {
    /// Creates a route for `controller.method`.
    pub fn new(
        controller: impl Into<String>,
        method: impl Into<String>,
        http_method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            controller: controller.into(),
            method: method.into(),
            http_method: http_method.into().to_uppercase(),
            path: path.into(),
            params: Vec::new(),
            summary: None,
            tags: Vec::new(),
        }
    }

    /// Appends a parameter at the next positional index.
    pub fn param(mut self, mut param: ParamConfig) -> Self {
        param.index = self.params.len();
        self.params.push(param);
        self
    }

    /// Appends a parameter at an explicit positional index.
    pub fn param_at(mut self, index: usize, mut param: ParamConfig) -> Self {
        param.index = index;
        self.params.push(param);
        self
    }

    /// Sets the summary.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Adds a tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// `Controller.method`, used in logs and errors.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.controller, self.method)
    }
}
