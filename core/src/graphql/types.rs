//! GraphQL type model: type references, object and input object types,
//! field configs, and their SDL rendering.

use crate::error::{AppError, AppResult};
use crate::graphql::resolver::Resolver;
use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A GraphQL name: `^[_A-Za-z][_0-9A-Za-z]*$`.
const NAME_PATTERN: &str = r"^[_A-Za-z][_0-9A-Za-z]*$";

/// Custom scalar standing in for untyped (raw JSON Schema) fields.
pub const JSON_SCALAR: &str = "JSON";

/// Checks a type, field or argument name.
pub fn validate_name(name: &str) -> AppResult<()> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(NAME_PATTERN).expect("Invalid regex"));
    if re.is_match(name) {
        Ok(())
    } else {
        Err(AppError::Registration(format!(
            "'{}' is not a valid GraphQL name",
            name
        )))
    }
}

/// A reference to a GraphQL type, with wrappers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A named type.
    Named(String),
    /// `T!`
    NonNull(Box<TypeRef>),
    /// `[T]`
    List(Box<TypeRef>),
}

impl TypeRef {
    /// Named type.
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    /// Wraps in `NonNull`, unless already non-null.
    pub fn non_null(self) -> Self {
        match self {
            TypeRef::NonNull(_) => self,
            other => TypeRef::NonNull(Box::new(other)),
        }
    }

    /// Wraps in `List`.
    pub fn list(self) -> Self {
        TypeRef::List(Box::new(self))
    }

    /// Whether the outermost wrapper is `NonNull`.
    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }

    /// The innermost named type.
    pub fn base_name(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::NonNull(inner) | TypeRef::List(inner) => inner.base_name(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
        }
    }
}

/// Whether a type is an output object or an input object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// `type`
    Object,
    /// `input`
    InputObject,
}

/// A field of an object or input object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeField {
    /// Field type.
    pub ty: TypeRef,
    /// Description.
    pub description: Option<String>,
}

/// An object or input object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    /// Type name.
    pub name: String,
    /// Object or input.
    pub kind: TypeKind,
    /// Description.
    pub description: Option<String>,
    /// Fields in declaration order.
    pub fields: IndexMap<String, TypeField>,
}

impl TypeDefinition {
    /// SDL for this type.
    pub fn to_sdl(&self) -> String {
        let keyword = match self.kind {
            TypeKind::Object => "type",
            TypeKind::InputObject => "input",
        };
        let mut out = String::new();
        write_description(&mut out, self.description.as_deref(), "");
        out.push_str(&format!("{} {} {{\n", keyword, self.name));
        for (name, field) in &self.fields {
            write_description(&mut out, field.description.as_deref(), "  ");
            out.push_str(&format!("  {}: {}\n", name, field.ty));
        }
        out.push('}');
        out
    }
}

/// A named argument of a query or mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentConfig {
    /// Argument type; `NonNull` when required.
    pub ty: TypeRef,
    /// Description.
    pub description: Option<String>,
}

/// A query or mutation field, ready for an execution engine.
#[derive(Clone)]
pub struct FieldConfig {
    /// Return type.
    pub ty: TypeRef,
    /// Exposed arguments in declaration order.
    pub args: IndexMap<String, ArgumentConfig>,
    /// Description.
    pub description: Option<String>,
    /// Resolver bound to the handler.
    pub resolve: Arc<Resolver>,
}

impl FieldConfig {
    /// SDL field line, without indentation.
    pub fn to_sdl(&self, name: &str) -> String {
        if self.args.is_empty() {
            return format!("{}: {}", name, self.ty);
        }
        let args: Vec<String> = self
            .args
            .iter()
            .map(|(arg, config)| format!("{}: {}", arg, config.ty))
            .collect();
        format!("{}({}): {}", name, args.join(", "), self.ty)
    }
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("ty", &self.ty)
            .field("args", &self.args)
            .field("description", &self.description)
            .field("resolve", &self.resolve.route())
            .finish()
    }
}

fn write_description(out: &mut String, description: Option<&str>, indent: &str) {
    if let Some(desc) = description {
        out.push_str(&format!("{}\"\"\"{}\"\"\"\n", indent, desc.replace("\"\"\"", "\\\"\"\"")));
    }
}
