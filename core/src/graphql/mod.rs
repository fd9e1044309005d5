//! # GraphQL Synthesizer
//!
//! Builds GraphQL object and input types from entity declarations, and
//! query/mutation field configs whose resolvers call controller handlers.
//!
//! - **types**: type references, type definitions, field configs, SDL.
//! - **resolver**: positional argument reconstruction and handler calls.
//!
//! Types are cached by entity identity: one synthesizer never produces two
//! type objects for the same entity.

pub mod resolver;
pub mod types;

use crate::config::GraphqlConfig;
use crate::error::{AppError, AppResult};
use crate::registry::{EntityId, EntityRegistry, FieldDefinition, FieldType, ParamConfig};
use heck::ToLowerCamelCase;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub use resolver::{handler, Argument, Context, Handler, Resolver};
pub use types::{
    validate_name, ArgumentConfig, FieldConfig, TypeDefinition, TypeField, TypeKind, TypeRef,
    JSON_SCALAR,
};

/// Root type an operation is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// `Query`
    Query,
    /// `Mutation`
    Mutation,
}

/// A controller method exposed as a query or mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    /// Field name on the root type.
    pub name: String,
    /// Controller name.
    pub controller: String,
    /// Handler method name.
    pub method: String,
    /// Declared return type.
    pub returns: FieldType,
    /// Whether the field may resolve to `null`.
    pub nullable: bool,
    /// Description.
    pub description: Option<String>,
    /// Parameters in declaration order.
    pub params: Vec<ParamConfig>,
}

impl OperationDescriptor {
    /// Creates an operation named after the method, in lowerCamelCase.
    pub fn new(
        controller: impl Into<String>,
        method: impl Into<String>,
        returns: impl Into<FieldType>,
    ) -> Self {
        let method = method.into();
        Self {
            name: method.to_lower_camel_case(),
            controller: controller.into(),
            method,
            returns: returns.into(),
            nullable: false,
            description: None,
            params: Vec::new(),
        }
    }

    /// Overrides the field name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Allows a `null` result.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
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

    /// `Controller.method`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.controller, self.method)
    }
}

/// Everything a GraphQL execution engine needs.
#[derive(Debug, Clone, Default)]
pub struct GraphqlSchemaMap {
    /// Query fields by name.
    pub queries: IndexMap<String, FieldConfig>,
    /// Mutation fields by name.
    pub mutations: IndexMap<String, FieldConfig>,
    /// Object types by entity.
    pub schemas: IndexMap<EntityId, Arc<TypeDefinition>>,
    /// Input object types by entity.
    pub inputs: IndexMap<EntityId, Arc<TypeDefinition>>,
}

impl GraphqlSchemaMap {
    /// Folds `other` into `self`.
    ///
    /// Types already present are kept; a query or mutation name defined on
    /// both sides is a registration error, and then nothing is merged.
    pub fn merge(&mut self, other: GraphqlSchemaMap) -> AppResult<()> {
        check_collisions(&self.queries, &other.queries, "query")?;
        check_collisions(&self.mutations, &other.mutations, "mutation")?;
        for (id, ty) in other.schemas {
            self.schemas.entry(id).or_insert(ty);
        }
        for (id, ty) in other.inputs {
            self.inputs.entry(id).or_insert(ty);
        }
        self.queries.extend(other.queries);
        self.mutations.extend(other.mutations);
        Ok(())
    }

    /// Renders the whole map as SDL.
    pub fn to_sdl(&self) -> String {
        let mut blocks = Vec::new();
        if self.uses_json_scalar() {
            blocks.push(format!("scalar {}", JSON_SCALAR));
        }
        blocks.extend(self.schemas.values().map(|t| t.to_sdl()));
        blocks.extend(self.inputs.values().map(|t| t.to_sdl()));
        for (root, fields) in [("Query", &self.queries), ("Mutation", &self.mutations)] {
            if fields.is_empty() {
                continue;
            }
            let lines: Vec<String> = fields
                .iter()
                .map(|(name, field)| format!("  {}", field.to_sdl(name)))
                .collect();
            blocks.push(format!("type {} {{\n{}\n}}", root, lines.join("\n")));
        }
        let mut sdl = blocks.join("\n\n");
        sdl.push('\n');
        sdl
    }

    fn uses_json_scalar(&self) -> bool {
        let in_types = self
            .schemas
            .values()
            .chain(self.inputs.values())
            .flat_map(|t| t.fields.values())
            .any(|f| f.ty.base_name() == JSON_SCALAR);
        let in_fields = self
            .queries
            .values()
            .chain(self.mutations.values())
            .any(|f| {
                f.ty.base_name() == JSON_SCALAR
                    || f.args.values().any(|a| a.ty.base_name() == JSON_SCALAR)
            });
        in_types || in_fields
    }
}

fn check_collisions(
    target: &IndexMap<String, FieldConfig>,
    source: &IndexMap<String, FieldConfig>,
    kind: &str,
) -> AppResult<()> {
    match source.keys().find(|name| target.contains_key(name.as_str())) {
        Some(name) => Err(AppError::Registration(format!(
            "GraphQL {} '{}' is defined twice",
            kind, name
        ))),
        None => Ok(()),
    }
}

/// Incremental GraphQL synthesis over one registry.
#[derive(Debug, Default)]
pub struct GraphqlSynthesizer {
    config: GraphqlConfig,
    map: GraphqlSchemaMap,
    owners: HashMap<String, EntityId>,
    in_progress: HashSet<(EntityId, bool)>,
}

impl GraphqlSynthesizer {
    /// Creates an empty synthesizer.
    pub fn new(config: GraphqlConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The map built so far.
    pub fn map(&self) -> &GraphqlSchemaMap {
        &self.map
    }

    /// Consumes the synthesizer, returning its map.
    pub fn into_map(self) -> GraphqlSchemaMap {
        self.map
    }

    /// Object type of an entity, built on first request.
    pub fn object_type(
        &mut self,
        registry: &EntityRegistry,
        id: EntityId,
    ) -> AppResult<Arc<TypeDefinition>> {
        self.entity_type(registry, id, TypeKind::Object)
    }

    /// Input object type of an entity, built on first request.
    pub fn input_type(
        &mut self,
        registry: &EntityRegistry,
        id: EntityId,
    ) -> AppResult<Arc<TypeDefinition>> {
        self.entity_type(registry, id, TypeKind::InputObject)
    }

    /// Adds a query field.
    pub fn query(
        &mut self,
        registry: &EntityRegistry,
        op: &OperationDescriptor,
        handler: Handler,
    ) -> AppResult<()> {
        self.add_operation(registry, OperationKind::Query, op, handler)
    }

    /// Adds a mutation field.
    pub fn mutation(
        &mut self,
        registry: &EntityRegistry,
        op: &OperationDescriptor,
        handler: Handler,
    ) -> AppResult<()> {
        self.add_operation(registry, OperationKind::Mutation, op, handler)
    }

    /// Adds a query or mutation field bound to `handler`.
    ///
    /// Injected parameters (context, request, response) are hidden from the
    /// argument list; the rest become named arguments, non-null if required.
    pub fn add_operation(
        &mut self,
        registry: &EntityRegistry,
        kind: OperationKind,
        op: &OperationDescriptor,
        handler: Handler,
    ) -> AppResult<()> {
        validate_name(&op.name)?;
        let mut ty = self.type_ref(registry, &op.returns, TypeKind::Object)?;
        if !op.nullable {
            ty = ty.non_null();
        }

        let mut args = IndexMap::new();
        for param in op.params.iter().filter(|p| !p.is_injected()) {
            validate_name(&param.name)?;
            let mut arg_ty = self.type_ref(registry, &param.ty, TypeKind::InputObject)?;
            if param.options.required {
                arg_ty = arg_ty.non_null();
            }
            let config = ArgumentConfig {
                ty: arg_ty,
                description: param.options.description.clone(),
            };
            if args.insert(param.name.clone(), config).is_some() {
                return Err(AppError::Registration(format!(
                    "{} declares argument '{}' twice",
                    op.qualified_name(),
                    param.name
                )));
            }
        }

        let resolve = Arc::new(Resolver::new(op.qualified_name(), &op.params, handler)?);
        let field = FieldConfig {
            ty,
            args,
            description: op.description.clone(),
            resolve,
        };
        let (target, label) = match kind {
            OperationKind::Query => (&mut self.map.queries, "query"),
            OperationKind::Mutation => (&mut self.map.mutations, "mutation"),
        };
        if target.contains_key(&op.name) {
            return Err(AppError::Registration(format!(
                "GraphQL {} '{}' is defined twice",
                label, op.name
            )));
        }
        target.insert(op.name.clone(), field);

        tracing::debug!(
            operation = %op.name,
            route = %op.qualified_name(),
            kind = label,
            "resolver built"
        );
        Ok(())
    }

    fn entity_type(
        &mut self,
        registry: &EntityRegistry,
        id: EntityId,
        kind: TypeKind,
    ) -> AppResult<Arc<TypeDefinition>> {
        let cached = match kind {
            TypeKind::Object => self.map.schemas.get(&id),
            TypeKind::InputObject => self.map.inputs.get(&id),
        };
        if let Some(ty) = cached {
            return Ok(ty.clone());
        }

        let def = registry.get(id)?;
        let name = self.type_name(registry, id, kind)?;
        if let Some(owner) = self.owners.get(&name) {
            if *owner != id {
                return Err(AppError::Registration(format!(
                    "GraphQL type '{}' is claimed by both {} and {}",
                    name, owner, id
                )));
            }
        }

        let key = (id, kind == TypeKind::InputObject);
        self.in_progress.insert(key);
        let fields = self.build_fields(registry, &def.fields, kind);
        self.in_progress.remove(&key);

        let ty = Arc::new(TypeDefinition {
            name: name.clone(),
            kind,
            description: def.description.clone(),
            fields: fields?,
        });
        self.owners.insert(name.clone(), id);
        match kind {
            TypeKind::Object => self.map.schemas.insert(id, ty.clone()),
            TypeKind::InputObject => self.map.inputs.insert(id, ty.clone()),
        };
        tracing::debug!(entity = %id, name = %name, kind = ?kind, "graphql type registered");
        Ok(ty)
    }

    fn build_fields(
        &mut self,
        registry: &EntityRegistry,
        fields: &[FieldDefinition],
        kind: TypeKind,
    ) -> AppResult<IndexMap<String, TypeField>> {
        let mut out = IndexMap::new();
        for field in fields.iter().filter(|f| !f.graphql.exclude) {
            let name = field.graphql.name.clone().unwrap_or_else(|| field.name.clone());
            validate_name(&name)?;

            let mut ty = self.type_ref(registry, &field.ty, kind)?;
            if let Some(override_name) = &field.graphql.type_name {
                validate_name(override_name)?;
                ty = rename_base(ty, override_name);
            }
            let nullable = field
                .graphql
                .nullable
                .unwrap_or(!field.required || field.nullable);
            if !nullable {
                ty = ty.non_null();
            }

            let description = field
                .graphql
                .description
                .clone()
                .or_else(|| field.description.clone());
            out.insert(name, TypeField { ty, description });
        }
        Ok(out)
    }

    fn type_ref(
        &mut self,
        registry: &EntityRegistry,
        ty: &FieldType,
        kind: TypeKind,
    ) -> AppResult<TypeRef> {
        match ty {
            FieldType::Scalar(scalar) => Ok(TypeRef::named(scalar.graphql_name())),
            FieldType::Raw(_) => Ok(TypeRef::named(JSON_SCALAR)),
            FieldType::Entity(id) => {
                // Self or mutual references only need the name.
                if self.in_progress.contains(&(*id, kind == TypeKind::InputObject)) {
                    return Ok(TypeRef::named(self.type_name(registry, *id, kind)?));
                }
                let built = self.entity_type(registry, *id, kind)?;
                Ok(TypeRef::named(built.name.clone()))
            }
            FieldType::Array(inner) => Ok(self.type_ref(registry, inner, kind)?.non_null().list()),
        }
    }

    fn type_name(&self, registry: &EntityRegistry, id: EntityId, kind: TypeKind) -> AppResult<String> {
        let base = registry.get(id)?.graphql_name();
        let name = match kind {
            TypeKind::Object => base,
            TypeKind::InputObject => format!("{}{}", base, self.config.input_suffix),
        };
        validate_name(&name)?;
        Ok(name)
    }
}

fn rename_base(ty: TypeRef, name: &str) -> TypeRef {
    match ty {
        TypeRef::Named(_) => TypeRef::named(name),
        TypeRef::NonNull(inner) => TypeRef::NonNull(Box::new(rename_base(*inner, name))),
        TypeRef::List(inner) => TypeRef::List(Box::new(rename_base(*inner, name))),
    }
}
