#![deny(missing_docs)]

//! # Decoro Core
//!
//! Metadata-driven derivation of request validators, JSON Schemas, OpenAPI
//! documents, GraphQL types/resolvers and document-database hooks from
//! entity and route declarations.

/// Shared error types.
pub mod error;

/// Validation policy and generator settings.
pub mod config;

/// Entity and route declarations.
pub mod registry;

/// JSON Schema synthesis.
pub mod schema;

/// Per-route composite request schemas.
pub mod endpoint;

/// Compiled request validators.
pub mod validator;

/// GraphQL types and resolvers.
pub mod graphql;

/// Document-database hook adapter.
pub mod hooks;

/// OpenAPI document generation.
pub mod openapi;

pub use config::{
    CoercionMode, FrameworkConfig, GraphqlConfig, OpenApiConfig, RemoveAdditional, SourceOptions,
    ValidatorConfig,
};
pub use endpoint::{build_endpoint_schema, EndpointSchema, Partition};
pub use error::{AppError, AppResult, ValidationError, ValidationIssue};
pub use graphql::{
    handler, Argument, FieldConfig, GraphqlSchemaMap, GraphqlSynthesizer, OperationDescriptor,
    OperationKind, TypeRef,
};
pub use hooks::{
    after_delete, after_read, after_write, before_delete, before_read, before_write,
    DocumentSchema, HookEvent, HookHandler, HookPhase, Invocation, MemorySchema, Operation,
};
pub use openapi::{generate_openapi_document, parse_openapi_document};
pub use registry::{
    Entity, EntityDefinition, EntityId, EntityRegistry, FieldDefinition, FieldType, ParamConfig,
    ParamSource, RouteDescriptor, ScalarType,
};
pub use schema::SchemaSynthesizer;
pub use validator::{compile_validator, EngineSet, RequestData, RouteValidator};
