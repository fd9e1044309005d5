//! # Document-Database Hooks
//!
//! Normalizes a document driver's per-operation middleware into six phases:
//! before/after read, write and delete.
//!
//! - **table**: operation categories and hook payload bindings.
//! - **memory**: an in-memory driver implementing [`DocumentSchema`].
//!
//! Registering a handler for a phase hooks every operation of that phase's
//! category. Handlers are awaited in registration order; an error from any
//! handler aborts the operation.

pub mod memory;
pub mod table;

use crate::error::AppResult;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub use memory::{Invocation, MemorySchema};
pub use table::{operations_for, Binding, HookCategory, Operation, OperationSpec, Stage};

/// The six normalized hook phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    /// Before a read.
    BeforeRead,
    /// After a read.
    AfterRead,
    /// Before a write.
    BeforeWrite,
    /// After a write.
    AfterWrite,
    /// Before a delete.
    BeforeDelete,
    /// After a delete.
    AfterDelete,
}

impl HookPhase {
    /// Phase of a category at a stage.
    pub fn new(category: HookCategory, stage: Stage) -> Self {
        match (category, stage) {
            (HookCategory::Read, Stage::Pre) => HookPhase::BeforeRead,
            (HookCategory::Read, Stage::Post) => HookPhase::AfterRead,
            (HookCategory::Write, Stage::Pre) => HookPhase::BeforeWrite,
            (HookCategory::Write, Stage::Post) => HookPhase::AfterWrite,
            (HookCategory::Delete, Stage::Pre) => HookPhase::BeforeDelete,
            (HookCategory::Delete, Stage::Post) => HookPhase::AfterDelete,
        }
    }

    /// Category hooked by this phase.
    pub fn category(&self) -> HookCategory {
        match self {
            HookPhase::BeforeRead | HookPhase::AfterRead => HookCategory::Read,
            HookPhase::BeforeWrite | HookPhase::AfterWrite => HookCategory::Write,
            HookPhase::BeforeDelete | HookPhase::AfterDelete => HookCategory::Delete,
        }
    }

    /// Stage hooked by this phase.
    pub fn stage(&self) -> Stage {
        match self {
            HookPhase::BeforeRead | HookPhase::BeforeWrite | HookPhase::BeforeDelete => Stage::Pre,
            HookPhase::AfterRead | HookPhase::AfterWrite | HookPhase::AfterDelete => Stage::Post,
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HookPhase::BeforeRead => "before_read",
            HookPhase::AfterRead => "after_read",
            HookPhase::BeforeWrite => "before_write",
            HookPhase::AfterWrite => "after_write",
            HookPhase::BeforeDelete => "before_delete",
            HookPhase::AfterDelete => "after_delete",
        };
        f.write_str(s)
    }
}

/// What a handler sees for one operation.
#[derive(Debug)]
pub struct HookEvent<'a> {
    /// Phase being run.
    pub phase: HookPhase,
    /// Driver operation.
    pub operation: Operation,
    /// Kind of payload.
    pub binding: Binding,
    /// Query, document(s) or result; pre hooks may modify it in place.
    pub payload: &'a mut Value,
}

/// An async hook handler.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Runs the hook. An error vetoes the operation.
    async fn handle(&self, event: HookEvent<'_>) -> AppResult<()>;
}

/// Driver side of the adapter: per-operation pre/post registration.
pub trait DocumentSchema {
    /// Registers a handler run before `operation`.
    fn pre(&mut self, operation: Operation, handler: Arc<dyn HookHandler>);
    /// Registers a handler run after `operation`.
    fn post(&mut self, operation: Operation, handler: Arc<dyn HookHandler>);
}

/// Registers `handler` on every operation of the phase's category.
pub fn register<S>(schema: &mut S, phase: HookPhase, handler: Arc<dyn HookHandler>)
where
    S: DocumentSchema + ?Sized,
{
    let operations = operations_for(phase.category());
    for operation in &operations {
        match phase.stage() {
            Stage::Pre => schema.pre(*operation, handler.clone()),
            Stage::Post => schema.post(*operation, handler.clone()),
        }
    }
    tracing::debug!(phase = %phase, operations = operations.len(), "hook registered");
}

/// Hooks every read before it runs.
pub fn before_read<S: DocumentSchema + ?Sized>(schema: &mut S, handler: Arc<dyn HookHandler>) {
    register(schema, HookPhase::BeforeRead, handler)
}

/// Hooks every read after it completed.
pub fn after_read<S: DocumentSchema + ?Sized>(schema: &mut S, handler: Arc<dyn HookHandler>) {
    register(schema, HookPhase::AfterRead, handler)
}

/// Hooks every write before it runs.
pub fn before_write<S: DocumentSchema + ?Sized>(schema: &mut S, handler: Arc<dyn HookHandler>) {
    register(schema, HookPhase::BeforeWrite, handler)
}

/// Hooks every write after it completed.
pub fn after_write<S: DocumentSchema + ?Sized>(schema: &mut S, handler: Arc<dyn HookHandler>) {
    register(schema, HookPhase::AfterWrite, handler)
}

/// Hooks every delete before it runs.
pub fn before_delete<S: DocumentSchema + ?Sized>(schema: &mut S, handler: Arc<dyn HookHandler>) {
    register(schema, HookPhase::BeforeDelete, handler)
}

/// Hooks every delete after it completed.
pub fn after_delete<S: DocumentSchema + ?Sized>(schema: &mut S, handler: Arc<dyn HookHandler>) {
    register(schema, HookPhase::AfterDelete, handler)
}
