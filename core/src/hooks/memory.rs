//! In-memory driver: keeps per-operation handler lists and runs an
//! operation between its pre and post hooks.

use crate::error::{AppError, AppResult};
use crate::hooks::{DocumentSchema, HookEvent, HookHandler, HookPhase, Operation, Stage};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Per-call options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Run the operation without any hooks.
    pub skip_hooks: bool,
}

impl Invocation {
    /// Options that bypass every hook.
    pub fn skip_hooks() -> Self {
        Self { skip_hooks: true }
    }
}

/// A named schema with registered hooks.
#[derive(Default)]
pub struct MemorySchema {
    name: String,
    pre: HashMap<Operation, Vec<Arc<dyn HookHandler>>>,
    post: HashMap<Operation, Vec<Arc<dyn HookHandler>>>,
}

impl MemorySchema {
    /// Creates a schema with no hooks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handlers registered for an operation at a stage.
    pub fn handler_count(&self, operation: Operation, stage: Stage) -> usize {
        let table = match stage {
            Stage::Pre => &self.pre,
            Stage::Post => &self.post,
        };
        table.get(&operation).map_or(0, Vec::len)
    }

    /// Runs the hooks of one stage over `payload`.
    pub async fn run_hooks(
        &self,
        operation: Operation,
        stage: Stage,
        payload: &mut Value,
        invocation: Invocation,
    ) -> AppResult<()> {
        let table = match stage {
            Stage::Pre => &self.pre,
            Stage::Post => &self.post,
        };
        let Some(handlers) = table.get(&operation) else {
            return Ok(());
        };
        let phase = HookPhase::new(operation.category(), stage);
        if invocation.skip_hooks {
            tracing::debug!(
                schema = %self.name,
                operation = %operation,
                phase = %phase,
                "hooks skipped"
            );
            return Ok(());
        }

        for handler in handlers {
            let event = HookEvent {
                phase,
                operation,
                binding: operation.binding(stage),
                payload: &mut *payload,
            };
            handler.handle(event).await.map_err(|e| match e {
                AppError::Hook(_) => e,
                other => AppError::Hook(format!(
                    "{} {} on {} aborted: {}",
                    phase, operation, self.name, other
                )),
            })?;
        }
        Ok(())
    }

    /// Runs `run` between the operation's pre and post hooks.
    ///
    /// Pre hooks receive `input` and may rewrite it before `run` sees it;
    /// post hooks receive the result and may rewrite it before it is
    /// returned. A failing pre hook means `run` is never called.
    pub async fn execute<F, Fut>(
        &self,
        operation: Operation,
        mut input: Value,
        invocation: Invocation,
        run: F,
    ) -> AppResult<Value>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = AppResult<Value>>,
    {
        self.run_hooks(operation, Stage::Pre, &mut input, invocation)
            .await?;
        let mut output = run(input).await?;
        self.run_hooks(operation, Stage::Post, &mut output, invocation)
            .await?;
        Ok(output)
    }
}

impl DocumentSchema for MemorySchema {
    fn pre(&mut self, operation: Operation, handler: Arc<dyn HookHandler>) {
        self.pre.entry(operation).or_default().push(handler);
    }

    fn post(&mut self, operation: Operation, handler: Arc<dyn HookHandler>) {
        self.post.entry(operation).or_default().push(handler);
    }
}

impl fmt::Debug for MemorySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = |t: &HashMap<Operation, Vec<Arc<dyn HookHandler>>>| {
            t.values().map(Vec::len).sum::<usize>()
        };
        f.debug_struct("MemorySchema")
            .field("name", &self.name)
            .field("pre", &count(&self.pre))
            .field("post", &count(&self.post))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{after_read, after_write, before_delete, before_read, before_write, Binding};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl HookHandler for Recorder {
        async fn handle(&self, event: HookEvent<'_>) -> AppResult<()> {
            self.log.lock().unwrap().push(format!(
                "{}:{}:{}:{:?}",
                self.tag, event.phase, event.operation, event.binding
            ));
            Ok(())
        }
    }

    struct Tenant;

    #[async_trait]
    impl HookHandler for Tenant {
        async fn handle(&self, event: HookEvent<'_>) -> AppResult<()> {
            if let Some(filter) = event.payload.as_object_mut() {
                filter.insert("tenant".to_string(), json!("acme"));
            }
            Ok(())
        }
    }

    struct Deny;

    #[async_trait]
    impl HookHandler for Deny {
        async fn handle(&self, _event: HookEvent<'_>) -> AppResult<()> {
            Err(AppError::General("read-only".to_string()))
        }
    }

    fn recorder(tag: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn HookHandler> {
        Arc::new(Recorder {
            tag,
            log: log.clone(),
        })
    }

    #[tokio::test]
    async fn test_pre_hook_rewrites_query() {
        let mut schema = MemorySchema::new("customers");
        before_read(&mut schema, Arc::new(Tenant));

        let out = schema
            .execute(
                Operation::Find,
                json!({ "name": "Ada" }),
                Invocation::default(),
                |query| async move { Ok(json!([query])) },
            )
            .await
            .unwrap();
        assert_eq!(out, json!([{ "name": "Ada", "tenant": "acme" }]));
    }

    #[tokio::test]
    async fn test_handlers_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut schema = MemorySchema::new("customers");
        before_write(&mut schema, recorder("a", &log));
        before_write(&mut schema, recorder("b", &log));
        after_write(&mut schema, recorder("c", &log));
        after_read(&mut schema, recorder("never", &log));

        schema
            .execute(
                Operation::Save,
                json!({ "name": "Ada" }),
                Invocation::default(),
                |doc| async move { Ok(doc) },
            )
            .await
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:before_write:save:Document",
                "b:before_write:save:Document",
                "c:after_write:save:Document",
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_pre_hook_vetoes() {
        let ran = Arc::new(AtomicBool::new(false));
        let mut schema = MemorySchema::new("customers");
        before_delete(&mut schema, Arc::new(Deny));

        let flag = ran.clone();
        let err = schema
            .execute(
                Operation::DeleteMany,
                json!({}),
                Invocation::default(),
                |_| async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(json!({ "deletedCount": 3 }))
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Hook(_)));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_skip_hooks() {
        let mut schema = MemorySchema::new("customers");
        before_delete(&mut schema, Arc::new(Deny));
        let out = schema
            .execute(
                Operation::DeleteOne,
                json!({ "_id": 1 }),
                Invocation::skip_hooks(),
                |_| async { Ok(json!({ "deletedCount": 1 })) },
            )
            .await
            .unwrap();
        assert_eq!(out, json!({ "deletedCount": 1 }));
    }

    #[tokio::test]
    async fn test_post_hook_sees_result() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut schema = MemorySchema::new("customers");
        after_read(&mut schema, recorder("r", &log));
        assert_eq!(schema.handler_count(Operation::CountDocuments, Stage::Post), 1);
        assert_eq!(schema.handler_count(Operation::CountDocuments, Stage::Pre), 0);

        schema
            .execute(
                Operation::CountDocuments,
                json!({}),
                Invocation::default(),
                |_| async { Ok(json!(4)) },
            )
            .await
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![format!("r:after_read:countDocuments:{:?}", Binding::Result)]
        );
    }
}
