//! Resolvers: rebuild a handler's positional argument list from GraphQL
//! arguments and the request context, then await the handler.

use crate::error::{AppError, AppResult};
use crate::registry::ParamConfig;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Highest positional index a handler may declare.
pub const MAX_ARGUMENT_INDEX: usize = 255;

/// Request context handed to injected parameters.
pub type Context = Arc<dyn Any + Send + Sync>;

/// A positional handler argument.
#[derive(Clone)]
pub enum Argument {
    /// The request context.
    Context(Context),
    /// A GraphQL argument value.
    Value(Value),
    /// Nothing was supplied for this position.
    Missing,
}

impl Argument {
    /// The JSON value, if this is a supplied argument.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Argument::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The context downcast to `T`.
    pub fn context<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            Argument::Context(ctx) => ctx.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Context(_) => f.write_str("Context(..)"),
            Argument::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Argument::Missing => f.write_str("Missing"),
        }
    }
}

/// A type-erased async controller method.
pub type Handler = Arc<dyn Fn(Vec<Argument>) -> BoxFuture<'static, AppResult<Value>> + Send + Sync>;

/// Boxes an async closure into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Vec<Argument>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<Value>> + Send + 'static,
{
    Arc::new(move |args| f(args).boxed())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Context,
    Arg(String),
    Missing,
}

/// Binds one query or mutation to its handler.
#[derive(Clone)]
pub struct Resolver {
    route: String,
    slots: Vec<Slot>,
    handler: Handler,
}

impl Resolver {
    /// Builds the slot layout from the declared parameters.
    ///
    /// Parameters may be declared in any order; the handler always receives
    /// them by their declared index. Gaps are passed as [`Argument::Missing`].
    pub fn new(route: impl Into<String>, params: &[ParamConfig], handler: Handler) -> AppResult<Self> {
        let route = route.into();
        if let Some(param) = params.iter().find(|p| p.index > MAX_ARGUMENT_INDEX) {
            return Err(AppError::Registration(format!(
                "{} declares argument index {} above {}",
                route, param.index, MAX_ARGUMENT_INDEX
            )));
        }
        let len = params
            .iter()
            .filter_map(|p| p.index.checked_add(1))
            .max()
            .unwrap_or(0);
        let mut slots = vec![Slot::Missing; len];
        for param in params {
            let slot = &mut slots[param.index];
            if *slot != Slot::Missing {
                return Err(AppError::Registration(format!(
                    "{} declares argument index {} twice",
                    route, param.index
                )));
            }
            *slot = if param.is_injected() {
                Slot::Context
            } else {
                Slot::Arg(param.name.clone())
            };
        }
        Ok(Self {
            route,
            slots,
            handler,
        })
    }

    /// `Controller.method` this resolver calls.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Number of positional arguments passed to the handler.
    pub fn arity(&self) -> usize {
        self.slots.len()
    }

    /// Positional arguments for one invocation.
    pub fn arguments(&self, ctx: &Context, args: &Map<String, Value>) -> Vec<Argument> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Context => Argument::Context(ctx.clone()),
                Slot::Arg(name) => args
                    .get(name)
                    .cloned()
                    .map_or(Argument::Missing, Argument::Value),
                Slot::Missing => Argument::Missing,
            })
            .collect()
    }

    /// Calls the handler; its error becomes the field error.
    pub async fn resolve(&self, ctx: Context, args: &Map<String, Value>) -> AppResult<Value> {
        let arguments = self.arguments(&ctx, args);
        match (self.handler)(arguments).await {
            Ok(value) => Ok(value),
            Err(err @ AppError::Resolver(_)) => Err(err),
            Err(other) => {
                tracing::debug!(route = %self.route, error = %other, "resolver failed");
                Err(AppError::Resolver(format!("{}: {}", self.route, other)))
            }
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("route", &self.route)
            .field("slots", &self.slots)
            .finish()
    }
}
