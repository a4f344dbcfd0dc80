use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, trace};

use super::event::Context;
use crate::fault::Fault;
use crate::scope::{self, Scope, ScopeStack};

type ContextHandlerFn = Arc<dyn Fn(&dyn Any) -> Option<Box<dyn Scope>> + Send + Sync>;

/// Publish and subscribe to contexts.
#[derive(Clone, Default)]
pub struct Contexts {
    handlers: Arc<RwLock<HashMap<TypeId, Vec<ContextHandlerFn>>>>,
}

impl Contexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to contexts of type `C`.
    ///
    /// The handler does not do the work itself; it returns a scope that is
    /// entered when the context is published and exited when it ends.
    pub fn subscribe<C, F, S>(&self, handler: F)
    where
        C: Context,
        F: Fn(&C) -> S + Send + Sync + 'static,
        S: Scope + 'static,
    {
        let erased: ContextHandlerFn = Arc::new(move |context: &dyn Any| {
            context
                .downcast_ref::<C>()
                .map(|context| Box::new(handler(context)) as Box<dyn Scope>)
        });

        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let registered = handlers.entry(TypeId::of::<C>()).or_default();
        registered.push(erased);
        debug!(
            context = type_name::<C>(),
            handlers = registered.len(),
            "subscribed context handler"
        );
    }

    /// Publish a context as a scope over the subscribed handlers' scopes.
    pub fn publish<C: Context>(&self, context: C) -> Published<C> {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<C>())
            .cloned()
            .unwrap_or_default();
        Published {
            context,
            handlers,
            stack: ScopeStack::new(),
        }
    }

    /// Run `body` while `context` is published.
    pub fn run<C, T, F>(&self, context: C, body: F) -> Result<Option<T>, Fault>
    where
        C: Context,
        F: FnOnce() -> Result<T, Fault>,
    {
        scope::within(self.publish(context), body)
    }
}

/// A published context: enters every handler's scope in subscription order
/// and exits them in reverse.
pub struct Published<C> {
    context: C,
    handlers: Vec<ContextHandlerFn>,
    stack: ScopeStack,
}

impl<C: Context> Published<C> {
    pub fn context(&self) -> &C {
        &self.context
    }
}

impl<C: Context> Scope for Published<C> {
    fn enter(&mut self) -> Result<(), Fault> {
        trace!(context = self.context.name(), handlers = self.handlers.len(), "entering context");
        let context: &dyn Any = &self.context;
        for handler in &self.handlers {
            if let Some(scope) = handler(context) {
                self.stack.push(scope)?;
            }
        }
        Ok(())
    }

    fn exit(mut self: Box<Self>, pending: Option<Fault>) -> Result<(), Fault> {
        trace!(context = self.context.name(), failed = pending.is_some(), "exiting context");
        self.stack.unwind(pending)
    }
}
