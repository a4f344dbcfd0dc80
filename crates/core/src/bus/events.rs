use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, trace};

use super::event::{Error, Event};
use crate::fault::{AsAny, Fault, Kind};
use crate::handler::{exception_handler, ExceptionHandler, Handling, Matcher};

type EventHandlerFn = Arc<dyn Fn(&dyn Any) -> Result<(), Fault> + Send + Sync>;

/// Publish and subscribe to events.
#[derive(Clone, Default)]
pub struct Events {
    handlers: Arc<RwLock<HashMap<TypeId, Vec<EventHandlerFn>>>>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to events of type `E`.
    ///
    /// Handlers run in subscription order. Subtypes in the sense of wrapper
    /// events are not delivered to handlers of the wrapped type.
    pub fn subscribe<E, F>(&self, handler: F)
    where
        E: Event,
        F: Fn(&E) -> Result<(), Fault> + Send + Sync + 'static,
    {
        let erased: EventHandlerFn =
            Arc::new(move |event: &dyn Any| match event.downcast_ref::<E>() {
                Some(event) => handler(event),
                None => Ok(()),
            });

        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let registered = handlers.entry(TypeId::of::<E>()).or_default();
        registered.push(erased);
        debug!(event = type_name::<E>(), handlers = registered.len(), "subscribed event handler");
    }

    /// Publish an event to the handlers subscribed to its exact type.
    ///
    /// The first handler that fails stops delivery and its fault is returned.
    pub fn publish<E: Event>(&self, event: &E) -> Result<(), Fault> {
        self.publish_dyn(event)
    }

    pub fn publish_dyn(&self, event: &dyn Event) -> Result<(), Fault> {
        let any = AsAny::as_any(event);
        let handlers = self.handlers_for(Any::type_id(any));
        trace!(event = event.name(), handlers = handlers.len(), "publishing event");
        for handler in handlers {
            handler(any)?;
        }
        Ok(())
    }

    /// Raise an event: always fails with an [`Error`] carrying it.
    pub fn raise<E: Event, T>(&self, event: E) -> Result<T, Fault> {
        trace!(event = type_name::<E>(), "raising event");
        Err(Error::new(event).into())
    }

    /// Handler translating intercepted faults into an [`Error`] for `event`.
    ///
    /// An empty `when` intercepts every fault. The original fault is
    /// discarded; nothing is suppressed.
    pub fn reraise<E, I>(&self, event: E, when: I) -> ExceptionHandler
    where
        E: Event + Clone,
        I: IntoIterator<Item = Kind>,
    {
        let matcher = Matcher::from_kinds(when.into_iter().collect());
        ExceptionHandler::leaf(matcher, move |fault: Fault| {
            debug!(kind = %fault.kind(), event = type_name::<E>(), "translating fault into event");
            Err(Error::new(event.clone()).into())
        })
    }

    /// Handler publishing the events carried by [`Error`] faults.
    ///
    /// The `Error` keeps propagating after publication; compose a terminal or
    /// collecting handler after this one to stop it.
    pub fn errorhandler(&self) -> ExceptionHandler {
        let events = self.clone();
        exception_handler(move |error: &Error| {
            events.publish_dyn(error.event())?;
            Ok(Handling::Propagate)
        })
    }

    fn handlers_for(&self, event_type: TypeId) -> Vec<EventHandlerFn> {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers.get(&event_type).cloned().unwrap_or_default()
    }
}
