use std::fmt;

use thiserror::Error as ThisError;

use crate::fault::{AsAny, Exception};

/// A discrete occurrence that can be published on the bus.
///
/// Handlers are looked up by the exact type of the published value.
pub trait Event: AsAny + fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// An occurrence with a duration, published as a scope.
pub trait Context: AsAny + fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Exception carrying an event up the stack until an error handler
/// publishes it.
#[derive(Debug, ThisError)]
#[error("event raised: {event:?}")]
pub struct Error {
    event: Box<dyn Event>,
}

impl Error {
    pub fn new<E: Event>(event: E) -> Self {
        Self {
            event: Box::new(event),
        }
    }

    pub fn event(&self) -> &dyn Event {
        &*self.event
    }

    pub fn downcast_event<E: Event>(&self) -> Option<&E> {
        AsAny::as_any(self.event()).downcast_ref::<E>()
    }
}

impl Exception for Error {}
