//! Event bus.
//!
//! Business logic announces conditions on the bus without knowing how they
//! are rendered. [`Events`] are discrete; [`Context`]s have a duration, and
//! their handlers return a [`Scope`](crate::scope::Scope) that is open while
//! the context is.
//!
//! Events can also be raised: [`Events::raise`] fails with an [`Error`]
//! carrying the event, and the handler returned by [`Events::errorhandler`]
//! publishes it once the fault reaches it.

pub mod contexts;
pub mod event;
pub mod events;

pub use contexts::{Contexts, Published};
pub use event::{Context, Error, Event};
pub use events::Events;

/// Event bus with an event channel and a context channel.
///
/// Clones share their registries.
#[derive(Clone, Default)]
pub struct Bus {
    events: Events,
    contexts: Contexts,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &Events {
        &self.events
    }

    pub fn contexts(&self) -> &Contexts {
        &self.contexts
    }
}
