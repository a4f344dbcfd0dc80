//! retrobus core - exception handler algebra and typed event bus
//!
//! This crate contains the pieces that let an application's core logic
//! report failures and progress without knowing how they are presented:
//! composable exception handlers, a scope abstraction they are built on, and
//! an in-process bus for events and contexts. It performs no I/O.

pub mod bus;
pub mod error;
pub mod fault;
pub mod handler;
pub mod scope;

// Re-exports for ergonomics
pub use bus::{Bus, Context, Contexts, Event, Events};
pub use error::*;
pub use fault::{AsAny, Exception, Fault, Kind};
pub use handler::{exception_handler, nullhandler, Activation, ExceptionHandler, Handling};
pub use scope::{within, Scope, ScopeStack};
