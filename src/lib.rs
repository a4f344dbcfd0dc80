//! retrobus - decouple a command-line application's core logic from how its
//! failures and progress are presented.
//!
//! The algebra and the bus live in [`retrobus_core`] and are re-exported
//! here. This crate adds ready-made guards for the outermost layer of an
//! application and an [`ErrorPolicy`] that assembles them from configuration.
//!
//! ```
//! use retrobus::bus::Bus;
//! use retrobus::guards::{self, Exit};
//! use retrobus::Event;
//!
//! #[derive(Debug, Clone)]
//! struct NotFound;
//!
//! impl Event for NotFound {}
//!
//! let bus = Bus::new();
//! let main = bus.events().errorhandler().then(&guards::exithandler());
//! let fault = main
//!     .run(|| bus.events().raise::<_, ()>(NotFound))
//!     .unwrap_err();
//! assert_eq!(Exit::code_of(&fault), Some(1));
//! ```

pub mod guards;
pub mod policy;

pub use retrobus_core::{bus, error, fault, handler, scope};
pub use retrobus_core::{
    exception_handler, nullhandler, within, Activation, AsAny, Bus, Context, Contexts, CoreError,
    Event, Events, Exception, ExceptionHandler, Fault, Handling, Kind, Scope, ScopeStack,
};

pub use guards::{collect, exit_on, exithandler, Collected, Exit};
pub use policy::{ErrorPolicy, PolicyHandlers};
