//! Handlers for the outermost layer of an application.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

use retrobus_core::bus;
use retrobus_core::{exception_handler, Exception, ExceptionHandler, Fault};

/// Request to terminate the process with `code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("exit with status {code}")]
pub struct Exit {
    pub code: i32,
}

impl Exit {
    pub fn new(code: i32) -> Self {
        Self { code }
    }

    /// The exit status requested by `fault`, if it is an [`Exit`].
    pub fn code_of(fault: &Fault) -> Option<i32> {
        fault.downcast_ref::<Exit>().map(|exit| exit.code)
    }
}

impl Exception for Exit {}

/// Faults collected by [`collect`], shared with whoever reports on them.
pub type Collected = Arc<Mutex<Vec<Fault>>>;

/// Replace faults of kind `E` with an [`Exit`] carrying `code`.
pub fn exit_on<E: Exception>(code: i32) -> ExceptionHandler {
    exception_handler(move |error: &E| {
        warn!(%error, code, "terminating");
        Err(Exit::new(code).into())
    })
}

/// Replace bus errors with `Exit { code: 1 }`.
///
/// Compose it after [`bus::Events::errorhandler`] so the event is published
/// before the process is asked to exit.
pub fn exithandler() -> ExceptionHandler {
    exit_on::<bus::Error>(1)
}

/// Suppress bus errors, storing them in `errors`.
pub fn collect(errors: Collected) -> ExceptionHandler {
    ExceptionHandler::on::<bus::Error, _>(move |fault| {
        let mut errors = errors.lock().unwrap_or_else(PoisonError::into_inner);
        errors.push(fault);
        debug!(collected = errors.len(), "collected error");
        Ok(())
    })
}
