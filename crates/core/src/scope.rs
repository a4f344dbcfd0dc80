//! Two-phase scoped resources.
//!
//! A [`Scope`] is entered before a block of work runs and exited afterwards
//! with the fault the block produced, if any. Exit decides what keeps
//! propagating: `Ok(())` means nothing does (there was no fault, or it was
//! suppressed), `Err(fault)` means `fault` does, whether it is the original
//! or a replacement.

use tracing::trace;

use crate::error::CoreError;
use crate::fault::Fault;

pub trait Scope {
    fn enter(&mut self) -> Result<(), Fault> {
        Ok(())
    }

    fn exit(self: Box<Self>, pending: Option<Fault>) -> Result<(), Fault>;
}

impl<S: Scope + ?Sized> Scope for Box<S> {
    fn enter(&mut self) -> Result<(), Fault> {
        (**self).enter()
    }

    fn exit(self: Box<Self>, pending: Option<Fault>) -> Result<(), Fault> {
        S::exit(*self, pending)
    }
}

/// Scopes entered by one activation, exited in reverse order.
#[derive(Default)]
pub struct ScopeStack {
    entered: Vec<Box<dyn Scope>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entered.is_empty()
    }

    /// Enter `scope` and keep it for unwinding.
    ///
    /// If entry fails, everything entered so far is unwound with that fault.
    pub fn push(&mut self, mut scope: Box<dyn Scope>) -> Result<(), Fault> {
        if let Err(fault) = scope.enter() {
            trace!(entered = self.entered.len(), "scope entry failed, rolling back");
            self.unwind(Some(fault))?;
            return Err(CoreError::EntryAborted.into());
        }
        self.entered.push(scope);
        Ok(())
    }

    /// Exit every entered scope, innermost first, threading the pending fault.
    pub fn unwind(&mut self, mut pending: Option<Fault>) -> Result<(), Fault> {
        while let Some(scope) = self.entered.pop() {
            pending = scope.exit(pending).err();
        }
        match pending {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }
}

/// Run `body` inside `scope`.
///
/// Returns `Ok(None)` when the body failed and the scope suppressed the fault.
pub fn within<S, T, F>(mut scope: S, body: F) -> Result<Option<T>, Fault>
where
    S: Scope,
    F: FnOnce() -> Result<T, Fault>,
{
    scope.enter()?;
    let (value, pending) = match body() {
        Ok(value) => (Some(value), None),
        Err(fault) => (None, Some(fault)),
    };
    Box::new(scope).exit(pending)?;
    Ok(value)
}

/// A scope that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Noop;

impl Scope for Noop {
    fn exit(self: Box<Self>, pending: Option<Fault>) -> Result<(), Fault> {
        pending.map_or(Ok(()), Err)
    }
}

pub fn noop() -> Noop {
    Noop
}

/// Scope built from an entry and an exit callback.
pub struct FromFns<E, X> {
    enter: Option<E>,
    exit: X,
}

impl<E, X> Scope for FromFns<E, X>
where
    E: FnOnce() -> Result<(), Fault>,
    X: FnOnce(Option<Fault>) -> Result<(), Fault>,
{
    fn enter(&mut self) -> Result<(), Fault> {
        match self.enter.take() {
            Some(enter) => enter(),
            None => Ok(()),
        }
    }

    fn exit(self: Box<Self>, pending: Option<Fault>) -> Result<(), Fault> {
        (self.exit)(pending)
    }
}

pub fn from_fns<E, X>(enter: E, exit: X) -> FromFns<E, X>
where
    E: FnOnce() -> Result<(), Fault>,
    X: FnOnce(Option<Fault>) -> Result<(), Fault>,
{
    FromFns {
        enter: Some(enter),
        exit,
    }
}

/// Scope that only acts on exit.
pub fn on_exit<X>(exit: X) -> FromFns<fn() -> Result<(), Fault>, X>
where
    X: FnOnce(Option<Fault>) -> Result<(), Fault>,
{
    fn enter() -> Result<(), Fault> {
        Ok(())
    }
    from_fns(enter as fn() -> Result<(), Fault>, exit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    impl crate::fault::Exception for Boom {}

    fn recording(log: &Rc<RefCell<Vec<String>>>, name: &'static str) -> Box<dyn Scope> {
        let on_enter = Rc::clone(log);
        let on_exit = Rc::clone(log);
        Box::new(from_fns(
            move || {
                on_enter.borrow_mut().push(format!("enter {name}"));
                Ok(())
            },
            move |pending: Option<Fault>| {
                on_exit.borrow_mut().push(format!("exit {name}"));
                pending.map_or(Ok(()), Err)
            },
        ))
    }

    #[test]
    fn test_stack_unwinds_in_reverse_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stack = ScopeStack::new();
        stack.push(recording(&log, "a")).unwrap();
        stack.push(recording(&log, "b")).unwrap();
        assert_eq!(stack.len(), 2);

        let result = stack.unwind(Some(Boom.into()));
        assert!(result.unwrap_err().is::<Boom>());
        assert!(stack.is_empty());
        assert_eq!(*log.borrow(), ["enter a", "enter b", "exit b", "exit a"]);
    }

    #[test]
    fn test_suppressing_scope_stops_propagation() {
        let mut stack = ScopeStack::new();
        stack.push(Box::new(on_exit(|_pending| Ok(())))).unwrap();
        assert!(stack.unwind(Some(Boom.into())).is_ok());
    }

    #[test]
    fn test_failed_entry_rolls_back_entered_scopes() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stack = ScopeStack::new();
        stack.push(recording(&log, "a")).unwrap();

        let failing = from_fns(
            || Err(Boom.into()),
            |pending: Option<Fault>| pending.map_or(Ok(()), Err),
        );
        let fault = stack.push(Box::new(failing)).unwrap_err();

        assert!(fault.is::<Boom>());
        assert!(stack.is_empty());
        assert_eq!(*log.borrow(), ["enter a", "exit a"]);
    }

    #[test]
    fn test_failed_entry_suppressed_during_rollback_aborts() {
        let mut stack = ScopeStack::new();
        stack.push(Box::new(on_exit(|_pending| Ok(())))).unwrap();

        let failing = from_fns(
            || Err(Boom.into()),
            |pending: Option<Fault>| pending.map_or(Ok(()), Err),
        );
        let fault = stack.push(Box::new(failing)).unwrap_err();
        assert!(fault.is::<CoreError>());
    }

    #[test]
    fn test_within_returns_value() {
        assert_eq!(within(noop(), || Ok(42)).unwrap(), Some(42));
    }

    #[test]
    fn test_within_suppressed_returns_none() {
        let result: Result<Option<()>, Fault> =
            within(on_exit(|_pending| Ok(())), || Err(Boom.into()));
        assert_eq!(result.unwrap(), None);
    }

    #[test]
    fn test_within_propagates() {
        let result: Result<Option<()>, Fault> = within(noop(), || Err(Boom.into()));
        assert!(result.unwrap_err().is::<Boom>());
    }
}
