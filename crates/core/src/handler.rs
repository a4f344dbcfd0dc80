//! Exception handlers as first-class values.
//!
//! An [`ExceptionHandler`] intercepts faults of particular kinds when the
//! work it guards fails, and decides whether the fault is suppressed, keeps
//! propagating, or is replaced by another fault. Unlike a `match` on an error,
//! a handler propagates by default: the callback has to ask for suppression
//! explicitly.
//!
//! ```
//! use retrobus_core::{exception_handler, Fault, Handling};
//! # #[derive(Debug, thiserror::Error)]
//! # #[error("application error")]
//! # struct ApplicationError;
//! # impl retrobus_core::Exception for ApplicationError {}
//!
//! let ignore = exception_handler(|_error: &ApplicationError| Ok(Handling::Suppress));
//! let outcome = ignore.run(|| -> Result<(), Fault> { Err(ApplicationError.into()) });
//! assert!(matches!(outcome, Ok(None)));
//! ```
//!
//! Handlers compose. `a.then(b)` lets `a` see a fault before `b`, just like
//! running the work inside `b` inside `a`'s own scope; `a.compose(b)` is the
//! mirror image, `b` first. [`nullhandler`] intercepts nothing and is the
//! identity of both, and composition is associative, so handlers form a
//! monoid.
//!
//! Handlers hold no mutable state. Each run enters a fresh activation, so the
//! same handler can guard nested or recursive work.

use std::fmt;
use std::ops::{Shl, Shr};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::CoreError;
use crate::fault::{Exception, Fault, Kind};
use crate::scope::{self, Scope, ScopeStack};

/// What a typed handler callback wants done with the fault it received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handling {
    Suppress,
    Propagate,
}

impl From<bool> for Handling {
    fn from(suppress: bool) -> Self {
        if suppress {
            Handling::Suppress
        } else {
            Handling::Propagate
        }
    }
}

type Callback = dyn Fn(Fault) -> Result<(), Fault> + Send + Sync;

#[derive(Debug, Clone)]
pub(crate) enum Matcher {
    Any,
    Kinds(Vec<Kind>),
}

impl Matcher {
    /// An empty kind list matches every fault.
    pub(crate) fn from_kinds(kinds: Vec<Kind>) -> Self {
        if kinds.is_empty() {
            Matcher::Any
        } else {
            Matcher::Kinds(kinds)
        }
    }

    fn matches(&self, fault: &Fault) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Kinds(kinds) => kinds.iter().any(|kind| fault.matches(kind)),
        }
    }
}

struct Leaf {
    matcher: Matcher,
    callback: Box<Callback>,
}

impl fmt::Debug for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leaf").field("matcher", &self.matcher).finish()
    }
}

/// Reentrant guard that intercepts faults by kind.
#[derive(Clone)]
pub struct ExceptionHandler {
    leaves: Arc<[Arc<Leaf>]>,
}

/// The handler that handles nothing.
pub fn nullhandler() -> ExceptionHandler {
    ExceptionHandler {
        leaves: Arc::from(Vec::new()),
    }
}

/// Handler for faults of kind `E`, including exceptions that refine `E`.
///
/// The callback sees the fault as `E`. Returning [`Handling::Suppress`]
/// swallows it, [`Handling::Propagate`] lets it continue, and an error
/// replaces it.
pub fn exception_handler<E, F>(callback: F) -> ExceptionHandler
where
    E: Exception,
    F: Fn(&E) -> Result<Handling, Fault> + Send + Sync + 'static,
{
    ExceptionHandler::on::<E, _>(move |fault| {
        let handling = match fault.downcast_ref::<E>() {
            Some(exception) => callback(exception)?,
            None => Handling::Propagate,
        };
        match handling {
            Handling::Suppress => Ok(()),
            Handling::Propagate => Err(fault),
        }
    })
}

impl ExceptionHandler {
    /// Handler for an explicit set of kinds, taking ownership of the fault.
    ///
    /// The callback returns `Ok(())` to suppress, or the fault to propagate.
    pub fn new<I, F>(kinds: I, callback: F) -> crate::error::Result<Self>
    where
        I: IntoIterator<Item = Kind>,
        F: Fn(Fault) -> Result<(), Fault> + Send + Sync + 'static,
    {
        let kinds: Vec<Kind> = kinds.into_iter().collect();
        if kinds.is_empty() {
            return Err(CoreError::EmptyKindSet {
                handler: std::any::type_name::<F>().to_string(),
            });
        }
        Ok(Self::leaf(Matcher::Kinds(kinds), callback))
    }

    /// Handler for kind `E`, taking ownership of the fault.
    pub fn on<E, F>(callback: F) -> Self
    where
        E: Exception,
        F: Fn(Fault) -> Result<(), Fault> + Send + Sync + 'static,
    {
        Self::leaf(Matcher::Kinds(vec![Kind::of::<E>()]), callback)
    }

    /// Handler for every fault.
    pub fn any<F>(callback: F) -> Self
    where
        F: Fn(Fault) -> Result<(), Fault> + Send + Sync + 'static,
    {
        Self::leaf(Matcher::Any, callback)
    }

    pub(crate) fn leaf<F>(matcher: Matcher, callback: F) -> Self
    where
        F: Fn(Fault) -> Result<(), Fault> + Send + Sync + 'static,
    {
        let leaf = Arc::new(Leaf {
            matcher,
            callback: Box::new(callback),
        });
        Self {
            leaves: Arc::from(vec![leaf]),
        }
    }

    /// Compose with a handler that runs inside this one.
    ///
    /// `a.compose(b)` behaves like guarding the work with `b` and guarding
    /// that with `a`: `b` sees a fault first.
    pub fn compose(&self, inner: &ExceptionHandler) -> ExceptionHandler {
        let leaves: Vec<Arc<Leaf>> = self
            .leaves
            .iter()
            .chain(inner.leaves.iter())
            .cloned()
            .collect();
        ExceptionHandler {
            leaves: Arc::from(leaves),
        }
    }

    /// Compose with a handler that sees faults after this one.
    pub fn then(&self, next: &ExceptionHandler) -> ExceptionHandler {
        next.compose(self)
    }

    /// A fresh, not yet entered activation of this handler.
    pub fn scope(&self) -> Activation {
        Activation {
            leaves: Arc::clone(&self.leaves),
            stack: ScopeStack::new(),
        }
    }

    /// Run `body` under this handler.
    ///
    /// `Ok(None)` means `body` failed and the fault was suppressed.
    pub fn run<T, F>(&self, body: F) -> Result<Option<T>, Fault>
    where
        F: FnOnce() -> Result<T, Fault>,
    {
        scope::within(self.scope(), body)
    }

    /// Wrap `function` so that every call runs under this handler.
    ///
    /// The wrapped function takes a single argument; pass several as a tuple
    /// and none as `()`.
    pub fn decorate<A, T, F>(&self, function: F) -> impl Fn(A) -> Result<Option<T>, Fault>
    where
        F: Fn(A) -> Result<T, Fault>,
    {
        let handler = self.clone();
        move |args| handler.run(|| function(args))
    }
}

impl fmt::Debug for ExceptionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.leaves.iter().map(|leaf| &leaf.matcher))
            .finish()
    }
}

impl Shl for ExceptionHandler {
    type Output = ExceptionHandler;

    fn shl(self, inner: ExceptionHandler) -> ExceptionHandler {
        self.compose(&inner)
    }
}

impl Shr for ExceptionHandler {
    type Output = ExceptionHandler;

    fn shr(self, next: ExceptionHandler) -> ExceptionHandler {
        self.then(&next)
    }
}

impl<'a> Shl<&'a ExceptionHandler> for &'a ExceptionHandler {
    type Output = ExceptionHandler;

    fn shl(self, inner: &'a ExceptionHandler) -> ExceptionHandler {
        self.compose(inner)
    }
}

impl<'a> Shr<&'a ExceptionHandler> for &'a ExceptionHandler {
    type Output = ExceptionHandler;

    fn shr(self, next: &'a ExceptionHandler) -> ExceptionHandler {
        self.then(next)
    }
}

/// One entry of an [`ExceptionHandler`], owning its own scope stack.
pub struct Activation {
    leaves: Arc<[Arc<Leaf>]>,
    stack: ScopeStack,
}

impl Scope for Activation {
    fn enter(&mut self) -> Result<(), Fault> {
        trace!(leaves = self.leaves.len(), "entering exception handler");
        for leaf in self.leaves.iter() {
            self.stack.push(Box::new(LeafScope(Arc::clone(leaf))))?;
        }
        Ok(())
    }

    fn exit(mut self: Box<Self>, pending: Option<Fault>) -> Result<(), Fault> {
        self.stack.unwind(pending)
    }
}

struct LeafScope(Arc<Leaf>);

impl Scope for LeafScope {
    fn exit(self: Box<Self>, pending: Option<Fault>) -> Result<(), Fault> {
        let fault = match pending {
            Some(fault) if self.0.matcher.matches(&fault) => fault,
            Some(fault) => return Err(fault),
            None => return Ok(()),
        };

        let kind = fault.kind();
        let outcome = (self.0.callback)(fault);
        match &outcome {
            Ok(()) => debug!(kind = %kind, "exception handler suppressed fault"),
            Err(next) if next.kind() == kind => {
                debug!(kind = %kind, "exception handler let fault propagate")
            }
            Err(next) => {
                debug!(
                    kind = %kind,
                    replacement = %next.kind(),
                    "exception handler replaced fault"
                )
            }
        }
        outcome
    }
}
