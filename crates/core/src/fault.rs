//! Exceptions as values.
//!
//! A [`Fault`] is what unwinds through scopes: every fallible operation run
//! inside a guard returns `Result<T, Fault>`. The payload is any type that
//! implements [`Exception`]. Exceptions may refine a broader kind by exposing
//! the embedded base value through [`Exception::parent`]; guards use that
//! chain when matching, so a guard for `BlueError` also sees an `IndigoError`
//! that carries a `BlueError`.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Access to the concrete value behind a trait object.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

/// An error that can travel through exception handlers.
pub trait Exception: std::error::Error + AsAny + Send + Sync {
    /// The broader exception this one refines, if any.
    fn parent(&self) -> Option<&dyn Exception> {
        None
    }
}

impl Exception for std::io::Error {}

/// Runtime tag for an exception type.
#[derive(Clone, Copy)]
pub struct Kind {
    id: TypeId,
    name: &'static str,
}

impl Kind {
    pub fn of<E: Exception>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: type_name::<E>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn is_type_of(&self, exception: &dyn Exception) -> bool {
        Any::type_id(AsAny::as_any(exception)) == self.id
    }
}

impl PartialEq for Kind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Kind {}

impl Hash for Kind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// An exception in flight.
pub struct Fault {
    kind: Kind,
    inner: Box<dyn Exception>,
}

impl Fault {
    pub fn new<E: Exception>(exception: E) -> Self {
        Self {
            kind: Kind::of::<E>(),
            inner: Box::new(exception),
        }
    }

    /// Kind of the outermost exception.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Whether this fault is of the given kind or refines it.
    pub fn matches(&self, kind: &Kind) -> bool {
        self.lineage().any(|exception| kind.is_type_of(exception))
    }

    pub fn is<E: Exception>(&self) -> bool {
        self.matches(&Kind::of::<E>())
    }

    /// View of the fault as `E`, following the refinement chain.
    pub fn downcast_ref<E: Exception>(&self) -> Option<&E> {
        self.lineage()
            .find_map(|exception| AsAny::as_any(exception).downcast_ref::<E>())
    }

    /// Take the exception out if the fault is exactly an `E`.
    ///
    /// Refinement is not followed: a fault that merely refines `E` is handed
    /// back unchanged.
    pub fn downcast<E: Exception>(self) -> Result<E, Fault> {
        if self.kind != Kind::of::<E>() {
            return Err(self);
        }
        match AsAny::into_any(self.inner).downcast::<E>() {
            Ok(exception) => Ok(*exception),
            Err(_) => unreachable!("fault kind is the type of its exception"),
        }
    }

    pub fn get_ref(&self) -> &dyn Exception {
        &*self.inner
    }

    pub fn into_inner(self) -> Box<dyn Exception> {
        self.inner
    }

    fn lineage(&self) -> impl Iterator<Item = &dyn Exception> + '_ {
        let root: &dyn Exception = &*self.inner;
        std::iter::successors(Some(root), |exception| exception.parent())
    }
}

impl<E: Exception> From<E> for Fault {
    fn from(exception: E) -> Self {
        Self::new(exception)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("kind", &self.kind)
            .field("exception", &self.inner)
            .finish()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}
