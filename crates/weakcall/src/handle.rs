//! Weak handles with a strong fallback.
//!
//! [`WeakHandle`] is the reference primitive every caller is built on: it normally holds a
//! `std::rc::Weak`, and only holds an `Rc` when the referent cannot (or must not) be
//! referenced weakly. [`ValueHandle`] applies the same policy to arbitrary argument values.
//!
//! Handle equality is address equality and does not depend on liveness. A dead `Weak`
//! still pins its allocation, so the address cannot be reused while a handle to it exists.

use std::{
    fmt,
    rc::{Rc, Weak},
};

use crate::{
    callable::{BoundMethod, BuiltinMethod, Callable},
    config::StrongFallback,
    error::{CallResult, ExcType},
    function::Function,
    value::{ObjectRef, Receiver, Value},
};

/// A reference that does not keep its referent alive, or a strong fallback.
pub enum WeakHandle<T: ?Sized> {
    Weak(Weak<T>),
    Strong(Rc<T>),
}

impl<T: ?Sized> WeakHandle<T> {
    /// Downgrades `rc` into a weak handle.
    #[must_use]
    pub fn weak(rc: &Rc<T>) -> Self {
        Self::Weak(Rc::downgrade(rc))
    }

    /// Holds `rc` strongly.
    #[must_use]
    pub fn strong(rc: Rc<T>) -> Self {
        Self::Strong(rc)
    }

    /// Returns the referent, or `None` if it has been dropped.
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<Rc<T>> {
        match self {
            Self::Weak(weak) => weak.upgrade(),
            Self::Strong(rc) => Some(Rc::clone(rc)),
        }
    }

    /// Returns true while the referent exists, without creating a new strong reference.
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        match self {
            Self::Weak(weak) => weak.strong_count() > 0,
            Self::Strong(_) => true,
        }
    }

    /// Returns true if this handle does not keep the referent alive.
    #[must_use]
    pub fn is_weak(&self) -> bool {
        matches!(self, Self::Weak(_))
    }

    /// Address of the referent's allocation.
    #[must_use]
    pub fn addr(&self) -> *const () {
        match self {
            Self::Weak(weak) => weak.as_ptr().cast::<()>(),
            Self::Strong(rc) => Rc::as_ptr(rc).cast::<()>(),
        }
    }

    /// Returns true if both handles refer to the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl<T: ?Sized> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Weak(weak) => Self::Weak(Weak::clone(weak)),
            Self::Strong(rc) => Self::Strong(Rc::clone(rc)),
        }
    }
}

impl<T: ?Sized> PartialEq for WeakHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: ?Sized> Eq for WeakHandle<T> {}

impl<T: ?Sized> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_weak() { "weak" } else { "strong" };
        let state = if self.is_alive() { "alive" } else { "dead" };
        write!(f, "<{kind} handle to {:p}; {state}>", self.addr())
    }
}

/// Handle to a receiver object.
pub type ObjectHandle = WeakHandle<dyn Receiver>;

/// Captures a receiver weakly, or strongly if it opts out of weak references.
///
/// `role` names the captured part in warnings and errors (e.g. "receiver").
pub(crate) fn capture_object(obj: &ObjectRef, fallback: StrongFallback, role: &str) -> CallResult<ObjectHandle> {
    if obj.weak_referenceable() {
        return Ok(WeakHandle::weak(obj));
    }
    match fallback {
        StrongFallback::Silent => {}
        StrongFallback::Warn => tracing::warn!(
            type_name = obj.type_name(),
            role,
            "cannot create weak reference; capturing strongly"
        ),
        StrongFallback::Deny => {
            return Err(ExcType::type_error(format!(
                "cannot create weak reference to '{}' object",
                obj.type_name()
            )));
        }
    }
    Ok(WeakHandle::strong(Rc::clone(obj)))
}

/// A bound argument held as weakly as its kind allows.
///
/// Heap objects and plain functions are held weakly. Bound and builtin method arguments
/// are transient, so they are split into their receiver and function (or name) and the
/// receiver is held weakly like any other object. Primitives, tuples, partials and wrapped
/// callers are values in their own right and are held strongly.
#[derive(Debug, Clone)]
pub enum ValueHandle {
    Object(ObjectHandle),
    Function(WeakHandle<Function>),
    Method {
        receiver: ObjectHandle,
        func: WeakHandle<Function>,
    },
    Builtin {
        receiver: ObjectHandle,
        name: String,
    },
    Value(Value),
}

impl ValueHandle {
    /// Captures `value`, consulting `fallback` for objects that refuse weak references.
    pub fn capture(value: &Value, fallback: StrongFallback) -> CallResult<Self> {
        Ok(match value {
            Value::Ref(obj) => Self::Object(capture_object(obj, fallback, "argument")?),
            Value::Callable(Callable::Function(func)) => Self::Function(WeakHandle::weak(func)),
            Value::Callable(Callable::BoundMethod(method)) => Self::Method {
                receiver: capture_object(method.receiver(), fallback, "argument")?,
                func: WeakHandle::weak(method.func()),
            },
            Value::Callable(Callable::BuiltinMethod(method)) => Self::Builtin {
                receiver: capture_object(method.receiver(), fallback, "argument")?,
                name: method.name().to_owned(),
            },
            other => Self::Value(other.clone()),
        })
    }

    /// Returns the value, or `None` if a weakly-held referent is gone.
    ///
    /// Method arguments are rebuilt from their parts.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<Value> {
        match self {
            Self::Object(handle) => handle.upgrade().map(Value::Ref),
            Self::Function(handle) => handle.upgrade().map(|func| Value::Callable(Callable::Function(func))),
            Self::Method { receiver, func } => {
                let method = BoundMethod::new(func.upgrade()?, receiver.upgrade()?);
                Some(Value::Callable(Callable::BoundMethod(method)))
            }
            Self::Builtin { receiver, name } => {
                let method = BuiltinMethod::new(receiver.upgrade()?, name.clone());
                Some(Value::Callable(Callable::BuiltinMethod(method)))
            }
            Self::Value(value) => Some(value.clone()),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        match self {
            Self::Object(handle) => handle.is_alive(),
            Self::Function(handle) => handle.is_alive(),
            Self::Method { receiver, func } => receiver.is_alive() && func.is_alive(),
            Self::Builtin { receiver, .. } => receiver.is_alive(),
            Self::Value(_) => true,
        }
    }

    /// Returns true if this handle does not keep its value alive.
    #[must_use]
    pub fn is_weak(&self) -> bool {
        match self {
            Self::Object(handle) | Self::Builtin { receiver: handle, .. } => handle.is_weak(),
            Self::Function(handle) => handle.is_weak(),
            Self::Method { receiver, .. } => receiver.is_weak(),
            Self::Value(_) => false,
        }
    }
}

impl PartialEq for ValueHandle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a == b,
            (Self::Method { receiver: ra, func: fa }, Self::Method { receiver: rb, func: fb }) => {
                ra == rb && fa == fb
            }
            (Self::Builtin { receiver: ra, name: na }, Self::Builtin { receiver: rb, name: nb }) => {
                ra == rb && na == nb
            }
            (Self::Value(a), Self::Value(b)) => a == b,
            _ => false,
        }
    }
}
