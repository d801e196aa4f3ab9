//! Callable shapes: plain functions, bound methods, builtin methods and partials.
//!
//! These are the *strong* forms a caller hands to [`WeakCallable::create`]. Method access
//! through [`get_method`] builds a fresh [`BoundMethod`] or [`BuiltinMethod`] every time,
//! so those objects are transient and must never be the thing a weak callback points at.

use std::{
    hash::{Hash, Hasher},
    rc::Rc,
};

use smallvec::SmallVec;

use crate::{
    caller::WeakCallable,
    error::{CallResult, ExcType},
    function::Function,
    value::{Kwargs, MethodLookup, ObjectRef, Value, same_object},
};

/// Positional argument buffer used when a receiver has to be prepended.
///
/// Event callbacks rarely take more than a handful of arguments, so this stays on the stack.
pub(crate) type ArgBuf = SmallVec<[Value; 6]>;

/// Any value that can be called.
#[derive(Debug, Clone)]
pub enum Callable {
    /// A plain function.
    Function(Rc<Function>),
    /// A function joined with its receiver.
    BoundMethod(BoundMethod),
    /// A receiver-provided operation with no separable function.
    BuiltinMethod(BuiltinMethod),
    /// Pre-bound arguments over another callable.
    Partial(Rc<Partial>),
    /// An already-wrapped weak callable.
    Weak(Box<WeakCallable>),
}

impl Callable {
    /// Calls the value with positional and keyword arguments.
    pub fn call(&self, args: &[Value], kwargs: &Kwargs) -> CallResult<Value> {
        match self {
            Self::Function(func) => func.call(args, kwargs),
            Self::BoundMethod(method) => method.call(args, kwargs),
            Self::BuiltinMethod(method) => method.call(args, kwargs),
            Self::Partial(partial) => partial.call(args, kwargs),
            Self::Weak(weak) => weak.call(args, kwargs),
        }
    }

    /// The `__name__` of the callable, if it has one.
    ///
    /// Partials and wrapped callers have no name of their own.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Function(func) => Some(func.name()),
            Self::BoundMethod(method) => Some(method.func.name()),
            Self::BuiltinMethod(method) => Some(&method.name),
            Self::Partial(_) | Self::Weak(_) => None,
        }
    }

    /// The `__qualname__` of the callable, if it has one.
    #[must_use]
    pub fn qualname(&self) -> Option<&str> {
        match self {
            Self::Function(func) => Some(func.qualname()),
            Self::BoundMethod(method) => Some(method.func.qualname()),
            Self::BuiltinMethod(method) => Some(&method.name),
            Self::Partial(_) | Self::Weak(_) => None,
        }
    }

    /// The bound receiver (`__self__`), for method shapes.
    #[must_use]
    pub fn receiver(&self) -> Option<&ObjectRef> {
        match self {
            Self::BoundMethod(method) => Some(&method.receiver),
            Self::BuiltinMethod(method) => Some(&method.receiver),
            _ => None,
        }
    }

    /// Python-style type name used in reprs and error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Function(_) => "function",
            Self::BoundMethod(_) => "method",
            Self::BuiltinMethod(_) => "builtin_function_or_method",
            Self::Partial(_) => "functools.partial",
            Self::Weak(_) => "weak_callable",
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::BoundMethod(a), Self::BoundMethod(b)) => a == b,
            (Self::BuiltinMethod(a), Self::BuiltinMethod(b)) => a == b,
            (Self::Partial(a), Self::Partial(b)) => Rc::ptr_eq(a, b),
            (Self::Weak(a), Self::Weak(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Callable {}

impl Hash for Callable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Function(func) => Rc::as_ptr(func).hash(state),
            Self::BoundMethod(method) => {
                Rc::as_ptr(&method.func).hash(state);
                Rc::as_ptr(&method.receiver).cast::<()>().hash(state);
            }
            Self::BuiltinMethod(method) => {
                Rc::as_ptr(&method.receiver).cast::<()>().hash(state);
                method.name.hash(state);
            }
            Self::Partial(partial) => Rc::as_ptr(partial).hash(state),
            // structural equality across variants; the discriminant is enough
            Self::Weak(_) => {}
        }
    }
}

impl From<Rc<Function>> for Callable {
    fn from(func: Rc<Function>) -> Self {
        Self::Function(func)
    }
}

impl From<BoundMethod> for Callable {
    fn from(method: BoundMethod) -> Self {
        Self::BoundMethod(method)
    }
}

impl From<BuiltinMethod> for Callable {
    fn from(method: BuiltinMethod) -> Self {
        Self::BuiltinMethod(method)
    }
}

impl From<Rc<Partial>> for Callable {
    fn from(partial: Rc<Partial>) -> Self {
        Self::Partial(partial)
    }
}

impl From<WeakCallable> for Callable {
    fn from(weak: WeakCallable) -> Self {
        Self::Weak(Box::new(weak))
    }
}

/// A bound method created from attribute access on an instance.
///
/// Bound methods bundle the underlying function together with the bound `self` value.
/// Calling one passes the receiver as the first positional argument.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    func: Rc<Function>,
    receiver: ObjectRef,
}

impl BoundMethod {
    /// Joins a function with a receiver.
    #[must_use]
    pub fn new(func: Rc<Function>, receiver: ObjectRef) -> Self {
        Self { func, receiver }
    }

    /// Returns the underlying function (`__func__`).
    #[must_use]
    pub fn func(&self) -> &Rc<Function> {
        &self.func
    }

    /// Returns the bound receiver (`__self__`).
    #[must_use]
    pub fn receiver(&self) -> &ObjectRef {
        &self.receiver
    }

    pub fn call(&self, args: &[Value], kwargs: &Kwargs) -> CallResult<Value> {
        call_with_receiver(&self.func, &self.receiver, &[], args, kwargs)
    }
}

impl PartialEq for BoundMethod {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.func, &other.func) && same_object(&self.receiver, &other.receiver)
    }
}

/// A method implemented natively by its receiver, dispatched by name.
#[derive(Debug, Clone)]
pub struct BuiltinMethod {
    receiver: ObjectRef,
    name: String,
}

impl BuiltinMethod {
    #[must_use]
    pub fn new(receiver: ObjectRef, name: impl Into<String>) -> Self {
        Self {
            receiver,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn receiver(&self) -> &ObjectRef {
        &self.receiver
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value], kwargs: &Kwargs) -> CallResult<Value> {
        self.receiver.call_builtin(&self.receiver, &self.name, args, kwargs)
    }
}

impl PartialEq for BuiltinMethod {
    fn eq(&self, other: &Self) -> bool {
        same_object(&self.receiver, &other.receiver) && self.name == other.name
    }
}

/// A `functools.partial` equivalent: a callable plus pre-applied arguments.
///
/// When called, the stored positional arguments are prepended to the call-site arguments,
/// and stored keyword arguments are merged (call-site keywords take precedence).
#[derive(Debug, Clone)]
pub struct Partial {
    func: Callable,
    args: Vec<Value>,
    keywords: Kwargs,
}

impl Partial {
    /// Creates a partial, flattening `func` if it is itself a partial.
    ///
    /// The nested partial's arguments are placed ahead of `args`, and `keywords` override
    /// the nested partial's keywords.
    #[must_use]
    pub fn new(func: impl Into<Callable>, args: Vec<Value>, keywords: Kwargs) -> Rc<Self> {
        let func = func.into();
        let partial = match func {
            Callable::Partial(inner) => {
                let mut merged_args = inner.args.clone();
                merged_args.extend(args);
                let mut merged_keywords = inner.keywords.clone();
                merged_keywords.extend(keywords);
                Self {
                    func: inner.func.clone(),
                    args: merged_args,
                    keywords: merged_keywords,
                }
            }
            func => Self { func, args, keywords },
        };
        Rc::new(partial)
    }

    /// The wrapped callable.
    #[must_use]
    pub fn func(&self) -> &Callable {
        &self.func
    }

    /// The pre-applied positional arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The pre-applied keyword arguments.
    #[must_use]
    pub fn keywords(&self) -> &Kwargs {
        &self.keywords
    }

    pub fn call(&self, args: &[Value], kwargs: &Kwargs) -> CallResult<Value> {
        let mut full_args: ArgBuf = self.args.iter().cloned().collect();
        full_args.extend(args.iter().cloned());
        if kwargs.is_empty() {
            self.func.call(&full_args, &self.keywords)
        } else {
            let mut merged = self.keywords.clone();
            merged.extend(kwargs.iter().map(|(k, v)| (k.clone(), v.clone())));
            self.func.call(&full_args, &merged)
        }
    }
}

/// Calls `func(receiver, *bound, *args, **kwargs)` without materialising a bound method.
#[inline]
pub(crate) fn call_with_receiver(
    func: &Function,
    receiver: &ObjectRef,
    bound: &[Value],
    args: &[Value],
    kwargs: &Kwargs,
) -> CallResult<Value> {
    let mut argv = ArgBuf::with_capacity(1 + bound.len() + args.len());
    argv.push(Value::Ref(Rc::clone(receiver)));
    argv.extend(bound.iter().cloned());
    argv.extend(args.iter().cloned());
    func.call(&argv, kwargs)
}

/// Attribute-style method access: `obj.name`.
///
/// Returns a new [`BoundMethod`] for class-defined functions and a new [`BuiltinMethod`]
/// for native operations, like Python does on every attribute access.
pub fn get_method(obj: &ObjectRef, name: &str) -> CallResult<Callable> {
    match obj.find_method(name) {
        MethodLookup::Function(func) => Ok(Callable::BoundMethod(BoundMethod::new(func, Rc::clone(obj)))),
        MethodLookup::Builtin => Ok(Callable::BuiltinMethod(BuiltinMethod::new(Rc::clone(obj), name))),
        MethodLookup::Missing => Err(ExcType::attribute_error(obj.type_name(), name)),
    }
}

/// Calls a callable stored in a `Value`, raising `TypeError` for anything else.
pub fn call_value(value: &Value, args: &[Value], kwargs: &Kwargs) -> CallResult<Value> {
    match value {
        Value::Callable(callable) => callable.call(args, kwargs),
        other => Err(ExcType::type_error_not_callable(other.type_name())),
    }
}
