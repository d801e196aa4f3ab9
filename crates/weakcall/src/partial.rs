//! Weakly-held partial application.
//!
//! A [`WeakPartial`] is `functools.partial` where nothing is kept alive: the target
//! function (and its receiver, for a bound method) is held weakly, and so is every bound
//! argument that supports weak references. If *any* of those parts is reclaimed, the whole
//! partial is dead, because a call with a stale closed-over argument no longer means what
//! it meant at registration time.

use indexmap::IndexMap;

use crate::{
    caller::{Rebind, WeakCallable, WeakCaller, prune_args},
    callable::{ArgBuf, BoundMethod, BuiltinMethod, Callable, Partial},
    config::CaptureOptions,
    error::{ArgPosition, CallError, CallResult, ExcType, Gone},
    function::Function,
    handle::{ObjectHandle, ValueHandle, WeakHandle, capture_object},
    value::{Kwargs, ObjectRef, Value},
};

/// The callable a [`WeakPartial`] forwards to, decomposed into weakly-held parts.
#[derive(Debug, Clone)]
enum PartialTarget {
    Function(WeakHandle<Function>),
    Method {
        receiver: ObjectHandle,
        func: WeakHandle<Function>,
        rebind: Rebind,
    },
    Builtin {
        receiver: ObjectHandle,
        name: String,
    },
    /// An already-weak caller; it is held strongly since it owns nothing itself.
    Caller(Box<WeakCallable>),
}

impl PartialTarget {
    fn is_alive(&self) -> bool {
        match self {
            Self::Function(func) => func.is_alive(),
            Self::Method { receiver, func, .. } => receiver.is_alive() && func.is_alive(),
            Self::Builtin { receiver, .. } => receiver.is_alive(),
            Self::Caller(caller) => caller.is_alive(),
        }
    }

    fn gone(&self) -> CallError {
        match self {
            Self::Function(_) => CallError::TargetGone(Gone::Function),
            _ => CallError::TargetGone(Gone::Object),
        }
    }
}

impl PartialEq for PartialTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Function(a), Self::Function(b)) => a == b,
            (
                Self::Method {
                    receiver: ra, func: fa, ..
                },
                Self::Method {
                    receiver: rb, func: fb, ..
                },
            ) => ra == rb && fa == fb,
            (Self::Builtin { receiver: ra, name: na }, Self::Builtin { receiver: rb, name: nb }) => {
                ra == rb && na == nb
            }
            (Self::Caller(a), Self::Caller(b)) => a == b,
            _ => false,
        }
    }
}

/// A partial application that keeps neither its target nor its bound arguments alive.
#[derive(Debug, Clone)]
pub struct WeakPartial {
    target: PartialTarget,
    args: Vec<ValueHandle>,
    keywords: IndexMap<String, ValueHandle>,
    max_args: Option<usize>,
}

impl WeakPartial {
    /// Builds a weak partial with the default capture options.
    pub fn new(func: impl Into<Callable>, args: Vec<Value>, keywords: Kwargs) -> CallResult<Self> {
        Self::with_options(func, args, keywords, &CaptureOptions::default())
    }

    /// Builds a weak partial.
    ///
    /// A strong [`Partial`] target is flattened: its arguments go ahead of `args` and
    /// `keywords` override its keywords.
    pub fn with_options(
        func: impl Into<Callable>,
        args: Vec<Value>,
        keywords: Kwargs,
        options: &CaptureOptions,
    ) -> CallResult<Self> {
        let target = match func.into() {
            Callable::Partial(partial) => {
                let mut merged_args = partial.args().to_vec();
                merged_args.extend(args);
                let mut merged_keywords = partial.keywords().clone();
                merged_keywords.extend(keywords);
                return Self::with_options(partial.func().clone(), merged_args, merged_keywords, options);
            }
            Callable::Function(func) => {
                if options.strong_capture.matches(&func) {
                    PartialTarget::Function(WeakHandle::strong(func))
                } else {
                    PartialTarget::Function(WeakHandle::weak(&func))
                }
            }
            Callable::BoundMethod(method) => PartialTarget::Method {
                receiver: capture_object(method.receiver(), options.fallback, "receiver")?,
                func: WeakHandle::weak(method.func()),
                rebind: BoundMethod::new,
            },
            Callable::BuiltinMethod(method) => PartialTarget::Builtin {
                receiver: capture_object(method.receiver(), options.fallback, "receiver")?,
                name: method.name().to_owned(),
            },
            Callable::Weak(caller) => PartialTarget::Caller(caller),
        };
        let args = args
            .iter()
            .map(|arg| ValueHandle::capture(arg, options.fallback))
            .collect::<CallResult<Vec<_>>>()?;
        let keywords = keywords
            .iter()
            .map(|(name, value)| ValueHandle::capture(value, options.fallback).map(|handle| (name.clone(), handle)))
            .collect::<CallResult<IndexMap<_, _>>>()?;
        Ok(Self {
            target,
            args,
            keywords,
            max_args: options.max_args,
        })
    }

    /// The rebuilt target, or `None` if it (or its receiver) is gone.
    #[must_use]
    pub fn target(&self) -> Option<Callable> {
        match &self.target {
            PartialTarget::Function(func) => func.upgrade().map(Callable::Function),
            PartialTarget::Method { receiver, func, rebind } => {
                let receiver = receiver.upgrade()?;
                let func = func.upgrade()?;
                Some(Callable::BoundMethod(rebind(func, receiver)))
            }
            PartialTarget::Builtin { receiver, name } => receiver
                .upgrade()
                .map(|receiver| Callable::BuiltinMethod(BuiltinMethod::new(receiver, name.clone()))),
            PartialTarget::Caller(caller) => caller
                .is_alive()
                .then(|| Callable::Weak(caller.clone())),
        }
    }

    /// The bound positional arguments, or `ArgumentGone` if any was reclaimed.
    pub fn args(&self) -> CallResult<Vec<Value>> {
        self.args
            .iter()
            .enumerate()
            .map(|(index, handle)| {
                handle
                    .get()
                    .ok_or(CallError::ArgumentGone(ArgPosition::Positional(index)))
            })
            .collect()
    }

    /// The bound keyword arguments, or `ArgumentGone` if any was reclaimed.
    pub fn keywords(&self) -> CallResult<Kwargs> {
        self.keywords
            .iter()
            .map(|(name, handle)| {
                handle
                    .get()
                    .map(|value| (name.clone(), value))
                    .ok_or_else(|| CallError::ArgumentGone(ArgPosition::Keyword(name.clone())))
            })
            .collect()
    }

    /// Dereferences all bound arguments into a call buffer, with `receiver` first if given.
    ///
    /// Returns `None` as soon as any argument is gone.
    fn bind(&self, receiver: Option<ObjectRef>, args: &[Value]) -> Option<(ArgBuf, Kwargs)> {
        let mut argv = ArgBuf::with_capacity(usize::from(receiver.is_some()) + self.args.len() + args.len());
        if let Some(receiver) = receiver {
            argv.push(Value::Ref(receiver));
        }
        for handle in &self.args {
            argv.push(handle.get()?);
        }
        argv.extend(args.iter().cloned());
        let mut keywords = Kwargs::with_capacity(self.keywords.len());
        for (name, handle) in &self.keywords {
            keywords.insert(name.clone(), handle.get()?);
        }
        Some((argv, keywords))
    }
}

impl PartialEq for WeakPartial {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target && self.args == other.args && self.keywords == other.keywords
    }
}

impl Eq for WeakPartial {}

impl WeakCaller for WeakPartial {
    fn callback(&self, args: &[Value]) -> CallResult<bool> {
        let args = prune_args(args, self.max_args);
        match &self.target {
            PartialTarget::Function(func) => {
                let Some(func) = func.upgrade() else {
                    return Ok(true);
                };
                let Some((argv, keywords)) = self.bind(None, args) else {
                    return Ok(true);
                };
                func.call(&argv, &keywords)?;
            }
            PartialTarget::Method { receiver, func, .. } => {
                let (Some(receiver), Some(func)) = (receiver.upgrade(), func.upgrade()) else {
                    return Ok(true);
                };
                let Some((argv, keywords)) = self.bind(Some(receiver), args) else {
                    return Ok(true);
                };
                func.call(&argv, &keywords)?;
            }
            PartialTarget::Builtin { receiver, name } => {
                let Some(receiver) = receiver.upgrade() else {
                    return Ok(true);
                };
                let Some((argv, keywords)) = self.bind(None, args) else {
                    return Ok(true);
                };
                receiver.call_builtin(&receiver, name, &argv, &keywords)?;
            }
            PartialTarget::Caller(caller) => {
                if !caller.is_alive() {
                    return Ok(true);
                }
                let Some((argv, keywords)) = self.bind(None, args) else {
                    return Ok(true);
                };
                caller.call(&argv, &keywords)?;
            }
        }
        Ok(false)
    }

    /// Returns a strong [`Partial`] over the rebuilt target and the current bound arguments.
    fn slot(&self) -> CallResult<Callable> {
        let target = self.target().ok_or_else(|| self.target.gone())?;
        Ok(Callable::Partial(Partial::new(target, self.args()?, self.keywords()?)))
    }

    fn is_alive(&self) -> bool {
        self.target.is_alive()
            && self.args.iter().all(ValueHandle::is_alive)
            && self.keywords.values().all(ValueHandle::is_alive)
    }

    fn max_args(&self) -> Option<usize> {
        self.max_args
    }

    /// Calls the target, failing with `TargetGone` or `ArgumentGone` if anything is dead.
    ///
    /// Call-site keywords override bound keywords.
    fn call(&self, args: &[Value], kwargs: &Kwargs) -> CallResult<Value> {
        let target = self.target().ok_or_else(|| self.target.gone())?;
        let mut full_args = self.args()?;
        full_args.extend(prune_args(args, self.max_args).iter().cloned());
        let mut keywords = self.keywords()?;
        keywords.extend(kwargs.iter().map(|(k, v)| (k.clone(), v.clone())));
        target.call(&full_args, &keywords)
    }
}

/// Inherent forms of the [`WeakCaller`] methods, so callers need not import the trait.
impl WeakPartial {
    /// Calls the target if it and every bound argument are alive; `Ok(true)` if anything is dead.
    #[inline]
    pub fn callback(&self, args: &[Value]) -> CallResult<bool> {
        <Self as WeakCaller>::callback(self, args)
    }

    /// Calls the rebuilt target, failing with `TargetGone` or `ArgumentGone` if anything is dead.
    pub fn call(&self, args: &[Value], kwargs: &Kwargs) -> CallResult<Value> {
        <Self as WeakCaller>::call(self, args, kwargs)
    }

    pub fn invoke(&self, args: &[Value]) -> CallResult<Value> {
        <Self as WeakCaller>::invoke(self, args)
    }

    /// Returns a strong [`Partial`] over the live parts.
    pub fn slot(&self) -> CallResult<Callable> {
        <Self as WeakCaller>::slot(self)
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        <Self as WeakCaller>::is_alive(self)
    }

    #[must_use]
    pub fn max_args(&self) -> Option<usize> {
        <Self as WeakCaller>::max_args(self)
    }
}

/// Builds a [`WeakPartial`] over `func` with bound `args` and `keywords`.
pub fn weak_partial(func: impl Into<Callable>, args: Vec<Value>, keywords: Kwargs) -> CallResult<WeakPartial> {
    WeakPartial::new(func, args, keywords)
}

/// Like [`weak_partial`], for a target that is only known to be a [`Value`].
///
/// Fails with `TypeError` if the value is not callable.
pub fn weak_partial_value(func: &Value, args: Vec<Value>, keywords: Kwargs) -> CallResult<WeakPartial> {
    match func {
        Value::Callable(callable) => WeakPartial::new(callable.clone(), args, keywords),
        _ => Err(ExcType::type_error("the first argument must be callable")),
    }
}

impl From<WeakPartial> for Callable {
    fn from(partial: WeakPartial) -> Self {
        Self::Weak(Box::new(WeakCallable::Partial(partial)))
    }
}
