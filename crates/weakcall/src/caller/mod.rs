//! Weakly-held callables.
//!
//! A [`WeakCallable`] is a stored callback that does not keep its target alive. It is built
//! once, at registration time, by [`WeakCallable::create`], which inspects the shape of the
//! callable and picks one of a closed set of variants:
//!
//! | Shape | Variant | Weakly held |
//! |-------|---------|-------------|
//! | partial over a bound method | [`PartialMethodCaller`] | receiver, function |
//! | `__setattr__` with a key | [`SetAttrCaller`] | receiver |
//! | `__setitem__` with a key | [`SetItemCaller`] | receiver |
//! | bound method | [`BoundMethodCaller`] | receiver, function |
//! | builtin method | [`BuiltinMethodCaller`] | receiver |
//! | anything else | [`FunctionCaller`] | the function (or partial) |
//!
//! A [`WeakPartial`] is also a variant, so it can be stored wherever a created caller can.
//!
//! # Invocation
//!
//! [`WeakCallable::callback`] is the dispatch-loop entry point: it dereferences the weak
//! parts directly, calls the target if everything is alive, and reports `Ok(true)` if it
//! found the target dead. It never fails for liveness reasons, so loops can prune without
//! error handling. [`WeakCallable::invoke`] and [`WeakCallable::slot`] reconstruct the
//! original callable and fail with [`CallError::TargetGone`](crate::CallError::TargetGone) instead.
//!
//! Errors raised by the target body propagate out of every entry point unchanged.
//!
//! # Threading
//!
//! Everything here is built on `Rc`, so callers are `!Send` and `!Sync`: registration,
//! dispatch, and destruction of targets all happen on one thread. `callback` holds a strong
//! reference to every part it dereferenced until the target returns, so a target cannot be
//! reclaimed while its own callback is running.

mod function;
mod method;
mod setter;

use strum::{Display, IntoStaticStr};

pub use self::{
    function::{FunctionCaller, FunctionTarget},
    method::{BoundMethodCaller, BuiltinMethodCaller, PartialMethodCaller, Rebind},
    setter::{SetAttrCaller, SetItemCaller},
};
use crate::{
    callable::Callable,
    config::CaptureOptions,
    error::{CallResult, ExcType},
    partial::WeakPartial,
    value::{Kwargs, Value},
};

/// Truncates `args` to at most `max_args` positional arguments.
#[inline]
pub(crate) fn prune_args(args: &[Value], max_args: Option<usize>) -> &[Value] {
    match max_args {
        Some(max) if max < args.len() => &args[..max],
        _ => args,
    }
}

/// Shared contract of every weak callable variant.
pub trait WeakCaller {
    /// Calls the target if it is alive. Returns `Ok(true)` if the target was found dead.
    ///
    /// This is the hot path of an event dispatch loop: implementations dereference their
    /// weak parts directly instead of rebuilding the original callable.
    fn callback(&self, args: &[Value]) -> CallResult<bool>;

    /// Reconstructs the original callable, or fails with `TargetGone`.
    fn slot(&self) -> CallResult<Callable>;

    /// Cheap liveness check that does not create strong references.
    fn is_alive(&self) -> bool;

    /// Maximum number of positional arguments forwarded to the target.
    fn max_args(&self) -> Option<usize>;

    /// Reconstructs the target and calls it with truncated positional args and `kwargs`.
    fn call(&self, args: &[Value], kwargs: &Kwargs) -> CallResult<Value> {
        self.slot()?.call(prune_args(args, self.max_args()), kwargs)
    }

    /// Reconstructs the target and calls it with truncated positional args.
    fn invoke(&self, args: &[Value]) -> CallResult<Value> {
        self.call(args, &Kwargs::new())
    }
}

/// Which variant a [`WeakCallable`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum CallerKind {
    Function,
    BoundMethod,
    BuiltinMethod,
    PartialMethod,
    SetAttr,
    SetItem,
    WeakPartial,
}

/// A callback that does not keep its target alive.
///
/// Two callers are equal when they are the same variant, their weak handles point at the
/// same allocations, and any name/key state matches. Callers of different variants are
/// never equal. This is what dispatchers use to de-duplicate registrations.
#[derive(Debug, Clone)]
pub enum WeakCallable {
    Function(FunctionCaller),
    BoundMethod(BoundMethodCaller),
    BuiltinMethod(BuiltinMethodCaller),
    PartialMethod(PartialMethodCaller),
    SetAttr(SetAttrCaller),
    SetItem(SetItemCaller),
    Partial(WeakPartial),
}

impl WeakCallable {
    /// Returns a weak caller appropriate for `func`.
    ///
    /// `max_args` caps the positional arguments forwarded by [`callback`](Self::callback) and
    /// [`invoke`](Self::invoke). `key` is only consulted for `__setattr__` / `__setitem__`
    /// methods, which become setter callers assigning to that attribute or index.
    pub fn create(func: impl Into<Callable>, max_args: Option<usize>, key: Option<Value>) -> CallResult<Self> {
        let options = CaptureOptions {
            max_args,
            key,
            ..CaptureOptions::default()
        };
        Self::create_with(func, &options)
    }

    /// Like [`create`](Self::create), with full control over capture policy.
    pub fn create_with(func: impl Into<Callable>, options: &CaptureOptions) -> CallResult<Self> {
        let func = func.into();
        if let Callable::Weak(weak) = func {
            return Ok(*weak);
        }
        let caller = Self::classify(func, options)?;
        tracing::debug!(kind = %caller.kind(), max_args = ?options.max_args, "created weak callable");
        Ok(caller)
    }

    fn classify(func: Callable, options: &CaptureOptions) -> CallResult<Self> {
        if let Callable::Partial(partial) = &func
            && matches!(partial.func(), Callable::BoundMethod(_))
        {
            return Ok(Self::PartialMethod(PartialMethodCaller::new(partial, options)?));
        }

        if let Some(key) = &options.key
            && let Some(name @ ("__setattr__" | "__setitem__")) = func.name()
        {
            let Some(receiver) = func.receiver() else {
                return Err(ExcType::type_error(format!(
                    "Cannot use {name} as a weak callback unless it is a bound method."
                )));
            };
            return if name == "__setattr__" {
                let Some(attr) = key.as_str() else {
                    return Err(ExcType::type_error(format!(
                        "attribute name must be string, not '{}'",
                        key.type_name()
                    )));
                };
                Ok(Self::SetAttr(SetAttrCaller::new(receiver, attr, options)?))
            } else {
                Ok(Self::SetItem(SetItemCaller::new(receiver, key.clone(), options)?))
            };
        }

        Ok(match func {
            Callable::BoundMethod(method) => Self::BoundMethod(BoundMethodCaller::new(&method, options)?),
            Callable::BuiltinMethod(method) => Self::BuiltinMethod(BuiltinMethodCaller::new(&method, options)?),
            Callable::Function(func) => Self::Function(FunctionCaller::new(&func, options)),
            Callable::Partial(partial) => Self::Function(FunctionCaller::from_partial(&partial, options.max_args)),
            Callable::Weak(weak) => *weak,
        })
    }

    /// Builds a [`WeakPartial`]; see [`weak_partial`](crate::weak_partial).
    pub fn partial(func: impl Into<Callable>, args: Vec<Value>, keywords: Kwargs) -> CallResult<WeakPartial> {
        WeakPartial::new(func, args, keywords)
    }

    /// Which variant this is.
    #[must_use]
    pub fn kind(&self) -> CallerKind {
        match self {
            Self::Function(_) => CallerKind::Function,
            Self::BoundMethod(_) => CallerKind::BoundMethod,
            Self::BuiltinMethod(_) => CallerKind::BuiltinMethod,
            Self::PartialMethod(_) => CallerKind::PartialMethod,
            Self::SetAttr(_) => CallerKind::SetAttr,
            Self::SetItem(_) => CallerKind::SetItem,
            Self::Partial(_) => CallerKind::WeakPartial,
        }
    }

    fn as_caller(&self) -> &dyn WeakCaller {
        match self {
            Self::Function(caller) => caller,
            Self::BoundMethod(caller) => caller,
            Self::BuiltinMethod(caller) => caller,
            Self::PartialMethod(caller) => caller,
            Self::SetAttr(caller) => caller,
            Self::SetItem(caller) => caller,
            Self::Partial(caller) => caller,
        }
    }

    /// Calls the target if alive; returns `Ok(true)` if it was found dead.
    #[inline]
    pub fn callback(&self, args: &[Value]) -> CallResult<bool> {
        let dead = match self {
            Self::Function(caller) => caller.callback(args),
            Self::BoundMethod(caller) => caller.callback(args),
            Self::BuiltinMethod(caller) => caller.callback(args),
            Self::PartialMethod(caller) => caller.callback(args),
            Self::SetAttr(caller) => caller.callback(args),
            Self::SetItem(caller) => caller.callback(args),
            Self::Partial(caller) => caller.callback(args),
        }?;
        if dead {
            tracing::trace!(kind = %self.kind(), "weak callback target is dead");
        }
        Ok(dead)
    }

    /// Reconstructs and calls the target with truncated args, failing if it is dead.
    pub fn invoke(&self, args: &[Value]) -> CallResult<Value> {
        self.as_caller().invoke(args)
    }

    /// Reconstructs and calls the target with truncated args and keywords.
    pub fn call(&self, args: &[Value], kwargs: &Kwargs) -> CallResult<Value> {
        self.as_caller().call(args, kwargs)
    }

    /// Reconstructs the original callable, failing if it is dead.
    pub fn slot(&self) -> CallResult<Callable> {
        self.as_caller().slot()
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.as_caller().is_alive()
    }

    #[must_use]
    pub fn max_args(&self) -> Option<usize> {
        self.as_caller().max_args()
    }
}

impl PartialEq for WeakCallable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Function(a), Self::Function(b)) => a == b,
            (Self::BoundMethod(a), Self::BoundMethod(b)) => a == b,
            (Self::BuiltinMethod(a), Self::BuiltinMethod(b)) => a == b,
            (Self::PartialMethod(a), Self::PartialMethod(b)) => a == b,
            (Self::SetAttr(a), Self::SetAttr(b)) => a == b,
            (Self::SetItem(a), Self::SetItem(b)) => a == b,
            (Self::Partial(a), Self::Partial(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for WeakCallable {}

impl From<WeakPartial> for WeakCallable {
    fn from(partial: WeakPartial) -> Self {
        Self::Partial(partial)
    }
}
