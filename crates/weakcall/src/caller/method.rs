use std::rc::Rc;

use super::{WeakCaller, prune_args};
use crate::{
    callable::{BoundMethod, BuiltinMethod, Callable, Partial, call_with_receiver},
    config::CaptureOptions,
    error::{CallError, CallResult, ExcType, Gone},
    function::Function,
    handle::{ObjectHandle, WeakHandle, capture_object},
    value::{Kwargs, ObjectRef, Value},
};

/// Rejoins a function with a receiver into a bound method.
///
/// Method access produces a new bound-method object every time, so callers store the two
/// halves separately and rebuild the method on demand with this.
pub type Rebind = fn(Rc<Function>, ObjectRef) -> BoundMethod;

/// Dereferences a receiver/function pair, returning `None` if either half is gone.
#[inline]
fn upgrade_pair(receiver: &ObjectHandle, func: &WeakHandle<Function>) -> Option<(ObjectRef, Rc<Function>)> {
    Some((receiver.upgrade()?, func.upgrade()?))
}

/// Caller of a bound method, holding the receiver and the function separately.
#[derive(Debug, Clone)]
pub struct BoundMethodCaller {
    receiver: ObjectHandle,
    func: WeakHandle<Function>,
    rebind: Rebind,
    max_args: Option<usize>,
}

impl BoundMethodCaller {
    pub fn new(method: &BoundMethod, options: &CaptureOptions) -> CallResult<Self> {
        Ok(Self {
            receiver: capture_object(method.receiver(), options.fallback, "receiver")?,
            func: WeakHandle::weak(method.func()),
            rebind: BoundMethod::new,
            max_args: options.max_args,
        })
    }

    /// Rebuilds the bound method, or `None` if the receiver or function is gone.
    fn method(&self) -> Option<BoundMethod> {
        let (receiver, func) = upgrade_pair(&self.receiver, &self.func)?;
        Some((self.rebind)(func, receiver))
    }
}

impl PartialEq for BoundMethodCaller {
    fn eq(&self, other: &Self) -> bool {
        self.receiver == other.receiver && self.func == other.func
    }
}

impl Eq for BoundMethodCaller {}

impl WeakCaller for BoundMethodCaller {
    #[inline]
    fn callback(&self, args: &[Value]) -> CallResult<bool> {
        let Some((receiver, func)) = upgrade_pair(&self.receiver, &self.func) else {
            return Ok(true);
        };
        // faster than rebuilding the bound method
        call_with_receiver(&func, &receiver, &[], prune_args(args, self.max_args), &Kwargs::new())?;
        Ok(false)
    }

    fn slot(&self) -> CallResult<Callable> {
        self.method()
            .map(Callable::BoundMethod)
            .ok_or(CallError::TargetGone(Gone::Object))
    }

    fn is_alive(&self) -> bool {
        self.receiver.is_alive() && self.func.is_alive()
    }

    fn max_args(&self) -> Option<usize> {
        self.max_args
    }
}

/// Caller of a builtin method.
///
/// Builtin methods have no separable function, so only the receiver is held and the
/// operation is looked up again by name on each call.
#[derive(Debug, Clone)]
pub struct BuiltinMethodCaller {
    receiver: ObjectHandle,
    name: String,
    max_args: Option<usize>,
}

impl BuiltinMethodCaller {
    pub fn new(method: &BuiltinMethod, options: &CaptureOptions) -> CallResult<Self> {
        Ok(Self {
            receiver: capture_object(method.receiver(), options.fallback, "receiver")?,
            name: method.name().to_owned(),
            max_args: options.max_args,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for BuiltinMethodCaller {
    fn eq(&self, other: &Self) -> bool {
        self.receiver == other.receiver && self.name == other.name
    }
}

impl Eq for BuiltinMethodCaller {}

impl WeakCaller for BuiltinMethodCaller {
    #[inline]
    fn callback(&self, args: &[Value]) -> CallResult<bool> {
        let Some(receiver) = self.receiver.upgrade() else {
            return Ok(true);
        };
        receiver.call_builtin(&receiver, &self.name, prune_args(args, self.max_args), &Kwargs::new())?;
        Ok(false)
    }

    fn slot(&self) -> CallResult<Callable> {
        let receiver = self.receiver.upgrade().ok_or(CallError::TargetGone(Gone::Object))?;
        Ok(Callable::BuiltinMethod(BuiltinMethod::new(receiver, self.name.clone())))
    }

    fn is_alive(&self) -> bool {
        self.receiver.is_alive()
    }

    fn max_args(&self) -> Option<usize> {
        self.max_args
    }
}

/// Caller of a partial wrapping a bound method, like `partial(obj.method, 1, y=2)`.
///
/// The receiver and function are held weakly; the pre-bound arguments are held strongly.
#[derive(Debug, Clone)]
pub struct PartialMethodCaller {
    receiver: ObjectHandle,
    func: WeakHandle<Function>,
    rebind: Rebind,
    args: Vec<Value>,
    keywords: Kwargs,
    max_args: Option<usize>,
}

impl PartialMethodCaller {
    /// Builds a caller from a partial whose target is a bound method.
    pub fn new(partial: &Partial, options: &CaptureOptions) -> CallResult<Self> {
        let Callable::BoundMethod(method) = partial.func() else {
            return Err(ExcType::type_error(format!(
                "argument should be a bound method, not {}",
                partial.func().type_name()
            )));
        };
        Ok(Self {
            receiver: capture_object(method.receiver(), options.fallback, "receiver")?,
            func: WeakHandle::weak(method.func()),
            rebind: BoundMethod::new,
            args: partial.args().to_vec(),
            keywords: partial.keywords().clone(),
            max_args: options.max_args,
        })
    }

    /// The pre-bound positional arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The pre-bound keyword arguments.
    #[must_use]
    pub fn keywords(&self) -> &Kwargs {
        &self.keywords
    }
}

/// Only the receiver and function take part; the bound arguments do not.
impl PartialEq for PartialMethodCaller {
    fn eq(&self, other: &Self) -> bool {
        self.receiver == other.receiver && self.func == other.func
    }
}

impl Eq for PartialMethodCaller {}

impl WeakCaller for PartialMethodCaller {
    #[inline]
    fn callback(&self, args: &[Value]) -> CallResult<bool> {
        let Some((receiver, func)) = upgrade_pair(&self.receiver, &self.func) else {
            return Ok(true);
        };
        call_with_receiver(
            &func,
            &receiver,
            &self.args,
            prune_args(args, self.max_args),
            &self.keywords,
        )?;
        Ok(false)
    }

    fn slot(&self) -> CallResult<Callable> {
        let (receiver, func) = upgrade_pair(&self.receiver, &self.func).ok_or(CallError::TargetGone(Gone::Object))?;
        let method = (self.rebind)(func, receiver);
        Ok(Callable::Partial(Partial::new(
            method,
            self.args.clone(),
            self.keywords.clone(),
        )))
    }

    fn is_alive(&self) -> bool {
        self.receiver.is_alive() && self.func.is_alive()
    }

    fn max_args(&self) -> Option<usize> {
        self.max_args
    }
}
