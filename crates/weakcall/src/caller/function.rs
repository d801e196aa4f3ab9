use std::rc::Rc;

use super::{WeakCaller, prune_args};
use crate::{
    callable::{Callable, Partial},
    config::CaptureOptions,
    error::{CallError, CallResult, Gone},
    function::Function,
    handle::WeakHandle,
    value::{Kwargs, Value},
};

/// What a [`FunctionCaller`] points at.
///
/// Partials that do not wrap a bound method are referenced as a whole, like any other
/// callable object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionTarget {
    Function(WeakHandle<Function>),
    Partial(WeakHandle<Partial>),
}

/// Caller of a plain function.
///
/// Holds the function weakly unless the strong-capture policy names it (anonymous
/// functions and signal emitters by default).
#[derive(Debug, Clone)]
pub struct FunctionCaller {
    target: FunctionTarget,
    max_args: Option<usize>,
}

impl FunctionCaller {
    #[must_use]
    pub fn new(func: &Rc<Function>, options: &CaptureOptions) -> Self {
        let handle = if options.strong_capture.matches(func) {
            WeakHandle::strong(Rc::clone(func))
        } else {
            WeakHandle::weak(func)
        };
        Self {
            target: FunctionTarget::Function(handle),
            max_args: options.max_args,
        }
    }

    #[must_use]
    pub fn from_partial(partial: &Rc<Partial>, max_args: Option<usize>) -> Self {
        Self {
            target: FunctionTarget::Partial(WeakHandle::weak(partial)),
            max_args,
        }
    }

    #[must_use]
    pub fn target(&self) -> &FunctionTarget {
        &self.target
    }
}

impl PartialEq for FunctionCaller {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl Eq for FunctionCaller {}

impl WeakCaller for FunctionCaller {
    #[inline]
    fn callback(&self, args: &[Value]) -> CallResult<bool> {
        let args = prune_args(args, self.max_args);
        match &self.target {
            FunctionTarget::Function(handle) => {
                let Some(func) = handle.upgrade() else {
                    return Ok(true);
                };
                func.call(args, &Kwargs::new())?;
            }
            FunctionTarget::Partial(handle) => {
                let Some(partial) = handle.upgrade() else {
                    return Ok(true);
                };
                partial.call(args, &Kwargs::new())?;
            }
        }
        Ok(false)
    }

    fn slot(&self) -> CallResult<Callable> {
        match &self.target {
            FunctionTarget::Function(handle) => handle
                .upgrade()
                .map(Callable::Function)
                .ok_or(CallError::TargetGone(Gone::Function)),
            FunctionTarget::Partial(handle) => handle
                .upgrade()
                .map(Callable::Partial)
                .ok_or(CallError::TargetGone(Gone::Function)),
        }
    }

    fn is_alive(&self) -> bool {
        match &self.target {
            FunctionTarget::Function(handle) => handle.is_alive(),
            FunctionTarget::Partial(handle) => handle.is_alive(),
        }
    }

    fn max_args(&self) -> Option<usize> {
        self.max_args
    }
}
