#![doc = include_str!("../../../README.md")]

mod callable;
mod caller;
mod config;
mod error;
mod function;
mod handle;
mod object;
mod partial;
mod value;

pub use crate::{
    callable::{BoundMethod, BuiltinMethod, Callable, Partial, call_value, get_method},
    caller::{
        BoundMethodCaller, BuiltinMethodCaller, CallerKind, FunctionCaller, FunctionTarget, PartialMethodCaller,
        Rebind, SetAttrCaller, SetItemCaller, WeakCallable, WeakCaller,
    },
    config::{CaptureOptions, DEFAULT_STRONG_QUALNAMES, StrongCapturePolicy, StrongFallback},
    error::{ArgPosition, CallError, CallResult, ExcType, Gone},
    function::{Function, LAMBDA_NAME},
    handle::{ObjectHandle, ValueHandle, WeakHandle},
    object::{Class, DictObject, Instance, ListObject},
    partial::{WeakPartial, weak_partial, weak_partial_value},
    value::{Kwargs, MethodLookup, ObjectRef, Receiver, Value, call_setter_builtin, same_object},
};
