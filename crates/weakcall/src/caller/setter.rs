use super::{WeakCaller, prune_args};
use crate::{
    callable::{Callable, Partial, get_method},
    config::CaptureOptions,
    error::{CallError, CallResult, Gone},
    handle::{ObjectHandle, capture_object},
    value::{Kwargs, ObjectRef, Value},
};

/// Value assigned by a setter callback: the single argument, or all arguments as a tuple.
fn assigned_value(args: &[Value]) -> Value {
    match args {
        [value] => value.clone(),
        _ => Value::Tuple(args.to_vec()),
    }
}

/// Builds `partial(receiver.<setter>, key)`, using the receiver's own override if it has one.
fn setter_slot(receiver: &ObjectHandle, setter: &str, key: Value) -> CallResult<Callable> {
    let receiver = receiver.upgrade().ok_or(CallError::TargetGone(Gone::Object))?;
    let method = get_method(&receiver, setter)?;
    Ok(Callable::Partial(Partial::new(method, vec![key], Kwargs::new())))
}

/// Caller that assigns its argument to an attribute of a weakly-held object.
#[derive(Debug, Clone)]
pub struct SetAttrCaller {
    receiver: ObjectHandle,
    attr: String,
    max_args: Option<usize>,
}

impl SetAttrCaller {
    pub fn new(receiver: &ObjectRef, attr: &str, options: &CaptureOptions) -> CallResult<Self> {
        Ok(Self::from_handle(
            capture_object(receiver, options.fallback, "receiver")?,
            attr,
            options.max_args,
        ))
    }

    /// Builds a caller around an existing handle.
    #[must_use]
    pub fn from_handle(receiver: ObjectHandle, attr: &str, max_args: Option<usize>) -> Self {
        Self {
            receiver,
            attr: attr.to_owned(),
            max_args,
        }
    }

    #[must_use]
    pub fn attr(&self) -> &str {
        &self.attr
    }
}

impl PartialEq for SetAttrCaller {
    fn eq(&self, other: &Self) -> bool {
        self.receiver == other.receiver && self.attr == other.attr
    }
}

impl Eq for SetAttrCaller {}

impl WeakCaller for SetAttrCaller {
    #[inline]
    fn callback(&self, args: &[Value]) -> CallResult<bool> {
        let Some(receiver) = self.receiver.upgrade() else {
            return Ok(true);
        };
        receiver.set_attr(&receiver, &self.attr, assigned_value(prune_args(args, self.max_args)))?;
        Ok(false)
    }

    fn slot(&self) -> CallResult<Callable> {
        setter_slot(&self.receiver, "__setattr__", Value::Str(self.attr.clone()))
    }

    fn is_alive(&self) -> bool {
        self.receiver.is_alive()
    }

    fn max_args(&self) -> Option<usize> {
        self.max_args
    }
}

/// Caller that assigns its argument to `obj[key]` on a weakly-held object.
#[derive(Debug, Clone)]
pub struct SetItemCaller {
    receiver: ObjectHandle,
    key: Value,
    max_args: Option<usize>,
}

impl SetItemCaller {
    pub fn new(receiver: &ObjectRef, key: Value, options: &CaptureOptions) -> CallResult<Self> {
        Ok(Self::from_handle(
            capture_object(receiver, options.fallback, "receiver")?,
            key,
            options.max_args,
        ))
    }

    /// Builds a caller around an existing handle.
    #[must_use]
    pub fn from_handle(receiver: ObjectHandle, key: Value, max_args: Option<usize>) -> Self {
        Self { receiver, key, max_args }
    }

    #[must_use]
    pub fn key(&self) -> &Value {
        &self.key
    }
}

impl PartialEq for SetItemCaller {
    fn eq(&self, other: &Self) -> bool {
        self.receiver == other.receiver && self.key == other.key
    }
}

impl Eq for SetItemCaller {}

impl WeakCaller for SetItemCaller {
    #[inline]
    fn callback(&self, args: &[Value]) -> CallResult<bool> {
        let Some(receiver) = self.receiver.upgrade() else {
            return Ok(true);
        };
        let value = assigned_value(prune_args(args, self.max_args));
        receiver.set_item(&receiver, self.key.clone(), value)?;
        Ok(false)
    }

    fn slot(&self) -> CallResult<Callable> {
        setter_slot(&self.receiver, "__setitem__", self.key.clone())
    }

    fn is_alive(&self) -> bool {
        self.receiver.is_alive()
    }

    fn max_args(&self) -> Option<usize> {
        self.max_args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_argument_is_assigned_directly() {
        assert_eq!(assigned_value(&[Value::Int(5)]), Value::Int(5));
        assert_eq!(
            assigned_value(&[Value::Int(1), Value::Int(2)]),
            Value::Tuple(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(assigned_value(&[]), Value::Tuple(vec![]));
    }
}
