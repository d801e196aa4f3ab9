use std::{
    fmt::{self, Write},
    hash::{Hash, Hasher},
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{
    callable::Callable,
    error::{CallResult, ExcType},
    function::Function,
};

/// Keyword arguments in call-site order.
pub type Kwargs = IndexMap<String, Value>;

/// Shared handle to a heap object.
///
/// Receivers are always held behind `Rc` so that callers can downgrade them to weak
/// handles; the object itself decides whether that is allowed via
/// [`Receiver::weak_referenceable`].
pub type ObjectRef = Rc<dyn Receiver>;

/// A dynamically-typed value passed to and returned from callbacks.
///
/// Primitive variants compare by value. `Ref` and `Callable` compare by identity, the way
/// Python compares objects without a custom `__eq__`.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<Self>),
    /// A shared heap object (instance, list, dict, ...).
    Ref(ObjectRef),
    /// Any callable shape, including already-wrapped weak callables.
    Callable(Callable),
}

impl Value {
    /// Returns the Python-style type name used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Tuple(_) => "tuple",
            Self::Ref(obj) => obj.type_name(),
            Self::Callable(callable) => callable.type_name(),
        }
    }

    /// Returns the referenced object for `Ref` values.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Ref(obj) => Some(obj),
            _ => None,
        }
    }

    /// Returns the string payload for `Str` values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this value refers to the same heap object as `obj`.
    #[must_use]
    pub fn is_object(&self, obj: &ObjectRef) -> bool {
        self.as_object().is_some_and(|this| same_object(this, obj))
    }

    /// Writes a Python-like repr of the value.
    pub fn repr_fmt(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Str(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Self::Tuple(items) => {
                f.write_char('(')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.repr_fmt(f)?;
                }
                if items.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            Self::Ref(obj) => write!(f, "<{} object at {:p}>", obj.type_name(), Rc::as_ptr(obj).cast::<()>()),
            Self::Callable(callable) => match callable.qualname() {
                Some(name) => write!(f, "<{} {name}>", callable.type_name()),
                None => write!(f, "<{}>", callable.type_name()),
            },
        }
    }

    /// Returns the repr as an owned string.
    #[must_use]
    pub fn repr(&self) -> String {
        let mut s = String::new();
        // writing to a String cannot fail
        let _ = self.repr_fmt(&mut s);
        s
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            // bitwise so that `Eq` and `Hash` stay consistent
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => same_object(a, b),
            (Self::Callable(a), Self::Callable(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::None => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Str(s) => s.hash(state),
            Self::Tuple(items) => items.hash(state),
            Self::Ref(obj) => Rc::as_ptr(obj).cast::<()>().hash(state),
            Self::Callable(callable) => callable.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            other => other.repr_fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Self::Ref(value)
    }
}

impl From<Callable> for Value {
    fn from(value: Callable) -> Self {
        Self::Callable(value)
    }
}

/// Returns true if both handles point at the same heap object.
///
/// Compares data addresses only; vtable pointers of `dyn Receiver` may differ between
/// codegen units for the same object.
#[must_use]
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Result of looking up a method name on a receiver.
#[derive(Debug, Clone)]
pub enum MethodLookup {
    /// A user-defined function from the receiver's class; binding it yields a bound method.
    Function(Rc<Function>),
    /// An operation implemented natively by the receiver, re-fetched by name on each call.
    Builtin,
    /// No such method.
    Missing,
}

/// Behaviour of a heap object that callbacks can target.
///
/// `this` parameters receive the `Rc` that owns `self`, so implementations can pass the
/// object itself on to user functions (e.g. as `self` for a class-defined `__setitem__`).
pub trait Receiver: fmt::Debug {
    /// Python-style type name of the object.
    fn type_name(&self) -> &str;

    /// Whether the object supports weak references.
    ///
    /// Objects that opt out are captured strongly (subject to the configured fallback policy).
    fn weak_referenceable(&self) -> bool {
        true
    }

    /// Reads an attribute.
    fn get_attr(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Assigns an attribute the way `setattr(obj, name, value)` does.
    ///
    /// Receivers with a user-level `__setattr__` dispatch to it; the default stores directly.
    fn set_attr(&self, _this: &ObjectRef, name: &str, value: Value) -> CallResult<()> {
        self.store_attr(name, value)
    }

    /// Stores an attribute without any user-level hook, like `object.__setattr__`.
    fn store_attr(&self, name: &str, _value: Value) -> CallResult<()> {
        Err(ExcType::attribute_error(self.type_name(), name))
    }

    /// Assigns `self[key] = value`.
    fn set_item(&self, _this: &ObjectRef, _key: Value, _value: Value) -> CallResult<()> {
        Err(ExcType::type_error_not_sub_assignment(self.type_name()))
    }

    /// Looks up a method by name.
    ///
    /// Every receiver exposes `__setattr__` and `__setitem__` as builtins.
    fn find_method(&self, name: &str) -> MethodLookup {
        match name {
            "__setattr__" | "__setitem__" => MethodLookup::Builtin,
            _ => MethodLookup::Missing,
        }
    }

    /// Calls a builtin method by name.
    fn call_builtin(&self, this: &ObjectRef, name: &str, args: &[Value], _kwargs: &Kwargs) -> CallResult<Value> {
        call_setter_builtin(this, name, args)
    }
}

/// Shared implementation of the `__setattr__` / `__setitem__` builtins.
///
/// Receivers that override [`Receiver::call_builtin`] fall back to this for names they do
/// not handle themselves.
pub fn call_setter_builtin(this: &ObjectRef, name: &str, args: &[Value]) -> CallResult<Value> {
    match name {
        "__setattr__" => {
            let [attr, value] = args else {
                return Err(ExcType::type_error_arg_count("__setattr__", 2, args.len()));
            };
            let Some(attr) = attr.as_str() else {
                return Err(ExcType::type_error(format!(
                    "attribute name must be string, not '{}'",
                    attr.type_name()
                )));
            };
            this.store_attr(attr, value.clone())?;
            Ok(Value::None)
        }
        "__setitem__" => {
            let [key, value] = args else {
                return Err(ExcType::type_error_arg_count("__setitem__", 2, args.len()));
            };
            this.set_item(this, key.clone(), value.clone())?;
            Ok(Value::None)
        }
        _ => Err(ExcType::attribute_error(this.type_name(), name)),
    }
}
