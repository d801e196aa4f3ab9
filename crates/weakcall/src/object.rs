//! Concrete receivers: user classes and their instances, plus list and dict builtins.
//!
//! These give callbacks something real to bind to. Instances and lists support weak
//! references; dicts do not (as with Python's builtin `dict`), which exercises the
//! strong-capture fallback.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{
    error::{CallError, CallResult, ExcType},
    function::Function,
    value::{Kwargs, MethodLookup, ObjectRef, Receiver, Value, call_setter_builtin},
};

/// A user-defined class: a name, a method table, and whether instances are weak-referenceable.
#[derive(Debug)]
pub struct Class {
    name: String,
    methods: IndexMap<String, Rc<Function>>,
    weak_referenceable: bool,
}

impl Class {
    /// Starts building a class with no methods.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: IndexMap::new(),
            weak_referenceable: true,
        }
    }

    /// Adds a method. The body receives the instance as its first positional argument.
    #[must_use]
    pub fn method(
        mut self,
        name: &str,
        body: impl Fn(&[Value], &Kwargs) -> CallResult<Value> + 'static,
    ) -> Self {
        let qualname = format!("{}.{name}", self.name);
        self.methods
            .insert(name.to_owned(), Function::with_qualname(name, qualname, body));
        self
    }

    /// Makes instances refuse weak references, like a class with `__slots__` and no `__weakref__`.
    #[must_use]
    pub fn without_weakref(mut self) -> Self {
        self.weak_referenceable = false;
        self
    }

    /// Finishes the class.
    #[must_use]
    pub fn build(self) -> Rc<Self> {
        Rc::new(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the function stored under `name`, if any.
    #[must_use]
    pub fn get_method(&self, name: &str) -> Option<&Rc<Function>> {
        self.methods.get(name)
    }

    /// Creates a new, attribute-less instance of this class.
    #[must_use]
    pub fn instantiate(self: &Rc<Self>) -> Rc<Instance> {
        Instance::new(self)
    }
}

/// An instance of a user-defined [`Class`] with a mutable attribute dict.
#[derive(Debug)]
pub struct Instance {
    class: Rc<Class>,
    attrs: RefCell<IndexMap<String, Value>>,
}

impl Instance {
    #[must_use]
    pub fn new(class: &Rc<Class>) -> Rc<Self> {
        Rc::new(Self {
            class: Rc::clone(class),
            attrs: RefCell::new(IndexMap::new()),
        })
    }

    #[must_use]
    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }
}

impl Receiver for Instance {
    fn type_name(&self) -> &str {
        &self.class.name
    }

    fn weak_referenceable(&self) -> bool {
        self.class.weak_referenceable
    }

    fn get_attr(&self, name: &str) -> Option<Value> {
        self.attrs.borrow().get(name).cloned()
    }

    /// Routes through the class `__setattr__` when one is defined.
    fn set_attr(&self, this: &ObjectRef, name: &str, value: Value) -> CallResult<()> {
        let Some(setattr) = self.class.get_method("__setattr__") else {
            return self.store_attr(name, value);
        };
        setattr.call(&[Value::Ref(Rc::clone(this)), Value::from(name), value], &Kwargs::new())?;
        Ok(())
    }

    fn store_attr(&self, name: &str, value: Value) -> CallResult<()> {
        self.attrs.borrow_mut().insert(name.to_owned(), value);
        Ok(())
    }

    fn set_item(&self, this: &ObjectRef, key: Value, value: Value) -> CallResult<()> {
        let Some(setitem) = self.class.get_method("__setitem__") else {
            return Err(ExcType::type_error_not_sub_assignment(&self.class.name));
        };
        setitem.call(&[Value::Ref(Rc::clone(this)), key, value], &Kwargs::new())?;
        Ok(())
    }

    fn find_method(&self, name: &str) -> MethodLookup {
        match self.class.get_method(name) {
            Some(func) => MethodLookup::Function(Rc::clone(func)),
            None => match name {
                "__setattr__" | "__setitem__" => MethodLookup::Builtin,
                _ => MethodLookup::Missing,
            },
        }
    }
}

/// A mutable list with natively implemented methods.
#[derive(Debug, Default)]
pub struct ListObject {
    items: RefCell<Vec<Value>>,
}

impl ListObject {
    const BUILTINS: [&'static str; 6] = ["append", "count", "extend", "remove", "clear", "__len__"];

    #[must_use]
    pub fn new(items: Vec<Value>) -> Rc<Self> {
        Rc::new(Self {
            items: RefCell::new(items),
        })
    }

    /// Returns a snapshot of the current items.
    #[must_use]
    pub fn items(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl Receiver for ListObject {
    fn type_name(&self) -> &str {
        "list"
    }

    fn set_item(&self, _this: &ObjectRef, key: Value, value: Value) -> CallResult<()> {
        let Value::Int(index) = key else {
            return Err(ExcType::type_error(format!(
                "list indices must be integers, not {}",
                key.type_name()
            )));
        };
        let mut items = self.items.borrow_mut();
        let len = items.len();
        let resolved = if index < 0 {
            usize::try_from(index.unsigned_abs()).ok().and_then(|back| len.checked_sub(back))
        } else {
            usize::try_from(index).ok().filter(|&i| i < len)
        };
        match resolved {
            Some(i) => {
                items[i] = value;
                Ok(())
            }
            None => Err(CallError::exception(
                ExcType::IndexError,
                "list assignment index out of range",
            )),
        }
    }

    fn find_method(&self, name: &str) -> MethodLookup {
        if Self::BUILTINS.contains(&name) || matches!(name, "__setattr__" | "__setitem__") {
            MethodLookup::Builtin
        } else {
            MethodLookup::Missing
        }
    }

    fn call_builtin(&self, this: &ObjectRef, name: &str, args: &[Value], _kwargs: &Kwargs) -> CallResult<Value> {
        match name {
            "append" => {
                let [item] = args else {
                    return Err(ExcType::type_error_arg_count("list.append", 1, args.len()));
                };
                self.items.borrow_mut().push(item.clone());
                Ok(Value::None)
            }
            "count" => {
                let [item] = args else {
                    return Err(ExcType::type_error_arg_count("list.count", 1, args.len()));
                };
                let count = self.items.borrow().iter().filter(|v| *v == item).count();
                Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
            }
            "extend" => {
                let [iterable] = args else {
                    return Err(ExcType::type_error_arg_count("list.extend", 1, args.len()));
                };
                let Value::Tuple(items) = iterable else {
                    return Err(ExcType::type_error(format!(
                        "'{}' object is not iterable",
                        iterable.type_name()
                    )));
                };
                self.items.borrow_mut().extend(items.iter().cloned());
                Ok(Value::None)
            }
            "remove" => {
                let [item] = args else {
                    return Err(ExcType::type_error_arg_count("list.remove", 1, args.len()));
                };
                let mut items = self.items.borrow_mut();
                let Some(pos) = items.iter().position(|v| v == item) else {
                    return Err(CallError::exception(ExcType::ValueError, "list.remove(x): x not in list"));
                };
                items.remove(pos);
                Ok(Value::None)
            }
            "clear" => {
                self.items.borrow_mut().clear();
                Ok(Value::None)
            }
            "__len__" => Ok(Value::Int(i64::try_from(self.len()).unwrap_or(i64::MAX))),
            _ => call_setter_builtin(this, name, args),
        }
    }
}

/// A mapping keyed by any hashable [`Value`].
///
/// Like Python's builtin `dict`, it cannot be weakly referenced.
#[derive(Debug, Default)]
pub struct DictObject {
    entries: RefCell<IndexMap<Value, Value, ahash::RandomState>>,
}

impl DictObject {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Returns a clone of the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Receiver for DictObject {
    fn type_name(&self) -> &str {
        "dict"
    }

    fn weak_referenceable(&self) -> bool {
        false
    }

    fn set_item(&self, _this: &ObjectRef, key: Value, value: Value) -> CallResult<()> {
        self.entries.borrow_mut().insert(key, value);
        Ok(())
    }

    fn find_method(&self, name: &str) -> MethodLookup {
        match name {
            "get" | "__getitem__" | "__len__" | "__setattr__" | "__setitem__" => MethodLookup::Builtin,
            _ => MethodLookup::Missing,
        }
    }

    fn call_builtin(&self, this: &ObjectRef, name: &str, args: &[Value], _kwargs: &Kwargs) -> CallResult<Value> {
        match name {
            "get" => match args {
                [key] => Ok(self.get(key).unwrap_or(Value::None)),
                [key, default] => Ok(self.get(key).unwrap_or_else(|| default.clone())),
                _ => Err(ExcType::type_error(format!(
                    "get expected at most 2 arguments, got {}",
                    args.len()
                ))),
            },
            "__getitem__" => {
                let [key] = args else {
                    return Err(ExcType::type_error_arg_count("__getitem__", 1, args.len()));
                };
                self.get(key).ok_or_else(|| ExcType::key_error(key.repr()))
            }
            "__len__" => Ok(Value::Int(i64::try_from(self.len()).unwrap_or(i64::MAX))),
            _ => call_setter_builtin(this, name, args),
        }
    }
}
