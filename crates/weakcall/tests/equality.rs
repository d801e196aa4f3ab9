//! Tests for weak caller equality, which dispatchers use to de-duplicate registrations.

use std::rc::Rc;

use weakcall::{Class, Function, Kwargs, ListObject, ObjectRef, Partial, Value, WeakCallable, get_method, weak_partial};

fn two_method_class() -> Rc<Class> {
    Class::new("Pair")
        .method("left", |_, _| Ok(Value::None))
        .method("right", |_, _| Ok(Value::None))
        .build()
}

// =============================================================================
// 1. Same kind
// =============================================================================

/// Two registrations of the same method on the same receiver are equal.
#[test]
fn same_bound_method_is_equal() {
    let obj: ObjectRef = two_method_class().instantiate();
    let a = WeakCallable::create(get_method(&obj, "left").unwrap(), None, None).unwrap();
    let b = WeakCallable::create(get_method(&obj, "left").unwrap(), Some(1), None).unwrap();
    assert_eq!(a, b);
}

/// Different receivers or different functions are not equal.
#[test]
fn different_receiver_or_function_is_not_equal() {
    let class = two_method_class();
    let first: ObjectRef = class.instantiate();
    let second: ObjectRef = class.instantiate();
    let left = WeakCallable::create(get_method(&first, "left").unwrap(), None, None).unwrap();
    assert_ne!(left, WeakCallable::create(get_method(&second, "left").unwrap(), None, None).unwrap());
    assert_ne!(left, WeakCallable::create(get_method(&first, "right").unwrap(), None, None).unwrap());
}

/// Equality is by handle, so it survives the death of the target.
#[test]
fn equality_survives_death() {
    let obj: ObjectRef = two_method_class().instantiate();
    let a = WeakCallable::create(get_method(&obj, "left").unwrap(), None, None).unwrap();
    let b = WeakCallable::create(get_method(&obj, "left").unwrap(), None, None).unwrap();
    drop(obj);
    assert!(!a.is_alive());
    assert_eq!(a, b);
}

/// Builtin callers compare receiver and operation name.
#[test]
fn builtin_methods_compare_name() {
    let list: ObjectRef = ListObject::new(vec![]);
    let append = WeakCallable::create(get_method(&list, "append").unwrap(), None, None).unwrap();
    assert_eq!(append, WeakCallable::create(get_method(&list, "append").unwrap(), None, None).unwrap());
    assert_ne!(append, WeakCallable::create(get_method(&list, "clear").unwrap(), None, None).unwrap());
}

/// Setter callers compare the key.
#[test]
fn setters_compare_key() {
    let obj: ObjectRef = two_method_class().instantiate();
    let set = |key: &str| {
        WeakCallable::create(get_method(&obj, "__setattr__").unwrap(), None, Some(Value::from(key))).unwrap()
    };
    assert_eq!(set("x"), set("x"));
    assert_ne!(set("x"), set("y"));
}

/// Partial method callers ignore the stored arguments.
#[test]
fn partial_methods_ignore_arguments() {
    let obj: ObjectRef = two_method_class().instantiate();
    let with = |arg: i64| {
        let partial = Partial::new(get_method(&obj, "left").unwrap(), vec![Value::Int(arg)], Kwargs::new());
        WeakCallable::create(partial, None, None).unwrap()
    };
    assert_eq!(with(1), with(2));
}

/// Weak partials compare target and every argument handle.
#[test]
fn weak_partials_compare_arguments() {
    let obj: ObjectRef = two_method_class().instantiate();
    let arg: ObjectRef = ListObject::new(vec![]);
    let build = |value: Value| {
        WeakCallable::from(weak_partial(get_method(&obj, "left").unwrap(), vec![value], Kwargs::new()).unwrap())
    };
    assert_eq!(build(Value::Ref(Rc::clone(&arg))), build(Value::Ref(Rc::clone(&arg))));
    assert_ne!(build(Value::Ref(Rc::clone(&arg))), build(Value::Int(1)));
}

// =============================================================================
// 2. Different kinds
// =============================================================================

/// A function caller never equals a method caller, even over the same function.
#[test]
fn kinds_never_compare_equal() {
    let class = two_method_class();
    let obj: ObjectRef = class.instantiate();
    let func = Rc::clone(class.get_method("left").unwrap());
    let function = WeakCallable::create(func, None, None).unwrap();
    let method = WeakCallable::create(get_method(&obj, "left").unwrap(), None, None).unwrap();
    assert_ne!(function, method);

    let standalone = Function::new("left", |_, _| Ok(Value::None));
    assert_ne!(function, WeakCallable::create(standalone, None, None).unwrap());
}
