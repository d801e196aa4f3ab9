//! Tests for the weak caller variants produced by `WeakCallable::create`.
//!
//! While the target is alive, every variant must behave exactly like calling the original
//! callable. Once the target is reclaimed, `callback` reports it dead without raising, and
//! the reconstructing paths fail with a liveness error.

use std::{cell::RefCell, rc::Rc};

use pretty_assertions::assert_eq;
use weakcall::{
    CallError, Callable, CallerKind, Class, ExcType, Function, Gone, Kwargs, ListObject, ObjectRef, Partial,
    Receiver, Value, WeakCallable, get_method, weak_partial,
};

/// A class whose `echo` method returns its positional and keyword arguments as a tuple.
fn echo_class() -> Rc<Class> {
    Class::new("Echo")
        .method("echo", |args, kwargs| {
            let mut out = args[1..].to_vec();
            out.extend(kwargs.values().cloned());
            Ok(Value::Tuple(out))
        })
        .build()
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|&v| Value::Int(v)).collect()
}

fn sum_function() -> Rc<Function> {
    Function::new("total", |args, _| {
        let total = args
            .iter()
            .map(|v| match v {
                Value::Int(i) => *i,
                _ => 0,
            })
            .sum();
        Ok(Value::Int(total))
    })
}

// =============================================================================
// 1. Plain functions
// =============================================================================

/// A function caller returns the same result as calling the function directly.
#[test]
fn function_caller_matches_direct_call() {
    let func = sum_function();
    let caller = WeakCallable::create(Rc::clone(&func), None, None).unwrap();
    assert_eq!(caller.kind(), CallerKind::Function);
    assert_eq!(
        caller.invoke(&ints(&[1, 2, 3])).unwrap(),
        func.call(&ints(&[1, 2, 3]), &Kwargs::new()).unwrap()
    );
    assert_eq!(caller.callback(&ints(&[1])), Ok(false));
}

/// Dropping the only strong reference kills the caller.
#[test]
fn function_caller_dies_with_function() {
    let func = sum_function();
    let caller = WeakCallable::create(Rc::clone(&func), None, None).unwrap();
    assert!(caller.is_alive());

    drop(func);
    assert!(!caller.is_alive());
    assert_eq!(caller.callback(&[]), Ok(true));
    let err = caller.invoke(&[]).unwrap_err();
    assert_eq!(err, CallError::TargetGone(Gone::Function));
    assert_eq!(err.exc_type(), ExcType::RuntimeError);
    assert_eq!(caller.slot().unwrap_err(), CallError::TargetGone(Gone::Function));
}

/// `max_args` truncates the forwarded positional arguments.
#[test]
fn max_args_truncates_arguments() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let func = Function::new("record", move |args, _| {
        sink.borrow_mut().push(args.to_vec());
        Ok(Value::None)
    });
    let caller = WeakCallable::create(Rc::clone(&func), Some(1), None).unwrap();
    assert_eq!(caller.max_args(), Some(1));

    assert_eq!(caller.callback(&ints(&[1, 2, 3])), Ok(false));
    caller.invoke(&ints(&[4, 5])).unwrap();
    assert_eq!(*seen.borrow(), vec![ints(&[1]), ints(&[4])]);
}

/// Errors raised by the target body propagate through `callback`.
#[test]
fn body_errors_propagate_from_callback() {
    let func = Function::new("fail", |_, _| Err(ExcType::type_error("bad input")));
    let caller = WeakCallable::create(Rc::clone(&func), None, None).unwrap();
    let err = caller.callback(&[]).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);
    assert!(!err.is_liveness());
}

/// A strong partial over a plain function is referenced as a whole.
#[test]
fn partial_over_function_is_held_weakly() {
    let partial = Partial::new(sum_function(), ints(&[10]), Kwargs::new());
    let caller = WeakCallable::create(Rc::clone(&partial), None, None).unwrap();
    assert_eq!(caller.kind(), CallerKind::Function);
    assert_eq!(caller.invoke(&ints(&[5])).unwrap(), Value::Int(15));

    drop(partial);
    assert!(!caller.is_alive());
    assert_eq!(caller.callback(&[]), Ok(true));
}

// =============================================================================
// 2. Bound methods
// =============================================================================

/// A bound method caller returns the same result as calling the method directly.
#[test]
fn bound_method_caller_matches_direct_call() {
    let obj: ObjectRef = echo_class().instantiate();
    let method = get_method(&obj, "echo").unwrap();
    let caller = WeakCallable::create(method.clone(), None, None).unwrap();
    assert_eq!(caller.kind(), CallerKind::BoundMethod);
    assert_eq!(
        caller.invoke(&ints(&[1, 2])).unwrap(),
        method.call(&ints(&[1, 2]), &Kwargs::new()).unwrap()
    );
    assert_eq!(caller.slot().unwrap(), method);
}

/// The caller does not keep the receiver alive.
#[test]
fn bound_method_caller_dies_with_receiver() {
    let class = echo_class();
    let obj: ObjectRef = class.instantiate();
    let caller = WeakCallable::create(get_method(&obj, "echo").unwrap(), None, None).unwrap();
    assert_eq!(caller.callback(&[]), Ok(false));

    drop(obj);
    assert!(!caller.is_alive());
    assert_eq!(caller.callback(&ints(&[1])), Ok(true));
    assert_eq!(caller.invoke(&[]).unwrap_err(), CallError::TargetGone(Gone::Object));
}

/// A partial over a bound method holds the receiver weakly and its arguments strongly.
#[test]
fn partial_method_caller_prepends_bound_arguments() {
    let obj: ObjectRef = echo_class().instantiate();
    let mut keywords = Kwargs::new();
    keywords.insert("y".to_owned(), Value::from("y"));
    let partial = Partial::new(get_method(&obj, "echo").unwrap(), ints(&[1]), keywords);
    let caller = WeakCallable::create(Rc::clone(&partial), Some(1), None).unwrap();
    assert_eq!(caller.kind(), CallerKind::PartialMethod);

    let expected = Value::Tuple(vec![Value::Int(1), Value::Int(2), Value::from("y")]);
    assert_eq!(caller.invoke(&ints(&[2, 3])).unwrap(), expected);
    assert_eq!(partial.call(&ints(&[2]), &Kwargs::new()).unwrap(), expected);

    drop(partial);
    assert!(caller.is_alive());
    drop(obj);
    assert_eq!(caller.callback(&[]), Ok(true));
}

/// The rebuilt partial carries the stored arguments.
#[test]
fn partial_method_slot_rebuilds_partial() {
    let obj: ObjectRef = echo_class().instantiate();
    let partial = Partial::new(get_method(&obj, "echo").unwrap(), ints(&[7]), Kwargs::new());
    let caller = WeakCallable::create(partial, None, None).unwrap();
    let Callable::Partial(rebuilt) = caller.slot().unwrap() else {
        panic!("expected a partial");
    };
    assert_eq!(rebuilt.args(), ints(&[7]).as_slice());
    assert_eq!(rebuilt.func(), &get_method(&obj, "echo").unwrap());
}

// =============================================================================
// 3. Builtin methods
// =============================================================================

/// Builtin methods are re-dispatched by name on the weakly-held receiver.
#[test]
fn builtin_method_caller_calls_through_receiver() {
    let list = ListObject::new(ints(&[1, 2, 1]));
    let obj: ObjectRef = list.clone();
    let count = WeakCallable::create(get_method(&obj, "count").unwrap(), None, None).unwrap();
    assert_eq!(count.kind(), CallerKind::BuiltinMethod);
    assert_eq!(count.invoke(&ints(&[1])).unwrap(), Value::Int(2));

    let append = WeakCallable::create(get_method(&obj, "append").unwrap(), Some(1), None).unwrap();
    assert_eq!(append.callback(&ints(&[3, 4])), Ok(false));
    assert_eq!(list.items(), ints(&[1, 2, 1, 3]));

    drop(obj);
    drop(list);
    assert!(!append.is_alive());
    assert_eq!(append.callback(&ints(&[5])), Ok(true));
}

// =============================================================================
// 4. Setters
// =============================================================================

/// `__setattr__` with a key assigns the callback argument to that attribute.
#[test]
fn setattr_caller_assigns_attribute() {
    let obj: ObjectRef = echo_class().instantiate();
    let setattr = get_method(&obj, "__setattr__").unwrap();
    let caller = WeakCallable::create(setattr, None, Some(Value::from("x"))).unwrap();
    assert_eq!(caller.kind(), CallerKind::SetAttr);

    assert_eq!(caller.callback(&ints(&[5])), Ok(false));
    assert_eq!(obj.get_attr("x"), Some(Value::Int(5)));

    assert_eq!(caller.callback(&ints(&[6, 7])), Ok(false));
    assert_eq!(obj.get_attr("x"), Some(Value::Tuple(ints(&[6, 7]))));

    caller.invoke(&ints(&[8])).unwrap();
    assert_eq!(obj.get_attr("x"), Some(Value::Int(8)));

    drop(obj);
    assert_eq!(caller.callback(&ints(&[5])), Ok(true));
}

/// A class-defined `__setattr__` runs for the weak setter exactly as for a direct call.
#[test]
fn setattr_caller_uses_class_method() {
    let class = Class::new("Tagged")
        .method("__setattr__", |args, _| {
            let [this, name, value] = args else {
                return Err(ExcType::type_error("bad args"));
            };
            let tagged = Value::Tuple(vec![Value::from("tagged"), value.clone()]);
            let this = this.as_object().expect("self is an object");
            this.store_attr(name.as_str().unwrap_or("?"), tagged)?;
            Ok(Value::None)
        })
        .build();
    let obj: ObjectRef = class.instantiate();
    let setattr = get_method(&obj, "__setattr__").unwrap();
    let caller = WeakCallable::create(setattr.clone(), None, Some(Value::from("x"))).unwrap();
    assert_eq!(caller.kind(), CallerKind::SetAttr);
    let tagged = |v: i64| Some(Value::Tuple(vec![Value::from("tagged"), Value::Int(v)]));

    setattr.call(&[Value::from("x"), Value::Int(1)], &Kwargs::new()).unwrap();
    assert_eq!(obj.get_attr("x"), tagged(1));

    assert_eq!(caller.callback(&ints(&[2])), Ok(false));
    assert_eq!(obj.get_attr("x"), tagged(2));

    caller.invoke(&ints(&[3])).unwrap();
    assert_eq!(obj.get_attr("x"), tagged(3));

    caller.slot().unwrap().call(&ints(&[4]), &Kwargs::new()).unwrap();
    assert_eq!(obj.get_attr("x"), tagged(4));
}

/// `__setitem__` with a key assigns through item assignment.
#[test]
fn setitem_caller_assigns_index() {
    let list = ListObject::new(ints(&[0, 0, 0]));
    let obj: ObjectRef = list.clone();
    let setitem = get_method(&obj, "__setitem__").unwrap();
    let caller = WeakCallable::create(setitem, Some(1), Some(Value::Int(-1))).unwrap();
    assert_eq!(caller.kind(), CallerKind::SetItem);

    assert_eq!(caller.callback(&ints(&[9, 8])), Ok(false));
    assert_eq!(list.items(), ints(&[0, 0, 9]));

    drop(obj);
    drop(list);
    assert!(!caller.is_alive());
    assert_eq!(caller.callback(&ints(&[1])), Ok(true));
}

/// A user class's `__setitem__` is a bound method, so it becomes a setter too.
#[test]
fn setitem_caller_uses_class_method() {
    let store = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&store);
    let class = Class::new("Store")
        .method("__setitem__", move |args, _| {
            sink.borrow_mut().push((args[1].clone(), args[2].clone()));
            Ok(Value::None)
        })
        .build();
    let obj: ObjectRef = class.instantiate();
    let caller = WeakCallable::create(get_method(&obj, "__setitem__").unwrap(), None, Some(Value::from("k"))).unwrap();
    assert_eq!(caller.kind(), CallerKind::SetItem);
    caller.callback(&ints(&[3])).unwrap();
    assert_eq!(*store.borrow(), vec![(Value::from("k"), Value::Int(3))]);
}

/// The setter slot is a partial over the receiver's setter with the key pre-bound.
#[test]
fn setter_slot_is_partial_over_builtin() {
    let obj: ObjectRef = echo_class().instantiate();
    let caller = WeakCallable::create(get_method(&obj, "__setattr__").unwrap(), None, Some(Value::from("x"))).unwrap();
    let slot = caller.slot().unwrap();
    slot.call(&[Value::from("hello")], &Kwargs::new()).unwrap();
    assert_eq!(obj.get_attr("x"), Some(Value::from("hello")));
}

// =============================================================================
// 5. Every variant after release
// =============================================================================

/// Creates a caller of the given kind whose only strong owners are dropped on return.
fn released_caller(kind: CallerKind) -> WeakCallable {
    let func = sum_function();
    let obj: ObjectRef = echo_class().instantiate();
    let list: ObjectRef = ListObject::new(ints(&[0]));
    let (callable, key) = match kind {
        CallerKind::Function => (Callable::from(Rc::clone(&func)), None),
        CallerKind::BoundMethod => (get_method(&obj, "echo").unwrap(), None),
        CallerKind::BuiltinMethod => (get_method(&list, "append").unwrap(), None),
        CallerKind::PartialMethod => (
            Callable::from(Partial::new(get_method(&obj, "echo").unwrap(), ints(&[1]), Kwargs::new())),
            None,
        ),
        CallerKind::SetAttr => (get_method(&obj, "__setattr__").unwrap(), Some(Value::from("x"))),
        CallerKind::SetItem => (get_method(&list, "__setitem__").unwrap(), Some(Value::Int(0))),
        CallerKind::WeakPartial => (
            Callable::from(weak_partial(get_method(&obj, "echo").unwrap(), ints(&[1]), Kwargs::new()).unwrap()),
            None,
        ),
    };
    let caller = WeakCallable::create(callable, None, key).unwrap();
    assert_eq!(caller.kind(), kind);
    assert!(caller.is_alive(), "{kind} should be alive before release");
    caller
}

/// Once released, every variant reports dead, prunes from `callback`, and fails to invoke.
#[test]
fn every_variant_dies_with_its_target() {
    let cases = [
        (CallerKind::Function, Gone::Function),
        (CallerKind::BoundMethod, Gone::Object),
        (CallerKind::BuiltinMethod, Gone::Object),
        (CallerKind::PartialMethod, Gone::Object),
        (CallerKind::SetAttr, Gone::Object),
        (CallerKind::SetItem, Gone::Object),
        (CallerKind::WeakPartial, Gone::Object),
    ];
    for (kind, gone) in cases {
        let caller = released_caller(kind);
        assert!(!caller.is_alive(), "{kind} outlived its target");
        assert_eq!(caller.callback(&ints(&[1])), Ok(true), "{kind} callback");
        assert_eq!(caller.invoke(&ints(&[1])).unwrap_err(), CallError::TargetGone(gone), "{kind} invoke");
    }
}
