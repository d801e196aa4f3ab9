use std::rc::Rc;

// Use codspeed-criterion-compat when running on CodSpeed (CI), real criterion otherwise (for flamegraphs)
#[cfg(codspeed)]
use codspeed_criterion_compat::{Criterion, black_box, criterion_group, criterion_main};
#[cfg(not(codspeed))]
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use weakcall::{
    Callable, Class, Function, Kwargs, ListObject, ObjectRef, Partial, Value, WeakCallable, get_method, weak_partial,
};

fn counter_class() -> Rc<Class> {
    Class::new("Counter")
        .method("on_event", |args, _| Ok(args.get(1).cloned().unwrap_or(Value::None)))
        .build()
}

/// Runs `callback` in a loop, asserting the target stays alive.
fn bench_callback(c: &mut Criterion, name: &str, caller: &WeakCallable) {
    let args = [Value::Int(1), Value::Int(2), Value::from("payload")];
    assert_eq!(caller.callback(&args), Ok(false));
    c.bench_function(name, |b| {
        b.iter(|| black_box(caller.callback(black_box(&args))));
    });
}

/// The dispatch-loop entry point for every variant, with the target alive.
fn callback_alive(c: &mut Criterion) {
    let obj: ObjectRef = counter_class().instantiate();
    let list = ListObject::new(vec![]);
    let list_ref: ObjectRef = list.clone();
    let func = Function::new("handler", |args, _| Ok(Value::Int(i64::try_from(args.len()).unwrap_or(0))));
    let method = get_method(&obj, "on_event").unwrap();

    let function = WeakCallable::create(Rc::clone(&func), None, None).unwrap();
    bench_callback(c, "callback__function", &function);

    let bound = WeakCallable::create(method.clone(), Some(1), None).unwrap();
    bench_callback(c, "callback__bound_method", &bound);

    let partial = Partial::new(method.clone(), vec![Value::Int(0)], Kwargs::new());
    let partial_method = WeakCallable::create(Rc::clone(&partial), Some(1), None).unwrap();
    bench_callback(c, "callback__partial_method", &partial_method);

    let setattr = WeakCallable::create(get_method(&obj, "__setattr__").unwrap(), Some(1), Some(Value::from("x"))).unwrap();
    bench_callback(c, "callback__setattr", &setattr);

    let count = WeakCallable::create(get_method(&list_ref, "count").unwrap(), Some(1), None).unwrap();
    bench_callback(c, "callback__builtin_method", &count);

    let weak = WeakCallable::from(weak_partial(method, vec![Value::Ref(Rc::clone(&list_ref))], Kwargs::new()).unwrap());
    bench_callback(c, "callback__weak_partial", &weak);

    // reconstructing path for comparison
    c.bench_function("invoke__bound_method", |b| {
        let args = [Value::Int(1)];
        b.iter(|| black_box(bound.invoke(black_box(&args))));
    });
    c.bench_function("call__strong_method", |b| {
        let direct: Callable = get_method(&obj, "on_event").unwrap();
        let args = [Value::Int(1)];
        b.iter(|| black_box(direct.call(black_box(&args), &Kwargs::new())));
    });
    drop(list);
}

/// `callback` on a dead target: the cost a dispatch loop pays before pruning.
fn callback_dead(c: &mut Criterion) {
    let obj: ObjectRef = counter_class().instantiate();
    let caller = WeakCallable::create(get_method(&obj, "on_event").unwrap(), None, None).unwrap();
    drop(obj);
    assert_eq!(caller.callback(&[]), Ok(true));
    let args: &[Value] = &[];
    c.bench_function("callback__dead", |b| {
        b.iter(|| black_box(caller.callback(black_box(args))));
    });
}

criterion_group!(benches, callback_alive, callback_dead);
criterion_main!(benches);
