use criterion::{criterion_group, criterion_main, Criterion};
use veyra_core::events::LISTENER_TABLE_KEY;
use veyra_core::{EngineHooks, EventDispatcher, FunctionRef, ListRef, ObjectRef, Value};

fn bench_emit(c: &mut Criterion) {
    let dispatcher = EventDispatcher::new(EngineHooks::default());
    let target = ObjectRef::new();
    let table = ObjectRef::new();
    let listeners = ListRef::new();
    for _ in 0..8 {
        listeners.push(Value::Function(FunctionRef::new(|_, _| Ok(Value::Null))));
    }
    table.set("message", Value::List(listeners));
    target.set(LISTENER_TABLE_KEY, Value::Object(table));

    c.bench_function("emit_eight_listeners", |b| {
        b.iter(|| {
            assert!(dispatcher.emit(&target, "message", &[Value::Integer(1)]));
        })
    });
}

criterion_group!(benches, bench_emit);
criterion_main!(benches);
