//=============================================
// tests/events_emit.rs
//=============================================
// Purpose: Validate the dispatcher contract against live listener tables.
//=============================================

use std::cell::RefCell;
use std::rc::Rc;

use veyra_core::events::LISTENER_TABLE_KEY;
use veyra_core::{
    EngineHooks, EventDispatcher, FunctionRef, ListRef, ObjectRef, Value, VeyraError,
};

type CallLog = Rc<RefCell<Vec<&'static str>>>;

fn emitter() -> (EventDispatcher, ObjectRef, ObjectRef) {
    let dispatcher = EventDispatcher::new(EngineHooks::default());
    let target = ObjectRef::new();
    let table = ObjectRef::new();
    target.set(LISTENER_TABLE_KEY, Value::Object(table.clone()));
    (dispatcher, target, table)
}

fn logging_listener(log: &CallLog, name: &'static str) -> Value {
    let log = log.clone();
    Value::Function(FunctionRef::new(move |_, _| {
        log.borrow_mut().push(name);
        Ok(Value::Null)
    }))
}

fn failing_listener(log: &CallLog, name: &'static str, message: &'static str) -> Value {
    let log = log.clone();
    Value::Function(FunctionRef::new(move |_, _| {
        log.borrow_mut().push(name);
        Err(VeyraError::exception(message))
    }))
}

#[test]
fn single_listener_runs_once_with_args_and_receiver() {
    let (dispatcher, target, table) = emitter();
    let seen: Rc<RefCell<Vec<(ObjectRef, Vec<Value>)>>> = Rc::new(RefCell::new(Vec::new()));
    let witness = seen.clone();
    table.set(
        "message",
        Value::Function(FunctionRef::new(move |receiver, args| {
            witness.borrow_mut().push((receiver.clone(), args.to_vec()));
            Ok(Value::Null)
        })),
    );

    let args = [Value::Integer(7), Value::String("payload".into())];
    assert!(dispatcher.emit(&target, "message", &args));

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1, "expected one invocation; got {}", seen.len());
    assert_eq!(seen[0].0, target, "listener must receive the emitter");
    assert_eq!(seen[0].1, args.to_vec());
}

#[test]
fn listener_list_runs_in_index_order() {
    let (dispatcher, target, table) = emitter();
    let log: CallLog = Rc::new(RefCell::new(Vec::new()));
    let listeners = ListRef::new();
    listeners.push(logging_listener(&log, "first"));
    listeners.push(logging_listener(&log, "second"));
    listeners.push(logging_listener(&log, "third"));
    table.set("message", Value::List(listeners));

    assert!(dispatcher.emit(&target, "message", &[]));
    assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn mutation_during_dispatch_does_not_change_the_current_emit() {
    let (dispatcher, target, table) = emitter();
    let log: CallLog = Rc::new(RefCell::new(Vec::new()));
    let listeners = ListRef::new();

    // The first listener unregisters the third mid-dispatch.
    {
        let log = log.clone();
        let listeners_handle = listeners.clone();
        listeners.push(Value::Function(FunctionRef::new(move |_, _| {
            log.borrow_mut().push("first");
            listeners_handle.remove(2);
            Ok(Value::Null)
        })));
    }
    listeners.push(logging_listener(&log, "second"));
    listeners.push(logging_listener(&log, "third"));
    table.set("message", Value::List(listeners.clone()));

    assert!(dispatcher.emit(&target, "message", &[]));
    assert_eq!(
        *log.borrow(),
        vec!["first", "second", "third"],
        "every listener present at emit time must run"
    );
    assert_eq!(listeners.len(), 2, "the removal itself must stick");

    log.borrow_mut().clear();
    assert!(dispatcher.emit(&target, "message", &[]));
    assert_eq!(
        *log.borrow(),
        vec!["first", "second"],
        "later emits must observe the mutation"
    );
}

#[test]
fn failing_listener_stops_the_rest_and_reports_synchronously() {
    let hooks = EngineHooks::default();
    let reports: Rc<RefCell<Vec<(String, bool)>>> = Rc::new(RefCell::new(Vec::new()));
    {
        let reports = reports.clone();
        hooks.set_fatal(move |error, async_context| {
            reports.borrow_mut().push((error.to_string(), async_context));
        });
    }
    let dispatcher = EventDispatcher::new(hooks);
    let target = ObjectRef::new();
    let table = ObjectRef::new();
    target.set(LISTENER_TABLE_KEY, Value::Object(table.clone()));

    let log: CallLog = Rc::new(RefCell::new(Vec::new()));
    let listeners = ListRef::new();
    listeners.push(logging_listener(&log, "first"));
    listeners.push(failing_listener(&log, "second", "listener blew up"));
    listeners.push(logging_listener(&log, "third"));
    table.set("message", Value::List(listeners));

    assert!(!dispatcher.emit(&target, "message", &[]));
    assert_eq!(
        *log.borrow(),
        vec!["first", "second"],
        "listeners after the failure must not run"
    );
    assert_eq!(
        *reports.borrow(),
        vec![("listener blew up".to_string(), false)],
        "dispatcher failures report with async_context = false"
    );
}

#[test]
fn non_callable_entries_are_skipped_without_error() {
    let (dispatcher, target, table) = emitter();
    let log: CallLog = Rc::new(RefCell::new(Vec::new()));
    let listeners = ListRef::new();
    listeners.push(Value::Integer(13));
    listeners.push(logging_listener(&log, "only"));
    listeners.push(Value::Null);
    table.set("message", Value::List(listeners));

    assert!(dispatcher.emit(&target, "message", &[]));
    assert_eq!(*log.borrow(), vec!["only"]);
}

#[test]
fn list_without_any_callable_returns_false() {
    let (dispatcher, target, table) = emitter();
    let listeners = ListRef::new();
    listeners.push(Value::Integer(1));
    listeners.push(Value::String("not a listener".into()));
    table.set("message", Value::List(listeners));

    assert!(!dispatcher.emit(&target, "message", &[]));
}

#[test]
fn empty_list_returns_false() {
    let (dispatcher, target, table) = emitter();
    table.set("message", Value::List(ListRef::new()));
    assert!(!dispatcher.emit(&target, "message", &[]));
}

#[test]
fn unregistered_event_and_malformed_table_return_false() {
    let (dispatcher, target, _table) = emitter();
    assert!(!dispatcher.emit(&target, "message", &[]));

    let dispatcher = EventDispatcher::new(EngineHooks::default());
    let target = ObjectRef::new();
    target.set(LISTENER_TABLE_KEY, Value::Integer(3));
    assert!(!dispatcher.emit(&target, "message", &[]));
}

#[test]
fn reentrant_emit_dispatches_independently() {
    let (dispatcher, target, table) = emitter();
    let log: CallLog = Rc::new(RefCell::new(Vec::new()));

    let inner = ListRef::new();
    inner.push(logging_listener(&log, "inner"));
    table.set("inner", Value::List(inner));

    let outer = ListRef::new();
    {
        let log = log.clone();
        let dispatcher = dispatcher.clone();
        outer.push(Value::Function(FunctionRef::new(move |receiver, _| {
            log.borrow_mut().push("outer-before");
            assert!(dispatcher.emit(receiver, "inner", &[]));
            Ok(Value::Null)
        })));
    }
    outer.push(logging_listener(&log, "outer-after"));
    table.set("outer", Value::List(outer));

    assert!(dispatcher.emit(&target, "outer", &[]));
    assert_eq!(*log.borrow(), vec!["outer-before", "inner", "outer-after"]);
}
