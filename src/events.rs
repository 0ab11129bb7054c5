//! Synchronous multi-listener event dispatch.

use tracing::debug;

use crate::integration::EngineHooks;
use crate::value::{FunctionRef, ObjectRef, Value};

/// Reserved property key under which an emitting object keeps its listener
/// table: an object mapping event name to a single callable or a list.
pub const LISTENER_TABLE_KEY: &str = "__listeners";

/// Invokes the callbacks registered for a named event on an emitting
/// object.
///
/// A listener that fails is reported through the fatal hook and stops the
/// remaining listeners for that call; the process keeps running and the
/// failure is never re-raised to the emitter.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    hooks: EngineHooks,
}

impl EventDispatcher {
    pub fn new(hooks: EngineHooks) -> Self {
        Self { hooks }
    }

    /// Runs the listeners registered for `event` on `target`, each with
    /// `target` as receiver.
    ///
    /// Returns `true` when at least one listener ran and none failed;
    /// `false` when no listener table exists, nothing callable is
    /// registered under `event`, or a listener failed.
    pub fn emit(&self, target: &ObjectRef, event: &str, args: &[Value]) -> bool {
        let table = match target.get(LISTENER_TABLE_KEY) {
            Some(Value::Object(table)) => table,
            _ => return false,
        };

        match table.get(event) {
            Some(Value::Function(listener)) => self.run_listener(&listener, target, args),
            Some(Value::List(listeners)) => {
                // Fix the set of listeners before any of them runs; a
                // listener mutating the registered list must not affect
                // this dispatch.
                let snapshot = listeners.snapshot();
                debug!(event, listeners = snapshot.len(), "dispatching event");
                let mut invoked = false;
                for entry in &snapshot {
                    let Value::Function(listener) = entry else {
                        continue;
                    };
                    if !self.run_listener(listener, target, args) {
                        return false;
                    }
                    invoked = true;
                }
                invoked
            }
            _ => false,
        }
    }

    fn run_listener(&self, listener: &FunctionRef, target: &ObjectRef, args: &[Value]) -> bool {
        match listener.call(target, args) {
            Ok(_) => true,
            Err(err) => {
                self.hooks.report_fatal(&err, false);
                false
            }
        }
    }
}
