//! Minimal value surface consumed by the dispatcher and causality tracker.
//!
//! The full value/object system lives in the host engine; this module
//! carries only the handles the core reads and writes through: a
//! property-mapped object, an ordered list, and a native callable invoked
//! with an explicit receiver. Handles are shared and interiorly mutable;
//! cloning copies the handle, never the storage.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::VeyraResult;

/// Native callable signature: receiver plus positional arguments.
pub type NativeFn = dyn Fn(&ObjectRef, &[Value]) -> VeyraResult<Value>;

/// Shared handle to a native callable.
#[derive(Clone)]
pub struct FunctionRef(Rc<NativeFn>);

impl FunctionRef {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&ObjectRef, &[Value]) -> VeyraResult<Value> + 'static,
    {
        Self(Rc::new(body))
    }

    /// Invokes the callable with `receiver` bound as its receiver.
    pub fn call(&self, receiver: &ObjectRef, args: &[Value]) -> VeyraResult<Value> {
        (self.0)(receiver, args)
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {:p}>", Rc::as_ptr(&self.0))
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Shared property-mapped object handle.
#[derive(Clone, Default)]
pub struct ObjectRef(Rc<RefCell<HashMap<String, Value>>>);

impl ObjectRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a property, returning a clone of the stored handle.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.borrow_mut().insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().remove(key)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<object {:p}>", Rc::as_ptr(&self.0))
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Shared ordered-sequence handle.
#[derive(Clone, Default)]
pub struct ListRef(Rc<RefCell<Vec<Value>>>);

impl ListRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(values)))
    }

    pub fn push(&self, value: Value) {
        self.0.borrow_mut().push(value);
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        let mut values = self.0.borrow_mut();
        if index < values.len() {
            Some(values.remove(index))
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Point-in-time copy of the sequence contents.
    pub fn snapshot(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }
}

impl fmt::Debug for ListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<list len={}>", self.len())
    }
}

impl PartialEq for ListRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Values manipulated by the Veyra Core runtime.
#[derive(Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(ListRef),
    Object(ObjectRef),
    Function(FunctionRef),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::Integer(i) => write!(f, "Integer({i})"),
            Value::Float(value) => write!(f, "Float({value})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::List(list) => write!(f, "List({list:?})"),
            Value::Object(obj) => write!(f, "Object({obj:?})"),
            Value::Function(func) => write!(f, "Function({func:?})"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}
