//! Veyra Core – event dispatch and async causality tracking for the Veyra
//! embedded callback runtime.
//!
//! The crate exposes two cooperating building blocks:
//!
//! * [`EventDispatcher`] – a synchronous multi-listener dispatcher that
//!   invokes the callbacks registered for a named event on an emitting
//!   object.
//! * [`CausalityTracker`] / [`AsyncOrigin`] – per-deferred-operation
//!   contexts that record which asynchronous operation scheduled which, so
//!   an uncaught failure inside a deferred callback is reported with the
//!   chain of operations that led to it rather than the immediate native
//!   frame alone.
//!
//! The host engine plugs in through [`EngineHooks`]: the stack-capture
//! primitive, the fatal-report sink, and the microtask-drain entry point are
//! all registered there, so embedders can share the core without leaking
//! engine internals into it.

pub mod causality;
pub mod events;
pub mod integration;
pub mod value;

use thiserror::Error;

pub use causality::trace::{ChainRecord, StackFrame};
pub use causality::{AsyncOrigin, CausalityTracker, TrackerConfig, UncaughtPolicy};
pub use events::EventDispatcher;
pub use integration::{DrainTarget, EngineHooks};
pub use value::{FunctionRef, ListRef, ObjectRef, Value};

/// Result type used across Veyra Core.
pub type VeyraResult<T> = std::result::Result<T, VeyraError>;

/// Errors surfaced by callback execution and host integration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VeyraError {
    /// A script-level failure raised by a callback body, together with any
    /// script frames the engine attached to it.
    #[error("{message}")]
    Exception {
        message: String,
        stack: Vec<StackFrame>,
    },
    /// A failure reported by a host-registered hook.
    #[error("host integration error: {0}")]
    Host(String),
}

impl VeyraError {
    /// Builds a script exception with no attached frames.
    pub fn exception(message: impl Into<String>) -> Self {
        VeyraError::Exception {
            message: message.into(),
            stack: Vec::new(),
        }
    }

    /// Script frames carried by the error, empty for host failures.
    pub fn script_frames(&self) -> &[StackFrame] {
        match self {
            VeyraError::Exception { stack, .. } => stack,
            VeyraError::Host(_) => &[],
        }
    }
}

impl From<anyhow::Error> for VeyraError {
    fn from(err: anyhow::Error) -> Self {
        VeyraError::Host(err.to_string())
    }
}
