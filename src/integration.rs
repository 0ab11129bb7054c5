//! Host-engine integration surface.
//!
//! Embedders register the stack-capture primitive, the fatal-report sink,
//! and the microtask-drain resolver here. Hooks are optional and can be
//! registered or cleared at runtime without requiring mutable access to the
//! dispatcher or tracker holding the registry; cloning an [`EngineHooks`]
//! shares the underlying cells.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::causality::trace::StackFrame;
use crate::value::{FunctionRef, ObjectRef};
use crate::VeyraError;

/// Microtask-drain entry point resolved from the host engine: a
/// zero-argument callable and the well-known receiver it runs against.
#[derive(Debug, Clone)]
pub struct DrainTarget {
    pub callback: FunctionRef,
    pub receiver: ObjectRef,
}

type CaptureCallback = Rc<dyn Fn(usize) -> Vec<StackFrame>>;
type FatalCallback = Rc<dyn Fn(&VeyraError, bool)>;
type DrainResolver = Rc<dyn Fn() -> anyhow::Result<Option<DrainTarget>>>;

/// Hooks consumed by the dispatcher and causality tracker.
#[derive(Default, Clone)]
pub struct EngineHooks {
    capture: Arc<RwLock<Option<CaptureCallback>>>,
    fatal: Arc<RwLock<Option<FatalCallback>>>,
    drain: Arc<RwLock<Option<DrainResolver>>>,
}

impl EngineHooks {
    /// Registers the stack-capture primitive. The hook receives the frame
    /// limit and returns the frames newest-first.
    pub fn set_capture<F>(&self, hook: F)
    where
        F: Fn(usize) -> Vec<StackFrame> + 'static,
    {
        *self.capture.write() = Some(Rc::new(hook));
    }

    /// Registers the fatal-report sink invoked for uncaught failures.
    pub fn set_fatal<F>(&self, hook: F)
    where
        F: Fn(&VeyraError, bool) + 'static,
    {
        *self.fatal.write() = Some(Rc::new(hook));
    }

    /// Registers the resolver for the microtask-drain entry point.
    pub fn set_drain_resolver<F>(&self, hook: F)
    where
        F: Fn() -> anyhow::Result<Option<DrainTarget>> + 'static,
    {
        *self.drain.write() = Some(Rc::new(hook));
    }

    pub fn clear_capture(&self) {
        *self.capture.write() = None;
    }

    pub fn clear_fatal(&self) {
        *self.fatal.write() = None;
    }

    pub fn clear_drain_resolver(&self) {
        *self.drain.write() = None;
    }

    /// Captures up to `frame_limit` frames of the current script stack.
    /// Without a registered hook the capture is empty.
    pub fn capture_stack(&self, frame_limit: usize) -> Vec<StackFrame> {
        match self.capture.read().as_ref().cloned() {
            Some(hook) => hook(frame_limit),
            None => Vec::new(),
        }
    }

    /// Reports an uncaught failure. `async_context` distinguishes a failure
    /// inside a deferred callback from a synchronous listener failure.
    pub fn report_fatal(&self, error: &VeyraError, async_context: bool) {
        tracing::error!(%error, async_context, "uncaught exception");
        if let Some(hook) = self.fatal.read().as_ref().cloned() {
            hook(error, async_context);
        } else {
            eprintln!("Uncaught exception: {error}");
            for frame in error.script_frames() {
                eprintln!("    {frame}");
            }
        }
    }

    /// Resolves the microtask-drain entry point. Resolver failures are
    /// logged and treated as "no queue".
    pub(crate) fn resolve_drain(&self) -> Option<DrainTarget> {
        let resolver = self.drain.read().as_ref().cloned()?;
        match resolver() {
            Ok(target) => target,
            Err(err) => {
                tracing::warn!("microtask drain resolver failed: {err}");
                None
            }
        }
    }
}

impl fmt::Debug for EngineHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHooks").finish_non_exhaustive()
    }
}
