//! Async causality tracking for deferred callbacks.
//!
//! Every deferred operation (a timer, an I/O completion, a queued
//! microtask) owns an [`AsyncOrigin`]. When the operation is scheduled the
//! origin records a bounded stack snapshot and links itself to whichever
//! origin is running right now; when its callback later fails uncaught, the
//! linked snapshots are printed newest-first so the report shows the chain
//! of asynchronous operations that led to the failure.
//!
//! The [`CausalityTracker`] owns the single "currently active" slot. The
//! slot is only touched inside the guarded invocation path, which saves and
//! restores it around the callback via a scope guard; exactly one callback
//! body runs at a time in the cooperative model, so no locking is involved.

pub mod trace;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use once_cell::unsync::OnceCell;
use tracing::debug;

use crate::integration::{DrainTarget, EngineHooks};
use crate::value::{FunctionRef, ObjectRef, Value};
use crate::VeyraResult;

use self::trace::{write_frames, ChainRecord, StackFrame};

/// Property resolved on the owning object each time its deferred callback
/// runs. Never cached: the owner may rebind it between schedules.
pub const CALLBACK_KEY: &str = "callback";

/// What the tracker does with a deferred callback that fails uncaught.
///
/// A deferred callback has no synchronous caller to hand a failure back to,
/// so swallowing it silently would hide correctness bugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UncaughtPolicy {
    /// Print the causality chain, then terminate the process with status 1.
    Terminate,
    /// Print the causality chain, then hand the error to the embedder.
    Propagate,
}

/// Limits and policy applied by a [`CausalityTracker`].
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Maximum stack frames captured per activation.
    pub frame_limit: usize,
    /// Maximum ancestor contexts printed after the failing one.
    pub ancestor_limit: usize,
    pub on_uncaught: UncaughtPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            frame_limit: 10,
            ancestor_limit: 4,
            on_uncaught: UncaughtPolicy::Terminate,
        }
    }
}

impl TrackerConfig {
    pub fn with_frame_limit(mut self, frame_limit: usize) -> Self {
        self.frame_limit = frame_limit;
        self
    }

    pub fn with_ancestor_limit(mut self, ancestor_limit: usize) -> Self {
        self.ancestor_limit = ancestor_limit;
        self
    }

    pub fn with_uncaught_policy(mut self, policy: UncaughtPolicy) -> Self {
        self.on_uncaught = policy;
        self
    }
}

struct OriginCore {
    target: ObjectRef,
    frames: RefCell<Option<Vec<StackFrame>>>,
    parent: RefCell<Weak<OriginCore>>,
    refs: Cell<u32>,
}

impl OriginCore {
    fn write_chain(&self, out: &mut dyn fmt::Write, depth: usize, max_ancestors: usize) -> fmt::Result {
        {
            let frames = self.frames.borrow();
            let Some(frames) = frames.as_ref() else {
                return Ok(());
            };
            write_frames(out, frames)?;
        }
        if depth < max_ancestors {
            if let Some(parent) = self.parent.borrow().upgrade() {
                parent.write_chain(out, depth + 1, max_ancestors)?;
            }
        }
        Ok(())
    }

    fn collect_chain(&self, depth: usize, max_ancestors: usize, records: &mut Vec<ChainRecord>) {
        {
            let frames = self.frames.borrow();
            let Some(frames) = frames.as_ref() else {
                return;
            };
            records.push(ChainRecord {
                frames: frames.clone(),
            });
        }
        if depth < max_ancestors {
            if let Some(parent) = self.parent.borrow().upgrade() {
                parent.collect_chain(depth + 1, max_ancestors, records);
            }
        }
    }

    fn release_parent(&self) {
        *self.parent.borrow_mut() = Weak::new();
    }
}

/// Tracks which deferred-callback context is currently active and owns the
/// limits, integration hooks, and once-resolved microtask-drain target
/// shared by every [`AsyncOrigin`] running under it.
pub struct CausalityTracker {
    hooks: EngineHooks,
    config: TrackerConfig,
    active: RefCell<Option<Rc<OriginCore>>>,
    drain: OnceCell<Option<DrainTarget>>,
}

impl CausalityTracker {
    pub fn new(hooks: EngineHooks) -> Self {
        Self::with_config(hooks, TrackerConfig::default())
    }

    pub fn with_config(hooks: EngineHooks, config: TrackerConfig) -> Self {
        Self {
            hooks,
            config,
            active: RefCell::new(None),
            drain: OnceCell::new(),
        }
    }

    pub fn hooks(&self) -> &EngineHooks {
        &self.hooks
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// True while some deferred callback is running under this tracker.
    pub fn has_active(&self) -> bool {
        self.active.borrow().is_some()
    }

    fn active_core(&self) -> Option<Rc<OriginCore>> {
        self.active.borrow().as_ref().cloned()
    }

    fn drain_target(&self) -> Option<DrainTarget> {
        self.drain
            .get_or_init(|| self.hooks.resolve_drain())
            .clone()
    }
}

impl fmt::Debug for CausalityTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CausalityTracker")
            .field("config", &self.config)
            .field("active", &self.has_active())
            .finish_non_exhaustive()
    }
}

/// Restores the tracker's active slot when the guarded call returns,
/// including on unwinding.
struct ActiveGuard<'a> {
    tracker: &'a CausalityTracker,
}

impl<'a> ActiveGuard<'a> {
    fn enter(tracker: &'a CausalityTracker, core: Rc<OriginCore>) -> Self {
        let mut slot = tracker.active.borrow_mut();
        assert!(
            slot.is_none(),
            "deferred callback activated while another deferred callback is already active"
        );
        *slot = Some(core);
        drop(slot);
        Self { tracker }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        *self.tracker.active.borrow_mut() = None;
    }
}

/// Causality context for one deferred operation.
///
/// Holds the stack snapshot recorded when the operation was scheduled and a
/// non-owning link to the context that was active at that moment. The link
/// observably goes empty if the ancestor is destroyed first.
pub struct AsyncOrigin {
    core: Rc<OriginCore>,
}

impl AsyncOrigin {
    /// Creates the context for a deferred operation owned by `target`.
    pub fn new(target: ObjectRef) -> Self {
        Self {
            core: Rc::new(OriginCore {
                target,
                frames: RefCell::new(None),
                parent: RefCell::new(Weak::new()),
                refs: Cell::new(0),
            }),
        }
    }

    pub fn target(&self) -> &ObjectRef {
        &self.core.target
    }

    /// Liveness references taken by pending schedules. The owning runtime
    /// keeps the context alive while this is non-zero.
    pub fn refs(&self) -> u32 {
        self.core.refs.get()
    }

    /// True while the parent link still reaches a live ancestor.
    pub fn has_parent(&self) -> bool {
        self.core.parent.borrow().strong_count() > 0
    }

    /// Captures a fresh stack snapshot, replacing any previous one, and
    /// links this context to whichever context is active right now. An
    /// empty capture stores no snapshot.
    pub fn record_stack(&self, tracker: &CausalityTracker) {
        self.clear_stack();
        let frames = tracker.hooks().capture_stack(tracker.config().frame_limit);
        if !frames.is_empty() {
            *self.core.frames.borrow_mut() = Some(frames);
        }
        if let Some(active) = tracker.active_core() {
            *self.core.parent.borrow_mut() = Rc::downgrade(&active);
        }
    }

    /// Releases the captured snapshot and the parent link. Idempotent.
    pub fn clear_stack(&self) {
        *self.core.frames.borrow_mut() = None;
        self.core.release_parent();
    }

    /// Marks the operation as scheduled: takes a liveness reference and
    /// records the stack that scheduled it.
    pub fn schedule(&self, tracker: &CausalityTracker) {
        self.core.refs.set(self.core.refs.get() + 1);
        self.record_stack(tracker);
        debug!(refs = self.core.refs.get(), "deferred operation scheduled");
    }

    /// Marks the operation as finished: drops the snapshot, the parent
    /// link, and the liveness reference taken by [`AsyncOrigin::schedule`].
    pub fn complete(&self) {
        self.clear_stack();
        let refs = self.core.refs.get();
        self.core.refs.set(refs.saturating_sub(1));
    }

    /// Runs the operation's current callback under this context.
    ///
    /// The callable is resolved from the owning object's `callback`
    /// property at call time; `Ok(None)` when nothing callable is bound.
    /// After a successful top-level call the tracker's microtask-drain
    /// target runs through the same guarded protocol and its result becomes
    /// the call's result.
    ///
    /// An uncaught failure is reported with the bounded ancestor chain and
    /// then handled per [`TrackerConfig::on_uncaught`]: by default the
    /// process terminates with status 1; under
    /// [`UncaughtPolicy::Propagate`] the error is returned.
    pub fn invoke(&self, tracker: &CausalityTracker, args: &[Value]) -> VeyraResult<Option<Value>> {
        let callback = match self.core.target.get(CALLBACK_KEY) {
            Some(Value::Function(callback)) => callback,
            _ => return Ok(None),
        };

        let ret = self.guarded_call(tracker, &callback, &self.core.target, args)?;

        // Pending microtasks run after every top-level callback.
        if let Some(drain) = tracker.drain_target() {
            return self
                .guarded_call(tracker, &drain.callback, &drain.receiver, &[])
                .map(Some);
        }
        Ok(Some(ret))
    }

    fn guarded_call(
        &self,
        tracker: &CausalityTracker,
        callback: &FunctionRef,
        receiver: &ObjectRef,
        args: &[Value],
    ) -> VeyraResult<Value> {
        let outcome = {
            let _guard = ActiveGuard::enter(tracker, Rc::clone(&self.core));
            callback.call(receiver, args)
        };
        match outcome {
            Ok(value) => Ok(value),
            Err(err) => {
                tracker.hooks().report_fatal(&err, true);
                self.print_chain(tracker.config().ancestor_limit);
                match tracker.config().on_uncaught {
                    UncaughtPolicy::Terminate => std::process::exit(1),
                    UncaughtPolicy::Propagate => Err(err),
                }
            }
        }
    }

    /// Renders this context's frames followed by up to `max_ancestors`
    /// ancestors, newest first. Stops at the depth bound however long the
    /// chain is and treats a dead parent as the end of the chain.
    pub fn write_chain(&self, out: &mut dyn fmt::Write, max_ancestors: usize) -> fmt::Result {
        self.core.write_chain(out, 0, max_ancestors)
    }

    /// Prints the chain to stderr.
    pub fn print_chain(&self, max_ancestors: usize) {
        let mut rendered = String::new();
        if self.write_chain(&mut rendered, max_ancestors).is_ok() && !rendered.is_empty() {
            eprint!("{rendered}");
        }
    }

    /// Serialized chain view for host devtools.
    pub fn chain_json(&self, max_ancestors: usize) -> serde_json::Value {
        let mut records = Vec::new();
        self.core.collect_chain(0, max_ancestors, &mut records);
        serde_json::to_value(records).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Debug for AsyncOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOrigin")
            .field("target", &self.core.target)
            .field("refs", &self.core.refs.get())
            .field("has_parent", &self.has_parent())
            .finish()
    }
}
