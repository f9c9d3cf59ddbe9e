//! Call contexts: deadlines, cooperative cancellation and per-call inputs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;

use crate::error::CapabilityError;
use crate::value::Value;

/// Handle for cooperative cancellation of a call.
///
/// `AbortHandle` can be cloned and shared across threads; any clone can
/// trigger the abort, which is visible to all other clones.
///
/// # Example
///
/// ```
/// use relay_core::execute::AbortHandle;
///
/// let handle = AbortHandle::new();
/// let handle_clone = handle.clone();
///
/// assert!(!handle.is_aborted());
/// handle_clone.abort();
/// assert!(handle.is_aborted());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Create a new abort handle.
    pub fn new() -> Self {
        Self {
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if abort has been requested.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Request abort of every call bound to this handle.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }
}

/// Deadline, cancellation and inputs for a single call.
///
/// A context is "done" once its deadline has passed or its abort handle has
/// fired. Contexts derived with [`child_with_timeout`](Self::child_with_timeout)
/// share the parent's abort handle and never outlive the parent's deadline.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    abort: AbortHandle,
    inputs: Vec<(String, Value)>,
}

impl CallContext {
    /// A context with no deadline, cancellable only through its abort handle.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    /// Bind an externally owned abort handle.
    pub fn abort_handle(mut self, handle: AbortHandle) -> Self {
        self.abort = handle;
        self
    }

    /// Add a named input, visible to the program as a constant.
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.push((name.into(), value.into()));
        self
    }

    /// Derive a context bounded by both this context and `timeout` from now.
    ///
    /// Inputs are not inherited.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let local = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) => parent.min(local),
            None => local,
        };
        Self {
            deadline: Some(deadline),
            abort: self.abort.clone(),
            inputs: Vec::new(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed or the call was aborted.
    pub fn is_done(&self) -> bool {
        self.abort.is_aborted() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail with [`CapabilityError::Cancelled`] once the context is done.
    pub fn check(&self) -> Result<(), CapabilityError> {
        if self.is_done() {
            Err(CapabilityError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn inputs(&self) -> &[(String, Value)] {
        &self.inputs
    }
}

/// Slot through which an instance sees the context of the call it is serving.
///
/// Shared between the executor, the instance's progress hook and its
/// capability closures. Empty while the instance sits in the pool.
pub(crate) struct CallBinding {
    current: ArcSwapOption<CallContext>,
}

impl CallBinding {
    pub(crate) fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }

    pub(crate) fn bind(&self, ctx: &CallContext) {
        self.current.store(Some(Arc::new(ctx.clone())));
    }

    pub(crate) fn clear(&self) {
        self.current.store(None);
    }

    /// Context of the bound call; a background context when nothing is bound.
    pub(crate) fn context(&self) -> Arc<CallContext> {
        self.current
            .load_full()
            .unwrap_or_else(|| Arc::new(CallContext::background()))
    }

    /// Whether the bound call should stop.
    pub(crate) fn is_done(&self) -> bool {
        match &*self.current.load() {
            Some(ctx) => ctx.is_done(),
            None => false,
        }
    }
}
