//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos,
//! effects and stores. One runtime is one reactive universe.
//!
//! # How It Works
//!
//! 1. While a computation runs, it sits on top of the runtime's context
//!    stack, so every signal read during that time subscribes it.
//!
//! 2. When a signal is written, it hands a snapshot of its subscribers to
//!    [`Runtime::schedule`].
//!
//! 3. Outside a batch each subscriber re-runs immediately. Inside a batch it
//!    is queued once and re-runs when the outermost batch finishes.
//!
//! # Isolation
//!
//! There is no global state. Every handle created from a runtime keeps a
//! clone of it, and two runtimes never see each other's computations.
//!
//! # Ownership
//!
//! [`Runtime::new`] returns an owning handle; its clones own too. Signals,
//! effects and stores only keep a non-owning [`Runtime::handle`]. When the
//! last owning handle is dropped, every effect and memo created from the
//! runtime is disposed, which releases the signals and stores their bodies
//! captured.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use super::batch::BatchState;
use super::context::ReactiveContext;
use super::effect::Effect;
use super::memo::Memo;
use super::signal::{ReadSignal, Signal, WriteSignal};
use super::subscriber::{Computation, SubscriberId};
use crate::store::{Store, StoreSetter, StoreView};

/// Settings for a runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Name attached to every log event emitted by this runtime.
    pub label: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            label: "ripple".to_string(),
        }
    }
}

struct RuntimeInner {
    config: RuntimeConfig,
    /// Running computations, innermost last. `None` marks an untracked scope.
    stack: RefCell<Vec<Option<Rc<dyn Computation>>>>,
    batch: BatchState,
    /// Every live computation created from this runtime.
    owned: RefCell<IndexMap<SubscriberId, Weak<dyn Computation>>>,
}

/// Disposes the runtime's computations once the last owning handle goes.
struct Owner {
    inner: Rc<RuntimeInner>,
}

impl Drop for Owner {
    fn drop(&mut self) {
        let owned = std::mem::take(&mut *self.inner.owned.borrow_mut());
        let mut disposed = 0;
        for computation in owned.values().filter_map(Weak::upgrade) {
            computation.dispose();
            disposed += 1;
        }
        debug!(runtime = %self.inner.config.label, disposed, "runtime dropped");
    }
}

/// Handle to a reactive universe.
///
/// Cloning is cheap and yields a handle to the same runtime. Clones of an
/// owning handle own as well.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
    /// `None` for the handles kept by signals, effects and stores.
    owner: Option<Rc<Owner>>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let inner = Rc::new(RuntimeInner {
            config,
            stack: RefCell::new(Vec::new()),
            batch: BatchState::default(),
            owned: RefCell::new(IndexMap::new()),
        });
        Self {
            owner: Some(Rc::new(Owner {
                inner: inner.clone(),
            })),
            inner,
        }
    }

    /// A handle to the same runtime that does not keep its computations
    /// alive.
    ///
    /// Effect bodies that need the runtime should capture this rather than
    /// an owning clone, or the runtime can never tear itself down.
    pub fn handle(&self) -> Runtime {
        Runtime {
            inner: self.inner.clone(),
            owner: None,
        }
    }

    /// Whether dropping this handle can dispose the runtime's computations.
    pub fn is_owner(&self) -> bool {
        self.owner.is_some()
    }

    /// Number of live effects and memos created from this runtime.
    pub fn computation_count(&self) -> usize {
        self.inner
            .owned
            .borrow()
            .values()
            .filter(|computation| computation.strong_count() > 0)
            .count()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn label(&self) -> &str {
        &self.inner.config.label
    }

    /// Whether two handles point at the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Public operations
    // ------------------------------------------------------------------

    /// Create a signal and return its read and write halves.
    pub fn create_signal<T: 'static>(&self, value: T) -> (ReadSignal<T>, WriteSignal<T>) {
        Signal::new(self, value).split()
    }

    /// Run `body` now and again whenever a signal it read changes.
    ///
    /// Returns the result of the first run. Later results are only kept by
    /// the effect; use [`Effect::new`] to hold on to the handle.
    pub fn create_effect<T, F>(&self, body: F) -> T
    where
        T: 'static,
        F: FnMut() -> T + 'static,
    {
        let (_effect, value) = Effect::with_initial(self, body);
        value
    }

    /// Create a cached derived value.
    pub fn create_memo<T, F>(&self, compute: F) -> Memo<T>
    where
        T: 'static,
        F: FnMut() -> T + 'static,
    {
        Memo::new(self, compute)
    }

    /// Wrap `initial` in a deep reactive store.
    pub fn create_store(&self, initial: impl Into<Value>) -> (StoreView, StoreSetter) {
        let store = Store::new(self, initial.into());
        (store.view(), store.setter())
    }

    /// Run `f` with re-runs deferred until the outermost batch ends.
    ///
    /// Nested calls run inline; only the outermost call flushes.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let Some(guard) = self.inner.batch.begin() else {
            return f();
        };

        let result = f();
        let queued = self.inner.batch.pending_len();
        let ran = guard.flush();
        trace!(runtime = %self.label(), queued, ran, "batch flushed");
        result
    }

    /// Run `f` without subscribing the current computation to anything it
    /// reads.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let _ctx = ReactiveContext::untracked(self);
        f()
    }

    pub fn is_batching(&self) -> bool {
        self.inner.batch.is_active()
    }

    /// Whether a read right now would subscribe a computation.
    pub fn is_tracking(&self) -> bool {
        self.current_computation().is_some()
    }

    // ------------------------------------------------------------------
    // Crate internals
    // ------------------------------------------------------------------

    /// Run `computation` now, or queue it if a batch is active.
    pub(crate) fn schedule(&self, computation: Rc<dyn Computation>) {
        if self.inner.batch.is_active() {
            self.inner.batch.enqueue(computation);
        } else {
            computation.execute();
        }
    }

    /// The computation reads should currently be attributed to.
    pub(crate) fn current_computation(&self) -> Option<Rc<dyn Computation>> {
        self.inner.stack.borrow().last().cloned().flatten()
    }

    pub(crate) fn push_context(&self, entry: Option<Rc<dyn Computation>>) {
        self.inner.stack.borrow_mut().push(entry);
    }

    pub(crate) fn pop_context(&self) -> Option<Option<Rc<dyn Computation>>> {
        self.inner.stack.borrow_mut().pop()
    }

    pub(crate) fn context_depth(&self) -> usize {
        self.inner.stack.borrow().len()
    }

    /// Register a computation to be disposed with the runtime.
    pub(crate) fn adopt(&self, id: SubscriberId, computation: Weak<dyn Computation>) {
        self.inner.owned.borrow_mut().insert(id, computation);
    }

    /// Forget a computation that was disposed or dropped.
    pub(crate) fn release(&self, id: SubscriberId) {
        // Already taken while the owner is tearing down.
        if let Ok(mut owned) = self.inner.owned.try_borrow_mut() {
            owned.swap_remove(&id);
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("label", &self.label())
            .field("owner", &self.is_owner())
            .field("context_depth", &self.context_depth())
            .field("batching", &self.is_batching())
            .finish()
    }
}
