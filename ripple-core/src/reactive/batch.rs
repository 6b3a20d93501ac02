//! Batching Coordinator
//!
//! A batch defers computation re-runs until the outermost batch completes.
//! While a batch is active, notified computations are queued instead of
//! executed. Each computation is queued at most once, so any number of
//! writes inside one batch causes a single re-run that sees the final
//! values.
//!
//! Draining is a single pass over the live queue. Computations enqueued
//! during the drain that were not queued yet are appended and still run in
//! this pass; computations that already ran in this pass are not queued a
//! second time, and the queue is cleared when the pass finishes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use super::subscriber::{Computation, SubscriberId};

/// Batch flag and pending re-runs for one runtime.
#[derive(Default)]
pub(crate) struct BatchState {
    active: Cell<bool>,
    pending: RefCell<IndexMap<SubscriberId, Rc<dyn Computation>>>,
}

impl BatchState {
    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Queue a computation. Returns `false` if it was already queued.
    pub(crate) fn enqueue(&self, computation: Rc<dyn Computation>) -> bool {
        let mut pending = self.pending.borrow_mut();
        let id = computation.id();
        if pending.contains_key(&id) {
            return false;
        }
        pending.insert(id, computation);
        true
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Open the outermost batch scope.
    ///
    /// Returns `None` when a batch is already active; the caller then runs
    /// inline and leaves the flush to the outer scope.
    pub(crate) fn begin(&self) -> Option<BatchGuard<'_>> {
        if self.active.replace(true) {
            return None;
        }
        Some(BatchGuard { state: self })
    }

    /// Run every queued computation once. Returns how many ran.
    fn drain(&self) -> usize {
        let mut index = 0;
        loop {
            let next = self
                .pending
                .borrow()
                .get_index(index)
                .map(|(_, computation)| computation.clone());
            let Some(computation) = next else {
                break;
            };
            computation.execute();
            index += 1;
        }
        index
    }
}

/// Owns the outermost batch scope.
///
/// Dropping the guard clears the queue and resets the flag, including when
/// the batch body or a drained computation panics.
pub(crate) struct BatchGuard<'a> {
    state: &'a BatchState,
}

impl BatchGuard<'_> {
    /// Execute the queued computations. Returns how many ran.
    pub(crate) fn flush(&self) -> usize {
        self.state.drain()
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let pending = std::mem::take(&mut *self.state.pending.borrow_mut());
        self.state.active.set(false);
        drop(pending);
    }
}
