//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! Each [`Runtime`] owns a stack of context entries. When a computation
//! starts, it pushes itself onto the stack; when it completes, it pops.
//! An entry can also be empty, which is how [`Runtime::untrack`] hides the
//! enclosing computation from signal reads.
//!
//! Popping is tied to a guard's `Drop`, so the stack stays balanced even
//! when a computation body panics.

use std::rc::Rc;

use super::runtime::Runtime;
use super::subscriber::{Computation, SubscriberId};

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    runtime: Runtime,
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given computation.
    ///
    /// While this context is active, any signals that are read will
    /// register the computation as a dependent.
    pub fn enter(runtime: &Runtime, computation: Rc<dyn Computation>) -> Self {
        let subscriber_id = Some(computation.id());
        runtime.push_context(Some(computation));
        Self {
            runtime: runtime.handle(),
            subscriber_id,
        }
    }

    /// Enter a context in which reads are not tracked.
    pub fn untracked(runtime: &Runtime) -> Self {
        runtime.push_context(None);
        Self {
            runtime: runtime.handle(),
            subscriber_id: None,
        }
    }

    /// The subscriber this guard pushed, if any.
    pub fn subscriber_id(&self) -> Option<SubscriberId> {
        self.subscriber_id
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = self.runtime.pop_context();

        // Verify we're popping the right context.
        debug_assert_eq!(
            popped.map(|entry| entry.map(|c| c.id())),
            Some(self.subscriber_id),
            "ReactiveContext mismatch"
        );
    }
}
