//! Effect Implementation
//!
//! An Effect is a computation that runs whenever its dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its body immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is re-run (or queued inside a
//!    batch).
//!
//! 3. Before re-running, the effect removes itself from every signal it was
//!    subscribed to and rediscovers its dependencies during the run. It only
//!    ever reacts to the signals read on its latest run.
//!
//! # Lifecycle
//!
//! An effect is either idle or running. A run that is triggered while the
//! effect is already running (the body wrote to something it reads) is
//! skipped. [`Effect::dispose`] unsubscribes the effect and drops its body;
//! after that it never runs again. Dropping the last owning [`Runtime`]
//! handle disposes every effect created from it.
//!
//! # Panics
//!
//! A panic in the body propagates to whoever triggered the run. The context
//! stack and the running flag are restored by guards on the way out.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::subscriber::{Computation, Dependencies, SubscriberId, SubscriberSet};

type Body<T> = Box<dyn FnMut() -> T>;

struct EffectInner<T: 'static> {
    id: SubscriberId,
    runtime: Runtime,
    /// `None` once disposed.
    body: RefCell<Option<Body<T>>>,
    /// Result of the latest run.
    value: RefCell<Option<T>>,
    dependencies: Dependencies,
    running: Cell<bool>,
    disposed: Cell<bool>,
    run_count: Cell<usize>,
    this: Weak<EffectInner<T>>,
}

/// Clears the running flag when dropped.
struct Running<'a>(&'a Cell<bool>);

impl<'a> Running<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<T: 'static> EffectInner<T> {
    fn new(runtime: &Runtime, body: Option<Body<T>>) -> Rc<Self> {
        let inner = Rc::new_cyclic(|this| Self {
            id: SubscriberId::new(),
            runtime: runtime.handle(),
            body: RefCell::new(body),
            value: RefCell::new(None),
            dependencies: Dependencies::new(),
            running: Cell::new(false),
            disposed: Cell::new(false),
            run_count: Cell::new(0),
            this: this.clone(),
        });
        let owned: Weak<dyn Computation> = inner.this.clone();
        runtime.adopt(inner.id, owned);
        inner
    }

    /// Unsubscribe, drop the body and leave the runtime's registry.
    fn stop(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let released = self.dependencies.unsubscribe_all(self.id);
        self.release_body();
        self.runtime.release(self.id);
        debug!(
            runtime = %self.runtime.label(),
            subscriber = ?self.id,
            released,
            "effect disposed"
        );
    }

    /// Run `f` as this computation: drop the old subscriptions, then track
    /// every read `f` makes.
    fn run_tracked<R>(this: &Rc<Self>, f: impl FnOnce() -> R) -> R {
        this.dependencies.unsubscribe_all(this.id);

        let result = {
            let _running = Running::enter(&this.running);
            let _ctx = ReactiveContext::enter(&this.runtime, this.clone());
            f()
        };

        this.run_count.set(this.run_count.get() + 1);
        trace!(
            runtime = %this.runtime.label(),
            subscriber = ?this.id,
            dependencies = this.dependencies.len(),
            "effect ran"
        );

        // Disposed from inside its own body: forget whatever it read since.
        if this.disposed.get() {
            this.dependencies.unsubscribe_all(this.id);
        }
        result
    }

    fn rerun(this: &Rc<Self>) {
        if this.disposed.get() {
            return;
        }
        if this.running.get() {
            warn!(
                runtime = %this.runtime.label(),
                subscriber = ?this.id,
                "effect triggered itself while running; skipping re-entrant run"
            );
            return;
        }

        let value = {
            let mut body = this.body.borrow_mut();
            let Some(body) = body.as_mut() else {
                return;
            };
            Self::run_tracked(this, body)
        };
        *this.value.borrow_mut() = Some(value);

        if this.disposed.get() {
            this.release_body();
        }
    }

    /// Drop the body, and with it every handle the body captured.
    fn release_body(&self) {
        let body = match self.body.try_borrow_mut() {
            Ok(mut body) => body.take(),
            // Still running; `rerun` releases it afterwards.
            Err(_) => None,
        };
        drop(body);
    }
}

impl<T: 'static> Computation for EffectInner<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn execute(&self) {
        if let Some(this) = self.this.upgrade() {
            Self::rerun(&this);
        }
    }

    fn track(&self, set: &Rc<SubscriberSet>) {
        self.dependencies.add(set);
    }

    fn dispose(&self) {
        self.stop();
    }
}

impl<T: 'static> Drop for EffectInner<T> {
    fn drop(&mut self) {
        self.runtime.release(self.id);
    }
}

/// A computation that re-runs when its dependencies change.
///
/// The effect stays subscribed as long as the signals it read are alive,
/// whether or not this handle is kept. It stops when [`Effect::dispose`] is
/// called or when the last owning [`Runtime`] handle is dropped.
///
/// # Example
///
/// ```rust
/// use ripple_core::{Effect, Runtime, Signal};
///
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 1);
///
/// let effect = Effect::new(&rt, {
///     let count = count.clone();
///     move || count.get() * 10
/// });
/// assert_eq!(effect.value(), Some(10));
///
/// count.set(5);
/// assert_eq!(effect.value(), Some(50));
/// ```
pub struct Effect<T: 'static = ()> {
    inner: Rc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    /// Create a new effect and run it immediately.
    pub fn new<F>(runtime: &Runtime, body: F) -> Self
    where
        F: FnMut() -> T + 'static,
    {
        let (effect, value) = Self::with_initial(runtime, body);
        *effect.inner.value.borrow_mut() = Some(value);
        effect
    }

    /// Create a new effect, run it immediately and hand back the first
    /// result instead of storing it.
    pub fn with_initial<F>(runtime: &Runtime, body: F) -> (Self, T)
    where
        F: FnMut() -> T + 'static,
    {
        let inner = EffectInner::new(runtime, None);
        let mut body: Body<T> = Box::new(body);
        let value = EffectInner::run_tracked(&inner, &mut body);

        // Disposed during its first run: keep the body dropped.
        if !inner.disposed.get() {
            *inner.body.borrow_mut() = Some(body);
        }
        (Self { inner }, value)
    }

    /// Create a new effect without running it.
    ///
    /// It has no dependencies until [`Effect::execute`] is called.
    pub fn new_lazy<F>(runtime: &Runtime, body: F) -> Self
    where
        F: FnMut() -> T + 'static,
    {
        Self {
            inner: EffectInner::new(runtime, Some(Box::new(body))),
        }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the effect now.
    pub fn execute(&self) {
        EffectInner::rerun(&self.inner);
    }

    /// Run the effect now, or queue it if a batch is active.
    pub fn schedule(&self) {
        self.inner.runtime.schedule(self.inner.clone());
    }

    /// Run `f` as if it were part of this effect's body.
    ///
    /// The effect's previous subscriptions are replaced by whatever `f`
    /// reads.
    pub(crate) fn track_with<R>(&self, f: impl FnOnce() -> R) -> R {
        EffectInner::run_tracked(&self.inner, f)
    }

    /// Stop the effect for good.
    pub fn dispose(&self) {
        self.inner.stop();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of signals the latest run subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.len()
    }

    /// Take the result of the latest run.
    pub fn take_value(&self) -> Option<T> {
        self.inner.value.borrow_mut().take()
    }

    /// Clone the result of the latest run.
    pub fn value(&self) -> Option<T>
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }
}

impl<T: 'static> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> std::fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    fn counter() -> Rc<Cell<usize>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn effect_runs_on_creation() {
        let rt = Runtime::new();
        let runs = counter();

        let effect = Effect::new(&rt, {
            let runs = runs.clone();
            move || runs.set(runs.get() + 1)
        });

        assert_eq!(runs.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let rt = Runtime::new();
        let runs = counter();

        let effect = Effect::new_lazy(&rt, {
            let runs = runs.clone();
            move || runs.set(runs.get() + 1)
        });

        assert_eq!(runs.get(), 0);
        assert_eq!(effect.run_count(), 0);

        effect.execute();
        assert_eq!(runs.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn with_initial_returns_first_result() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 3);

        let (effect, first) = Effect::with_initial(&rt, {
            let signal = signal.clone();
            move || signal.get() + 1
        });

        assert_eq!(first, 4);
        assert_eq!(effect.value(), None);

        signal.set(10);
        assert_eq!(effect.take_value(), Some(11));
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        let runs = counter();

        let effect = Effect::new(&rt, {
            let signal = signal.clone();
            let runs = runs.clone();
            move || {
                signal.get();
                runs.set(runs.get() + 1);
            }
        });

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);
        assert_eq!(effect.dependency_count(), 0);

        signal.set(1);
        effect.execute();
        effect.schedule();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn dispose_releases_captured_handles() {
        let rt = Runtime::new();
        let captured = Rc::new(());

        let effect = Effect::new(&rt, {
            let captured = captured.clone();
            move || {
                let _alive = Rc::clone(&captured);
            }
        });
        assert_eq!(Rc::strong_count(&captured), 2);

        effect.dispose();
        assert_eq!(Rc::strong_count(&captured), 1);
    }

    #[test]
    fn effect_disposing_itself_stays_unsubscribed() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        let slot: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));
        let runs = counter();

        let effect = Effect::new(&rt, {
            let signal = signal.clone();
            let slot = slot.clone();
            let runs = runs.clone();
            move || {
                runs.set(runs.get() + 1);
                if signal.get() > 0 {
                    if let Some(me) = slot.borrow().as_ref() {
                        me.dispose();
                    }
                }
                signal.get();
            }
        });
        *slot.borrow_mut() = Some(effect.clone());

        signal.set(1);
        assert!(effect.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(2);
        assert_eq!(runs.get(), 2);
        slot.borrow_mut().take();
    }

    #[test]
    fn self_triggering_effect_is_not_reentered() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);

        let effect = Effect::new(&rt, {
            let signal = signal.clone();
            move || {
                let next = signal.get() + 1;
                signal.set(next);
            }
        });

        assert_eq!(effect.run_count(), 1);
        assert_eq!(signal.get_untracked(), 1);
    }

    #[test]
    fn panicking_body_leaves_runtime_usable() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        let runs = counter();

        let _effect = Effect::new(&rt, {
            let signal = signal.clone();
            let runs = runs.clone();
            move || {
                runs.set(runs.get() + 1);
                if signal.get() == 1 {
                    panic!("body failed");
                }
            }
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| signal.set(1)));
        assert!(result.is_err());
        assert!(!rt.is_tracking());

        // The dependency was recorded before the panic, so it still reacts.
        signal.set(2);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn effect_clone_shares_state() {
        let rt = Runtime::new();
        let effect1 = Effect::new(&rt, || {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());

        effect1.execute();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }
}
