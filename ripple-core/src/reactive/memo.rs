//! Memo Implementation
//!
//! A Memo is a cached derived value. It is a signal whose value is written
//! by an effect.
//!
//! # How Memos Work
//!
//! 1. On creation, the memo runs its computation once, as its own effect,
//!    and seeds a signal with the result.
//!
//! 2. Reading the memo is an ordinary signal read: it returns the cached
//!    value and subscribes the reader. Reads never recompute.
//!
//! 3. When a signal the computation read changes, the effect re-runs the
//!    computation and writes the result into the signal, which in turn
//!    notifies the memo's readers.
//!
//! There is no equality short-circuit: every dependency change recomputes
//! and notifies, even if the result is the same.

use std::cell::{OnceCell, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::effect::Effect;
use super::runtime::Runtime;
use super::signal::Signal;

/// A cached derived value that recomputes only when dependencies change.
///
/// The computation runs exactly once at creation: the seeding run is also
/// the first run of the memo's own effect, not a separate call before it.
/// [`Memo::compute_count`] counts every run including that one.
///
/// # Example
///
/// ```rust
/// use ripple_core::{Memo, Runtime, Signal};
///
/// let rt = Runtime::new();
/// let base = Signal::new(&rt, 5);
/// let doubled = Memo::new(&rt, {
///     let base = base.clone();
///     move || base.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 10);
/// base.set(7);
/// assert_eq!(doubled.get(), 14);
/// ```
pub struct Memo<T: 'static> {
    signal: Signal<T>,
    effect: Effect<()>,
}

impl<T: 'static> Memo<T> {
    /// Create a new memo with the given computation function.
    pub fn new<F>(runtime: &Runtime, compute: F) -> Self
    where
        F: FnMut() -> T + 'static,
    {
        let compute = Rc::new(RefCell::new(compute));
        let target: Rc<OnceCell<Signal<T>>> = Rc::new(OnceCell::new());

        let effect = Effect::new_lazy(runtime, {
            let compute = compute.clone();
            let target = target.clone();
            move || {
                let value = (&mut *compute.borrow_mut())();
                if let Some(signal) = target.get() {
                    signal.set(value);
                }
            }
        });

        // The seeding run belongs to the memo's effect so its reads subscribe
        // the effect and not whatever computation is creating the memo.
        let seed = effect.track_with(|| (&mut *compute.borrow_mut())());
        let signal = Signal::new(runtime, seed);
        // `target` is fresh, so this cannot already be set.
        let _ = target.set(signal.clone());

        Self { signal, effect }
    }

    /// Get the cached value, subscribing the running computation.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.signal.get()
    }

    /// Get the cached value without tracking.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.signal.get_untracked()
    }

    /// Borrow the cached value, subscribing the running computation.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    /// The signal holding the cached value.
    pub fn signal(&self) -> &Signal<T> {
        &self.signal
    }

    /// How many times the computation has run.
    pub fn compute_count(&self) -> usize {
        self.effect.run_count()
    }

    /// Stop recomputing. The last value stays readable.
    pub fn dispose(&self) {
        self.effect.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.effect.is_disposed()
    }
}

impl<T: 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            effect: self.effect.clone(),
        }
    }
}

impl<T: Debug + 'static> Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("signal", &self.signal)
            .field("compute_count", &self.compute_count())
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
    use std::cell::Cell;

    #[test]
    fn memo_computes_once_on_creation() {
        let rt = Runtime::new();
        let calls = Rc::new(Cell::new(0));

        let memo = Memo::new(&rt, {
            let calls = calls.clone();
            move || {
                calls.set(calls.get() + 1);
                42
            }
        });

        assert_eq!(calls.get(), 1);
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.compute_count(), 1);
    }

    #[test]
    fn memo_caches_value_between_changes() {
        let rt = Runtime::new();
        let a = Signal::new(&rt, 1);
        let b = Signal::new(&rt, 2);
        let calls = Rc::new(Cell::new(0));

        let memo = Memo::new(&rt, {
            let (a, b, calls) = (a.clone(), b.clone(), calls.clone());
            move || {
                calls.set(calls.get() + 1);
                a.get() + b.get()
            }
        });

        for _ in 0..5 {
            assert_eq!(memo.get(), 3);
        }
        assert_eq!(calls.get(), 1);

        a.set(10);
        assert_eq!(calls.get(), 2);
        assert_eq!(memo.get(), 12);
        assert_eq!(memo.get(), 12);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn memo_depends_on_memo() {
        let rt = Runtime::new();
        let base = Signal::new(&rt, 5);

        let doubled = Memo::new(&rt, {
            let base = base.clone();
            move || base.get() * 2
        });
        let plus_ten = Memo::new(&rt, {
            let doubled = doubled.clone();
            move || doubled.get() + 10
        });

        assert_eq!(plus_ten.get(), 20);

        base.set(10);
        assert_eq!(doubled.get(), 20);
        assert_eq!(plus_ten.get(), 30);
    }

    #[test]
    fn creating_memo_inside_effect_does_not_subscribe_the_effect() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 1);
        let outer_runs = Rc::new(Cell::new(0));
        let holder: Rc<RefCell<Option<Memo<i32>>>> = Rc::new(RefCell::new(None));

        let _outer = Effect::new(&rt, {
            let rt = rt.handle();
            let source = source.clone();
            let outer_runs = outer_runs.clone();
            let holder = holder.clone();
            move || {
                outer_runs.set(outer_runs.get() + 1);
                if holder.borrow().is_none() {
                    let source = source.clone();
                    *holder.borrow_mut() = Some(Memo::new(&rt, move || source.get()));
                }
            }
        });

        source.set(2);
        assert_eq!(outer_runs.get(), 1);
        let memo = holder.borrow_mut().take();
        assert_eq!(memo.map(|m| m.get_untracked()), Some(2));
    }

    #[test]
    fn disposed_memo_keeps_last_value() {
        let rt = Runtime::new();
        let base = Signal::new(&rt, 1);
        let memo = Memo::new(&rt, {
            let base = base.clone();
            move || base.get() + 1
        });

        memo.dispose();
        base.set(5);
        assert!(memo.is_disposed());
        assert_eq!(memo.get(), 2);
    }
}
