//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while a computation is running, the signal
//!    registers that computation as a subscriber and the computation records
//!    the signal's subscriber set in its own dependency list.
//!
//! 2. When a signal is written, every subscriber registered at that moment
//!    is re-run (or queued, inside a batch).
//!
//! 3. Writing never compares values. Setting a signal to the value it
//!    already holds still notifies; equality suppression is a store concern.

use std::cell::{Ref, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

use tracing::trace;

use super::runtime::Runtime;
use super::subscriber::{SignalId, SubscriberSet};

struct SignalInner<T> {
    value: RefCell<T>,
    subscribers: Rc<SubscriberSet>,
}

/// A reactive cell holding a value of type T.
///
/// Cloning produces another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use ripple_core::{Runtime, Signal};
///
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T: 'static> {
    runtime: Runtime,
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self {
            runtime: runtime.handle(),
            inner: Rc::new(SignalInner {
                value: RefCell::new(value),
                subscribers: SubscriberSet::new(SignalId::new()),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.inner.subscribers.signal_id()
    }

    /// The runtime this signal belongs to, as a non-owning handle.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Subscribe the running computation, if there is one.
    pub fn track(&self) {
        if let Some(current) = self.runtime.current_computation() {
            self.inner.subscribers.insert(current.clone());
            current.track(&self.inner.subscribers);
        }
    }

    /// Get the current value, subscribing the running computation.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.track();
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value, subscribing the running computation.
    ///
    /// Writing to this signal from inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Borrow the current value without tracking.
    pub fn borrow_untracked(&self) -> Ref<'_, T> {
        self.inner.value.borrow()
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.notify();
    }

    /// Mutate the value in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        self.notify();
    }

    /// Re-run (or queue) every current subscriber.
    pub fn notify(&self) {
        let subscribers = self.inner.subscribers.snapshot();
        trace!(
            runtime = %self.runtime.label(),
            signal = ?self.id(),
            subscribers = subscribers.len(),
            "signal written"
        );
        for subscriber in subscribers {
            self.runtime.schedule(subscriber);
        }
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Split into read and write halves sharing this cell.
    pub fn split(self) -> (ReadSignal<T>, WriteSignal<T>) {
        (
            ReadSignal {
                signal: self.clone(),
            },
            WriteSignal { signal: self },
        )
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Read half of a signal.
pub struct ReadSignal<T: 'static> {
    signal: Signal<T>,
}

impl<T: 'static> ReadSignal<T> {
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.signal.get()
    }

    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.signal.get_untracked()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    pub fn subscriber_count(&self) -> usize {
        self.signal.subscriber_count()
    }
}

impl<T: 'static> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

/// Write half of a signal.
pub struct WriteSignal<T: 'static> {
    signal: Signal<T>,
}

impl<T: 'static> WriteSignal<T> {
    pub fn set(&self, value: T) {
        self.signal.set(value)
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.signal.update(f)
    }
}

impl<T: 'static> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use std::cell::Cell;

    fn counter() -> Rc<Cell<usize>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn signal_get_and_set() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, vec![1, 2]);
        signal.update(|v| v.push(3));
        assert_eq!(signal.get(), vec![1, 2, 3]);
    }

    #[test]
    fn read_outside_computation_does_not_subscribe() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        signal.get();
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn repeated_reads_register_once() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 1);
        let effect = Effect::new(&rt, {
            let signal = signal.clone();
            move || signal.get() + signal.get() + signal.with(|v| *v)
        });

        assert_eq!(signal.subscriber_count(), 1);
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn writing_same_value_still_notifies() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 5);
        let runs = counter();

        let _effect = Effect::new(&rt, {
            let signal = signal.clone();
            let runs = runs.clone();
            move || {
                signal.get();
                runs.set(runs.get() + 1);
            }
        });

        signal.set(5);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn subscriber_added_during_notification_is_not_run() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        let late_runs = counter();

        let _spawner = Effect::new(&rt, {
            let rt = rt.handle();
            let signal = signal.clone();
            let late_runs = late_runs.clone();
            move || {
                if signal.get() == 1 {
                    let signal = signal.clone();
                    let late_runs = late_runs.clone();
                    let _late = Effect::new(&rt, move || {
                        signal.get();
                        late_runs.set(late_runs.get() + 1);
                    });
                }
            }
        });

        signal.set(1);
        // Created once during the write, not re-run by the same write.
        assert_eq!(late_runs.get(), 1);
    }

    #[test]
    fn signal_clone_shares_state() {
        let rt = Runtime::new();
        let signal1 = Signal::new(&rt, 0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);
        assert_eq!(signal1.id(), signal2.id());
    }

    #[test]
    fn signal_ids_are_unique() {
        let rt = Runtime::new();
        let s1 = Signal::new(&rt, 0);
        let s2 = Signal::new(&rt, 0);

        assert_ne!(s1.id(), s2.id());
    }

    #[test]
    fn split_halves_share_cell() {
        let rt = Runtime::new();
        let (read, write) = rt.create_signal(String::from("a"));
        write.update(|s| s.push('b'));
        assert_eq!(read.get(), "ab");
    }
}
