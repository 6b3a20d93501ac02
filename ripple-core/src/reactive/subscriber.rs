//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values. This
//! includes effects and the computations that keep memos up to date.
//!
//! The dependency graph is stored as an explicit bidirectional adjacency:
//!
//! - every signal owns a [`SubscriberSet`] holding the computations that
//!   read it during their most recent run;
//! - every computation owns a [`Dependencies`] list of weak handles to the
//!   subscriber sets it is currently registered in, so it can remove itself
//!   from all of them before it runs again.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

/// Unique identifier for a subscriber.
///
/// Each subscriber (memo, effect, or other reactive computation) gets a unique
/// ID when created. This ID is used to track dependencies and avoid duplicate
/// subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(u64);

impl SignalId {
    /// Generate a new unique signal ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

/// A re-runnable unit of work that reacts to signal changes.
///
/// Signals only ever talk to subscribers through this trait, which keeps the
/// signal side of the graph independent of what the computation produces.
pub trait Computation {
    /// The subscriber's unique ID.
    fn id(&self) -> SubscriberId;

    /// Re-run the computation.
    ///
    /// Implementations drop their previous subscriptions first and rediscover
    /// their dependencies while the body runs.
    fn execute(&self);

    /// Record that this computation has been registered in `set`.
    fn track(&self, set: &Rc<SubscriberSet>);

    /// Stop for good: leave every subscriber set and release captured state.
    ///
    /// Called on every live computation when its runtime is dropped.
    fn dispose(&self) {}
}

/// Subscribers collected by a single signal.
///
/// Iteration order is registration order.
pub struct SubscriberSet {
    signal_id: SignalId,
    subscribers: RefCell<IndexMap<SubscriberId, Rc<dyn Computation>>>,
}

impl SubscriberSet {
    pub(crate) fn new(signal_id: SignalId) -> Rc<Self> {
        Rc::new(Self {
            signal_id,
            subscribers: RefCell::new(IndexMap::new()),
        })
    }

    /// The signal this set belongs to.
    pub fn signal_id(&self) -> SignalId {
        self.signal_id
    }

    /// Register a computation. Returns `false` if it was already present.
    pub fn insert(&self, computation: Rc<dyn Computation>) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let id = computation.id();
        if subscribers.contains_key(&id) {
            return false;
        }
        subscribers.insert(id, computation);
        true
    }

    /// Unregister a computation. Returns `false` if it was not present.
    pub fn remove(&self, id: SubscriberId) -> bool {
        // Bind first so the map borrow ends before the removed entry drops.
        let removed = self.subscribers.borrow_mut().shift_remove(&id);
        removed.is_some()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.borrow().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.borrow().is_empty()
    }

    /// Copy out the current subscribers.
    ///
    /// Notification iterates the copy, because re-running a subscriber
    /// removes it from (and usually re-adds it to) this very set.
    pub fn snapshot(&self) -> SmallVec<[Rc<dyn Computation>; 4]> {
        self.subscribers.borrow().values().cloned().collect()
    }
}

/// The subscriber sets a computation is currently registered in.
///
/// Handles are weak: a signal that has been dropped simply disappears from
/// the list on the next cleanup.
#[derive(Default)]
pub struct Dependencies {
    sets: RefCell<IndexMap<SignalId, Weak<SubscriberSet>>>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `set`. Adding the same set twice has no effect.
    pub fn add(&self, set: &Rc<SubscriberSet>) {
        self.sets
            .borrow_mut()
            .entry(set.signal_id())
            .or_insert_with(|| Rc::downgrade(set));
    }

    /// Remove `subscriber` from every recorded set and forget them all.
    ///
    /// Returns how many live sets the subscriber was removed from.
    pub fn unsubscribe_all(&self, subscriber: SubscriberId) -> usize {
        let sets = std::mem::take(&mut *self.sets.borrow_mut());
        sets.values()
            .filter_map(Weak::upgrade)
            .filter(|set| set.remove(subscriber))
            .count()
    }

    pub fn len(&self) -> usize {
        self.sets.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Recorder {
        id: SubscriberId,
        runs: Cell<usize>,
        deps: Dependencies,
    }

    impl Recorder {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                id: SubscriberId::new(),
                runs: Cell::new(0),
                deps: Dependencies::new(),
            })
        }
    }

    impl Computation for Recorder {
        fn id(&self) -> SubscriberId {
            self.id
        }

        fn execute(&self) {
            self.runs.set(self.runs.get() + 1);
        }

        fn track(&self, set: &Rc<SubscriberSet>) {
            self.deps.add(set);
        }
    }

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn insert_is_idempotent() {
        let set = SubscriberSet::new(SignalId::new());
        let recorder = Recorder::new();

        assert!(set.insert(recorder.clone()));
        assert!(!set.insert(recorder.clone()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn snapshot_keeps_registration_order() {
        let set = SubscriberSet::new(SignalId::new());
        let a = Recorder::new();
        let b = Recorder::new();
        set.insert(b.clone());
        set.insert(a.clone());

        let ids: Vec<_> = set.snapshot().iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn unsubscribe_all_clears_both_sides() {
        let first = SubscriberSet::new(SignalId::new());
        let second = SubscriberSet::new(SignalId::new());
        let recorder = Recorder::new();

        for set in [&first, &second] {
            set.insert(recorder.clone());
            recorder.track(set);
        }
        recorder.track(&first);
        assert_eq!(recorder.deps.len(), 2);

        assert_eq!(recorder.deps.unsubscribe_all(recorder.id), 2);
        assert!(first.is_empty());
        assert!(second.is_empty());
        assert!(recorder.deps.is_empty());
    }

    #[test]
    fn dropped_sets_are_skipped() {
        let recorder = Recorder::new();
        let set = SubscriberSet::new(SignalId::new());
        set.insert(recorder.clone());
        recorder.track(&set);
        drop(set);

        assert_eq!(recorder.deps.unsubscribe_all(recorder.id), 0);
        assert!(recorder.deps.is_empty());
    }
}
