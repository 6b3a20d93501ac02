//! Reactive Stores
//!
//! A store wraps a nested object graph so that every read and write goes
//! through per-path signals.
//!
//! # How Stores Work
//!
//! The raw value lives in one place. Next to it, the store keeps a map from
//! dot-delimited path (`"user.name"`, `"items.0"`) to a [`Signal`]. Signals
//! are created lazily, the first time a path is read or written.
//!
//! - Reading a path through a [`StoreView`] subscribes the running
//!   computation to that path's signal and returns the live value. Objects
//!   and arrays come back as views scoped to the longer path, so chained
//!   reads keep tracking.
//!
//! - Writing a path through a view is a no-op if the value is unchanged.
//!   Otherwise it updates the raw value, notifies the path's signal, and then
//!   re-notifies every ancestor path that already has a signal, so readers
//!   of a whole container see it change.
//!
//! - The [`StoreSetter`] writes by path or by merging a patch. Both forms
//!   run inside a batch and refresh signals without comparing values.
//!
//! Adding or removing a top-level key also notifies a dedicated keys signal,
//! which is what [`StoreView::keys`] on the root subscribes to.

mod path;
mod view;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{display_path, StoreError, StoreResult};
use crate::reactive::{Runtime, Signal};

pub use view::{StoreEntry, StoreView};

struct StoreInner {
    raw: RefCell<Value>,
    signals: RefCell<IndexMap<String, Signal<Value>>>,
    /// Notified when the set of top-level keys changes.
    root_keys: Signal<()>,
}

/// A deep reactive object.
///
/// Cloning yields another handle to the same store.
///
/// # Example
///
/// ```rust
/// use ripple_core::{Runtime, Store};
/// use serde_json::json;
///
/// let rt = Runtime::new();
/// let store = Store::new(&rt, json!({ "user": { "name": "John" } }));
/// let view = store.view();
///
/// view.path("user").and_then(|u| u.into_view()).unwrap().set("name", "Jane").unwrap();
/// assert_eq!(store.snapshot(), json!({ "user": { "name": "Jane" } }));
/// ```
#[derive(Clone)]
pub struct Store {
    runtime: Runtime,
    inner: Rc<StoreInner>,
}

impl Store {
    pub fn new(runtime: &Runtime, initial: Value) -> Self {
        Self {
            runtime: runtime.handle(),
            inner: Rc::new(StoreInner {
                raw: RefCell::new(initial),
                signals: RefCell::new(IndexMap::new()),
                root_keys: Signal::new(runtime, ()),
            }),
        }
    }

    /// Build a store from any serializable value.
    pub fn from_serialize<T: Serialize>(runtime: &Runtime, initial: &T) -> StoreResult<Self> {
        Ok(Self::new(runtime, serde_json::to_value(initial)?))
    }

    /// The runtime this store belongs to, as a non-owning handle.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// A tracked view of the root.
    pub fn view(&self) -> StoreView {
        StoreView::new(self.clone(), String::new())
    }

    pub fn setter(&self) -> StoreSetter {
        StoreSetter {
            store: self.clone(),
        }
    }

    /// Clone the whole raw value without tracking.
    pub fn snapshot(&self) -> Value {
        self.inner.raw.borrow().clone()
    }

    /// Paths that currently own a signal, in creation order.
    pub fn materialized_paths(&self) -> Vec<String> {
        self.inner.signals.borrow().keys().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Signal bookkeeping
    // ------------------------------------------------------------------

    /// The signal for `path`, created with the current value if missing.
    fn signal_for(&self, path: &str) -> Signal<Value> {
        if let Some(signal) = self.materialized(path) {
            return signal;
        }
        let signal = Signal::new(&self.runtime, self.read(path).unwrap_or(Value::Null));
        self.inner
            .signals
            .borrow_mut()
            .insert(path.to_string(), signal.clone());
        signal
    }

    fn materialized(&self, path: &str) -> Option<Signal<Value>> {
        self.inner.signals.borrow().get(path).cloned()
    }

    /// Subscribe the running computation to `path`.
    ///
    /// The root has no value signal; tracking it means tracking its keys.
    fn track(&self, path: &str) {
        if path.is_empty() {
            self.inner.root_keys.track();
        } else {
            self.signal_for(path).track();
        }
    }

    /// Untracked clone of the value at `path`.
    fn read(&self, path: &str) -> Option<Value> {
        path::resolve(&self.inner.raw.borrow(), path).cloned()
    }

    /// Untracked look at the value at `path`.
    fn inspect<R>(&self, path: &str, f: impl FnOnce(Option<&Value>) -> R) -> R {
        f(path::resolve(&self.inner.raw.borrow(), path))
    }

    /// Notify the signal for `path` with its current value.
    fn refresh(&self, path: &str) {
        let value = self.read(path).unwrap_or(Value::Null);
        self.signal_for(path).set(value);
    }

    /// Re-notify every materialized ancestor of `path`, nearest first.
    fn refresh_ancestors(&self, path: &str) {
        for ancestor in path::ancestors(path) {
            if let Some(signal) = self.materialized(ancestor) {
                signal.set(self.read(ancestor).unwrap_or(Value::Null));
            }
        }
    }

    /// Re-notify `path` only if something already reads it.
    fn refresh_if_materialized(&self, path: &str) {
        if let Some(signal) = self.materialized(path) {
            signal.set(self.read(path).unwrap_or(Value::Null));
        }
    }

    fn notify_root_keys(&self) {
        self.inner.root_keys.set(());
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Assign `key` inside the container at `base`, the way a view does it.
    ///
    /// Unchanged values are ignored. Returns whether anything was written.
    fn write_property(&self, base: &str, key: &str, value: Value) -> StoreResult<bool> {
        let path = path::join(base, key);

        let (added, old_len, new_len) = {
            let mut raw = self.inner.raw.borrow_mut();
            let container = path::resolve_mut(&mut raw, base)
                .filter(|c| path::is_container(c))
                .ok_or_else(|| StoreError::NotAContainer {
                    path: display_path(base),
                })?;

            if path::child(container, key) == Some(&value) {
                return Ok(false);
            }
            let old_len = container.as_array().map(Vec::len);
            let previous = path::assign(container, base, key, value.clone())?;
            let new_len = container.as_array().map(Vec::len);
            (previous.is_none(), old_len, new_len)
        };

        self.signal_for(&path).set(value);
        if old_len != new_len {
            self.refresh_if_materialized(&path::join(base, "length"));
        }
        if added && base.is_empty() {
            self.notify_root_keys();
        }
        self.refresh_ancestors(&path);
        Ok(true)
    }

    /// Remove `key` from the container at `base`.
    fn remove_property(&self, base: &str, key: &str) -> StoreResult<Option<Value>> {
        let (removed, shifted) = {
            let mut raw = self.inner.raw.borrow_mut();
            let container = path::resolve_mut(&mut raw, base).ok_or_else(|| {
                StoreError::NotAContainer {
                    path: display_path(base),
                }
            })?;
            let before = container.as_array().map(Vec::len);
            let removed = path::remove(container, base, key)?;
            (removed, before)
        };
        let Some(removed) = removed else {
            return Ok(None);
        };

        self.runtime.batch(|| {
            let path = path::join(base, key);
            match shifted {
                // Every element from `key` on moved down one slot.
                Some(old_len) => {
                    let start = key.parse::<usize>().unwrap_or(0);
                    for index in start..old_len {
                        self.refresh_if_materialized(&path::join(base, &index.to_string()));
                    }
                    self.refresh_if_materialized(&path::join(base, "length"));
                }
                None => self.refresh_if_materialized(&path),
            }
            if base.is_empty() {
                self.notify_root_keys();
            }
            self.refresh_ancestors(&path);
        });
        Ok(Some(removed))
    }

    /// Append to the array at `base`.
    fn push(&self, base: &str, value: Value) -> StoreResult<()> {
        let index = {
            let mut raw = self.inner.raw.borrow_mut();
            let items = path::resolve_mut(&mut raw, base)
                .and_then(Value::as_array_mut)
                .ok_or_else(|| StoreError::NotAnArray {
                    path: display_path(base),
                })?;
            items.push(value.clone());
            items.len() - 1
        };

        self.runtime.batch(|| {
            let path = path::join(base, &index.to_string());
            self.signal_for(&path).set(value);
            self.refresh_if_materialized(&path::join(base, "length"));
            if base.is_empty() {
                self.notify_root_keys();
            }
            self.refresh_ancestors(&path);
        });
        Ok(())
    }

    /// Remove the last element of the array at `base`.
    fn pop(&self, base: &str) -> StoreResult<Option<Value>> {
        let popped = {
            let mut raw = self.inner.raw.borrow_mut();
            let items = path::resolve_mut(&mut raw, base)
                .and_then(Value::as_array_mut)
                .ok_or_else(|| StoreError::NotAnArray {
                    path: display_path(base),
                })?;
            items.pop().map(|value| (items.len(), value))
        };
        let Some((index, value)) = popped else {
            return Ok(None);
        };

        self.runtime.batch(|| {
            let path = path::join(base, &index.to_string());
            self.refresh_if_materialized(&path);
            self.refresh_if_materialized(&path::join(base, "length"));
            if base.is_empty() {
                self.notify_root_keys();
            }
            self.refresh_ancestors(&path);
        });
        Ok(Some(value))
    }

    /// Path form of the setter.
    fn set_path(&self, target: &str, value: Value) -> StoreResult<()> {
        let segments = path::segments(target)?;
        let Some((leaf, parents)) = segments.split_last() else {
            return Err(StoreError::EmptyPath);
        };

        debug!(runtime = %self.runtime.label(), path = target, "store path set");

        // Every container the write passes through, root first.
        let containers: Vec<String> = (0..=parents.len())
            .map(|depth| parents[..depth].join("."))
            .collect();
        let array_lengths = |raw: &Value| -> Vec<Option<usize>> {
            containers
                .iter()
                .map(|container| {
                    path::resolve(raw, container)
                        .and_then(Value::as_array)
                        .map(Vec::len)
                })
                .collect()
        };

        self.runtime.batch(|| {
            let (added_root_key, before, after) = {
                let mut raw = self.inner.raw.borrow_mut();
                let added = path::child(&raw, path::head(target)).is_none();
                let before = array_lengths(&*raw);
                let container = path::ensure_container(&mut raw, parents)?;
                path::assign(container, &parents.join("."), leaf, value)?;
                (added, before, array_lengths(&*raw))
            };

            for prefix in path::prefixes(target) {
                self.refresh(prefix);
            }
            let resized = before.iter().zip(&after).map(|(old, new)| old != new);
            for (container, resized) in containers.iter().zip(resized) {
                if resized {
                    self.refresh_if_materialized(&path::join(container, "length"));
                }
            }
            if added_root_key {
                self.notify_root_keys();
            }
            Ok(())
        })
    }

    /// Function form of the setter.
    fn merge(&self, f: impl FnOnce(&Value) -> Value) -> StoreResult<()> {
        let current = self.snapshot();
        let patch = match f(&current) {
            Value::Object(patch) => patch,
            _ => {
                return Err(StoreError::NotAnObject {
                    path: "(patch)".to_string(),
                })
            }
        };

        debug!(
            runtime = %self.runtime.label(),
            keys = patch.len(),
            "store merged"
        );

        self.runtime.batch(|| {
            {
                let mut raw = self.inner.raw.borrow_mut();
                let Value::Object(root) = &mut *raw else {
                    return Err(StoreError::NotAnObject {
                        path: display_path(""),
                    });
                };
                for (key, value) in patch {
                    root.insert(key, value);
                }
            }

            let signals: Vec<(String, Signal<Value>)> = self
                .inner
                .signals
                .borrow()
                .iter()
                .map(|(path, signal)| (path.clone(), signal.clone()))
                .collect();
            for (path, signal) in signals {
                signal.set(self.read(&path).unwrap_or(Value::Null));
            }
            self.notify_root_keys();
            Ok(())
        })
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("value", &*self.inner.raw.borrow())
            .field("materialized", &self.inner.signals.borrow().len())
            .finish()
    }
}

/// Writes to a store by path or by merging a patch.
#[derive(Clone, Debug)]
pub struct StoreSetter {
    store: Store,
}

impl StoreSetter {
    /// Assign `value` at a dot path, creating missing objects on the way.
    ///
    /// The signal of every prefix of the path is refreshed, without
    /// comparing old and new values. Runs as one batch.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> StoreResult<()> {
        self.store.set_path(path, value.into())
    }

    /// Shallow-merge `f(current)` onto the root object.
    ///
    /// Every materialized path is then re-notified with its current value.
    /// Runs as one batch.
    pub fn update(&self, f: impl FnOnce(&Value) -> Value) -> StoreResult<()> {
        self.store.merge(f)
    }

    /// Serialize `value` and assign it at `path`.
    pub fn set_serialized<T: Serialize>(&self, path: &str, value: &T) -> StoreResult<()> {
        self.store.set_path(path, serde_json::to_value(value)?)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}
