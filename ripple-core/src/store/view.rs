//! Tracked views into a store.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::path;
use super::Store;
use crate::error::StoreResult;

/// What a tracked read found.
#[derive(Debug, Clone)]
pub enum StoreEntry {
    /// A scalar: string, number, bool or null.
    Value(Value),
    /// An object or array, as a view scoped to its path.
    View(StoreView),
}

impl StoreEntry {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            StoreEntry::Value(value) => Some(value),
            StoreEntry::View(_) => None,
        }
    }

    pub fn as_view(&self) -> Option<&StoreView> {
        match self {
            StoreEntry::View(view) => Some(view),
            StoreEntry::Value(_) => None,
        }
    }

    pub fn into_view(self) -> Option<StoreView> {
        match self {
            StoreEntry::View(view) => Some(view),
            StoreEntry::Value(_) => None,
        }
    }

    /// The plain value. Views are snapshotted without tracking.
    pub fn into_value(self) -> Value {
        match self {
            StoreEntry::Value(value) => value,
            StoreEntry::View(view) => view.snapshot(),
        }
    }
}

/// A tracked handle on one container inside a store.
///
/// Every accessor subscribes the running computation to the paths it
/// touches. The root view is obtained from [`Store::view`]; nested views come
/// out of [`StoreView::get`].
#[derive(Clone)]
pub struct StoreView {
    store: Store,
    base: String,
}

impl StoreView {
    pub(crate) fn new(store: Store, base: String) -> Self {
        Self { store, base }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Path of the container this view is scoped to. Empty for the root.
    pub fn base_path(&self) -> &str {
        &self.base
    }

    /// Read `key`, subscribing to its path.
    ///
    /// Missing keys return `None` but still subscribe, so a computation that
    /// looked for a key re-runs once it appears.
    pub fn get(&self, key: &str) -> Option<StoreEntry> {
        let child = path::join(&self.base, key);
        self.store.track(&child);
        self.store.inspect(&child, |found| {
            found.map(|value| {
                if path::is_container(value) {
                    StoreEntry::View(StoreView::new(self.store.clone(), child.clone()))
                } else {
                    StoreEntry::Value(value.clone())
                }
            })
        })
    }

    /// Read `key` as a plain value, subscribing to its path.
    ///
    /// Containers are cloned whole; the subscription is on the container's
    /// own path, which is refreshed whenever anything beneath it changes.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        let child = path::join(&self.base, key);
        self.store.track(&child);
        self.store.read(&child)
    }

    /// Follow a relative dot path, subscribing to every step on the way.
    pub fn path(&self, relative: &str) -> Option<StoreEntry> {
        if relative.is_empty() {
            return Some(StoreEntry::View(self.clone()));
        }
        let mut segments = relative.split('.');
        let last = segments.next_back()?;

        let mut current = self.clone();
        for segment in segments {
            current = current.get(segment)?.into_view()?;
        }
        current.get(last)
    }

    /// Assign `key`. Writing the value that is already there does nothing.
    ///
    /// Returns whether the store changed.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> StoreResult<bool> {
        self.store.write_property(&self.base, key, value.into())
    }

    /// Whether `key` exists, subscribing to its path.
    pub fn has(&self, key: &str) -> bool {
        let child = path::join(&self.base, key);
        self.store.track(&child);
        self.store.inspect(&child, |found| found.is_some())
    }

    /// The container's keys, or indices for an array.
    ///
    /// Subscribes to the container itself, so adding or removing keys re-runs
    /// the reader.
    pub fn keys(&self) -> Vec<String> {
        self.store.track(&self.base);
        self.store
            .inspect(&self.base, |found| found.map(path::keys).unwrap_or_default())
    }

    /// Number of elements (arrays) or keys (objects).
    ///
    /// For arrays this reads the `length` path, like any other property.
    pub fn len(&self) -> usize {
        let is_array = self
            .store
            .inspect(&self.base, |found| matches!(found, Some(Value::Array(_))));
        if is_array {
            self.store.track(&path::join(&self.base, "length"));
        } else {
            self.store.track(&self.base);
        }
        self.store.inspect(&self.base, |found| match found {
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(map)) => map.len(),
            _ => 0,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete `key`. Array elements after it shift down.
    pub fn remove(&self, key: &str) -> StoreResult<Option<Value>> {
        self.store.remove_property(&self.base, key)
    }

    /// Append to this array.
    pub fn push(&self, value: impl Into<Value>) -> StoreResult<()> {
        self.store.push(&self.base, value.into())
    }

    /// Remove the last element of this array.
    pub fn pop(&self) -> StoreResult<Option<Value>> {
        self.store.pop(&self.base)
    }

    /// The whole container, subscribing to it.
    pub fn value(&self) -> Value {
        self.store.track(&self.base);
        if self.base.is_empty() {
            // No signal covers the whole root; follow each top-level key.
            for key in self.store.inspect("", |root| root.map(path::keys).unwrap_or_default()) {
                self.store.track(&key);
            }
        }
        self.snapshot()
    }

    /// Deserialize the whole container, subscribing to it.
    pub fn deserialize<T: DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(serde_json::from_value(self.value())?)
    }

    /// The whole container, without tracking. `Null` if it no longer exists.
    pub fn snapshot(&self) -> Value {
        self.store.read(&self.base).unwrap_or(Value::Null)
    }
}

impl fmt::Debug for StoreView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreView")
            .field("base", &self.base)
            .finish()
    }
}
