//! Dot-delimited store paths and navigation of the raw value.
//!
//! A path names a location in the store's object graph: object keys joined
//! with `.`, array indices written as decimal numbers (`items.0.title`).
//! The empty path is the root.

use serde_json::{Map, Value};

use crate::error::{display_path, StoreError, StoreResult};

/// Extend `base` by one segment.
pub(crate) fn join(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}.{key}")
    }
}

/// Split a non-empty path into segments.
pub(crate) fn segments(path: &str) -> StoreResult<Vec<&str>> {
    if path.is_empty() {
        return Err(StoreError::EmptyPath);
    }
    Ok(path.split('.').collect())
}

/// The path of the container holding `path`, or `None` at the top level.
pub(crate) fn parent(path: &str) -> Option<&str> {
    path.rfind('.').map(|at| &path[..at])
}

/// Every proper ancestor of `path`, nearest first. The root is not included.
///
/// `"a.b.c"` yields `"a.b"` then `"a"`.
pub(crate) fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(parent(path), |current| parent(*current))
}

/// `path` followed by all of its ancestors.
pub(crate) fn prefixes(path: &str) -> impl Iterator<Item = &str> {
    std::iter::once(path).chain(ancestors(path))
}

/// The top-level key a path starts with.
pub(crate) fn head(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

/// How far past the end of an array an assignment may land.
const MAX_ARRAY_GAP: usize = 1024;

fn parse_index(container_path: &str, segment: &str) -> StoreResult<usize> {
    segment.parse().map_err(|_| StoreError::InvalidIndex {
        path: display_path(container_path),
        segment: segment.to_string(),
    })
}

/// Look up one child of an object or array.
pub(crate) fn child<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'v>(value: &'v mut Value, key: &str) -> Option<&'v mut Value> {
    match value {
        Value::Object(map) => map.get_mut(key),
        Value::Array(items) => key
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

/// Resolve a path against the raw root. The empty path is the root itself.
pub(crate) fn resolve<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, child)
}

pub(crate) fn resolve_mut<'v>(root: &'v mut Value, path: &str) -> Option<&'v mut Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, child_mut)
}

pub(crate) fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

/// Keys of a container in iteration order: object keys, or array indices.
pub(crate) fn keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Assign `value` to `key` inside `container`.
///
/// Arrays grow as needed, padding with nulls, but an index more than
/// `MAX_ARRAY_GAP` past the end is rejected. Returns the previous value.
pub(crate) fn assign(
    container: &mut Value,
    container_path: &str,
    key: &str,
    value: Value,
) -> StoreResult<Option<Value>> {
    match container {
        Value::Object(map) => Ok(map.insert(key.to_string(), value)),
        Value::Array(items) => {
            let index = parse_index(container_path, key)?;
            if index.saturating_sub(items.len()) > MAX_ARRAY_GAP {
                return Err(StoreError::InvalidIndex {
                    path: display_path(container_path),
                    segment: key.to_string(),
                });
            }
            if index >= items.len() {
                items.resize(index, Value::Null);
                items.push(value);
                Ok(None)
            } else {
                Ok(Some(std::mem::replace(&mut items[index], value)))
            }
        }
        _ => Err(StoreError::NotAContainer {
            path: display_path(container_path),
        }),
    }
}

/// Remove `key` from `container`, returning what was there.
///
/// Object key order is preserved; array elements after `key` shift down.
pub(crate) fn remove(
    container: &mut Value,
    container_path: &str,
    key: &str,
) -> StoreResult<Option<Value>> {
    match container {
        Value::Object(map) => Ok(map.shift_remove(key)),
        Value::Array(items) => {
            let index = parse_index(container_path, key)?;
            Ok((index < items.len()).then(|| items.remove(index)))
        }
        _ => Err(StoreError::NotAContainer {
            path: display_path(container_path),
        }),
    }
}

/// Walk `segments` from `root`, creating empty objects where a step is
/// missing, and return the container at the end.
///
/// Fails if a step lands on a value that cannot hold children.
pub(crate) fn ensure_container<'v>(
    root: &'v mut Value,
    segments: &[&str],
) -> StoreResult<&'v mut Value> {
    let mut current = root;
    let mut walked = String::new();

    for segment in segments {
        if !is_container(current) {
            return Err(StoreError::NotAContainer {
                path: display_path(&walked),
            });
        }
        let container_path = walked.clone();
        walked = join(&walked, segment);

        if child(current, segment).is_none() {
            assign(current, &container_path, segment, Value::Object(Map::new()))?;
        }
        current = child_mut(current, segment).ok_or_else(|| StoreError::NotAContainer {
            path: display_path(&walked),
        })?;
    }

    if is_container(current) {
        Ok(current)
    } else {
        Err(StoreError::NotAContainer {
            path: display_path(&walked),
        })
    }
}
