//! Error types for the store layer.
//!
//! The reactive kernel itself never produces errors: computation bodies are
//! plain closures and a panic inside one unwinds straight through `set` or
//! `batch` to whoever triggered the run. The store is the only place where
//! a caller can hand us something malformed, such as a path that walks into
//! a number.

use thiserror::Error;

/// Errors raised while reading or writing through a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A path setter was called with an empty path.
    #[error("store path must not be empty")]
    EmptyPath,

    /// Navigation reached a value that cannot hold children.
    #[error("value at `{path}` is not an object or array")]
    NotAContainer { path: String },

    /// A segment addressing an array is not a number.
    #[error("`{segment}` is not a valid index into the array at `{path}`")]
    InvalidIndex { path: String, segment: String },

    /// An array operation was applied to something else.
    #[error("value at `{path}` is not an array")]
    NotAnArray { path: String },

    /// A merge needed an object on both sides.
    #[error("expected an object at `{path}`")]
    NotAnObject { path: String },

    /// Conversion between a typed value and the store representation failed.
    #[error("failed to convert store value: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result alias used by store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Render a store path for error messages.
pub(crate) fn display_path(path: &str) -> String {
    if path.is_empty() {
        "(root)".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_path_is_named_in_messages() {
        let err = StoreError::NotAContainer {
            path: display_path(""),
        };
        assert_eq!(err.to_string(), "value at `(root)` is not an object or array");
    }

    #[test]
    fn serde_errors_convert() {
        let parse = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        let err: StoreError = parse.into();
        assert!(matches!(err, StoreError::Serde(_)));
    }
}
