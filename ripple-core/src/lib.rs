//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple reactive state engine.
//! It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - Update coalescing through batches
//! - Deep reactive stores over nested JSON-like values
//!
//! Everything is synchronous and single-threaded. Each [`Runtime`] is an
//! isolated reactive universe: it owns its own execution-context stack and
//! batch queue, so several runtimes can live side by side in one process.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `store`: Per-path signals over a nested object graph
//!
//! # Example
//!
//! ```rust
//! use ripple_core::Runtime;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let rt = Runtime::new();
//!
//! // Create a signal
//! let (count, set_count) = rt.create_signal(0);
//!
//! // Create a derived value
//! let doubled = rt.create_memo({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! // Create an effect
//! let seen = Rc::new(Cell::new(0));
//! rt.create_effect({
//!     let seen = seen.clone();
//!     move || seen.set(doubled.get())
//! });
//!
//! // Update the signal, the effect re-runs synchronously
//! set_count.set(5);
//! assert_eq!(seen.get(), 10);
//! ```

pub mod error;
pub mod reactive;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use reactive::{
    Effect, Memo, ReadSignal, Runtime, RuntimeConfig, Signal, SubscriberId, WriteSignal,
};
pub use store::{Store, StoreEntry, StoreSetter, StoreView};
