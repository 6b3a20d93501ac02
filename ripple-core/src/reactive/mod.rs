//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, effects
//! and batches. These primitives form the foundation of Ripple's
//! fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while a computation (an effect or a memo) is running, the signal
//! automatically registers that computation as a dependent. When the signal
//! is written, all dependents are re-run.
//!
//! ## Effects
//!
//! An Effect is a computation that runs immediately and then again whenever
//! one of the signals it read on its latest run changes. Effects are used to
//! synchronize reactive state with the outside world.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result in a signal. It
//! recomputes only when one of its dependencies changes, never on read.
//!
//! ## Batches
//!
//! A batch defers re-runs until it completes, so that a computation depending
//! on several signals written together runs once, with the final values.
//!
//! # Implementation Notes
//!
//! Dependency tracking is automatic: a [`Runtime`] keeps a stack of running
//! computations, and a signal read attributes itself to the top of that
//! stack. Each computation drops all of its subscriptions before it runs and
//! rediscovers them while it runs.

mod batch;
mod context;
mod effect;
mod memo;
mod runtime;
mod signal;
mod subscriber;

pub use context::ReactiveContext;
pub use effect::Effect;
pub use memo::Memo;
pub use runtime::{Runtime, RuntimeConfig};
pub use signal::{ReadSignal, Signal, WriteSignal};
pub use subscriber::{Computation, Dependencies, SignalId, SubscriberId, SubscriberSet};
