//! Declarative machine definitions for the Spindle runtime.
//!
//! Where `spindle-machine` machines declare behavior in code, this crate
//! takes the state graph as *data*: a serde-friendly [`Definition`]
//! (states, integer-keyed transitions, any-state events, shutdown
//! sequence), an [`OperationMap`] binding the names the definition
//! mentions to methods on an implementation object, and a
//! [`DefinitionRunner`] that drives one such machine on its own worker
//! thread.
//!
//! ```text
//! Definition (data)        OperationMap (code)
//!        │                        │
//!        └────────┬───────────────┘
//!                 ▼  spawn: validate + bind names (fatal if unknown)
//!        DefinitionRunner
//!                 │  push_event(i32) ──► FIFO ──► worker thread
//!                 ▼
//!        exit → action → StateChanged → entry
//! ```
//!
//! # Events are integers
//!
//! Definition-driven machines key transitions by positive `i32` ids. Id
//! `0` is a state's default transition, fired when nothing matched and
//! re-checked after every transition; negative ids are reserved by the
//! runner.

mod error;
mod model;
mod ops;
mod runner;

pub use error::DefinitionError;
pub use model::{
    AllStateEvent, Definition, State, Transition, DEFAULT_EVENT, INVALID_EVENT, TERMINATE_EVENT,
};
pub use ops::OperationMap;
pub use runner::DefinitionRunner;
