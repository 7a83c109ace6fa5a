//! Machine author SDK for the Spindle runtime.
//!
//! This crate is where user state machines are written: the
//! [`StateMachine`] trait, the [`TableBuilder`] registration surface, and
//! the [`Mailbox`] a machine uses to post events to itself.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  author's struct                                         │
//! │    state: MyState      ◄── state_set! enum               │
//! │    mailbox: Mailbox    ◄── weak back-ref to the host     │
//! │    ...                                                   │
//! │                                                          │
//! │  impl StateMachine     ◄── configure() declares the      │
//! │                            dispatch table                │
//! └──────────────────────────────────────────────────────────┘
//!                │ spawn
//!                ▼
//!        table_for::<M>()  — built once per type, cached
//!                │
//!                ▼
//!        DispatchTable::dispatch — exit → transition → entry
//! ```
//!
//! # Table-driven, not reflective
//!
//! Handlers are registered explicitly in `configure`, keyed by state and
//! by the event payload's type. There is no handler-name scanning: the
//! registration call *is* the declaration. Per (state, event type) pair at
//! most one handler may exist; duplicates fail the first spawn of the
//! machine type with a [`TableError`].
//!
//! | Declaration | Meaning |
//! |-------------|---------|
//! | `on::<E>(state, h)` | transition handler in `state` for events of type `E` |
//! | `fallback(state, h)` | default handler in `state` for unmatched events |
//! | `entry(state, h)` / `exit(state, h)` | state entry/exit hooks |
//! | `when::<E>(h)` | class-level handler, any state |
//!
//! Event-only machines use `type State = ()` and declare only `when`
//! handlers.

mod machine;
mod registry;
mod state;
mod table;

pub use machine::{Host, Mailbox, StateMachine};
pub use registry::table_for;
pub use state::StateSet;
pub use table::{DispatchTable, TableBuilder, TableError};
