//! The declarative state-graph data model.
//!
//! A [`Definition`] describes a machine as data: states, event-keyed
//! transitions between them, any-state events, and the event sequence to
//! play at shutdown. Definitions are plain serde values; they can be
//! written inline, loaded from JSON, or generated.
//!
//! # Event ids
//!
//! | Id | Meaning |
//! |----|---------|
//! | `> 0` | user events |
//! | [`DEFAULT_EVENT`] (0) | the default transition of a state |
//! | [`TERMINATE_EVENT`] (-1) | runner-internal terminate sentinel |
//! | [`INVALID_EVENT`] (-2) | runner-internal "consumed" sentinel |
//!
//! # Example
//!
//! ```
//! use spindle_def::{AllStateEvent, Definition, State, Transition};
//!
//! let def = Definition {
//!     first_state: "Red".into(),
//!     states: vec![State::new("Red"), State::new("Green")],
//!     transitions: vec![
//!         Transition::new("Red", "Green", 1, Some("TurnGreen")),
//!         Transition::new("Green", "Red", 2, Some("TurnRed")),
//!     ],
//!     global_events: vec![AllStateEvent::new(9, Some("Reset"))],
//!     shutdown_events: vec![2],
//! };
//! assert!(def.validate().is_ok());
//! ```

use crate::DefinitionError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Event id of the default transition slot.
pub const DEFAULT_EVENT: i32 = 0;

/// Reserved id: terminates the runner's worker.
pub const TERMINATE_EVENT: i32 = -1;

/// Reserved id: the runner's "event consumed" sentinel.
pub const INVALID_EVENT: i32 = -2;

/// A named state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Unique name within the definition.
    pub name: String,
}

impl State {
    /// Creates a state.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A transition between two states, fired by an event id.
///
/// `event == DEFAULT_EVENT` declares the source state's default
/// transition. `to == from` is a self-loop (exit and entry still run).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Source state name.
    pub from: String,
    /// Destination state name.
    pub to: String,
    /// Triggering event id, or [`DEFAULT_EVENT`].
    pub event: i32,
    /// Operation run between exit and entry, if any.
    pub action: Option<String>,
}

impl Transition {
    /// Creates a transition.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        event: i32,
        action: Option<&str>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            event,
            action: action.map(str::to_owned),
        }
    }
}

/// An event handled in every state.
///
/// Installs a self-loop transition at `event` in each state that does not
/// already declare a transition for that id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllStateEvent {
    /// Triggering event id; must be positive.
    pub event: i32,
    /// Operation run inside the self-loop, if any.
    pub action: Option<String>,
}

impl AllStateEvent {
    /// Creates an any-state event.
    #[must_use]
    pub fn new(event: i32, action: Option<&str>) -> Self {
        Self {
            event,
            action: action.map(str::to_owned),
        }
    }
}

/// A complete declarative machine description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    /// State the machine starts in. Its entry operation is *not* run at
    /// startup.
    pub first_state: String,
    /// All states.
    pub states: Vec<State>,
    /// All transitions.
    pub transitions: Vec<Transition>,
    /// Events handled in every state.
    pub global_events: Vec<AllStateEvent>,
    /// Event ids played, in order, when the runner is stopped, before the
    /// terminate sentinel. Gives the machine a chance to reach a quiescent
    /// state.
    pub shutdown_events: Vec<i32>,
}

impl Definition {
    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// See [`DefinitionError`]; every violation is fatal at construction.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.states.is_empty() {
            return Err(DefinitionError::NoStates);
        }

        let mut names = HashSet::new();
        for state in &self.states {
            if !names.insert(state.name.as_str()) {
                return Err(DefinitionError::DuplicateState {
                    name: state.name.clone(),
                });
            }
        }

        if !names.contains(self.first_state.as_str()) {
            return Err(DefinitionError::UnknownFirstState {
                name: self.first_state.clone(),
            });
        }

        let mut seen: HashMap<(&str, i32), ()> = HashMap::new();
        for t in &self.transitions {
            for endpoint in [&t.from, &t.to] {
                if !names.contains(endpoint.as_str()) {
                    return Err(DefinitionError::UnknownState {
                        name: endpoint.clone(),
                    });
                }
            }
            if t.event < DEFAULT_EVENT {
                return Err(DefinitionError::ReservedEvent { event: t.event });
            }
            if seen.insert((t.from.as_str(), t.event), ()).is_some() {
                return Err(DefinitionError::DuplicateTransition {
                    state: t.from.clone(),
                    event: t.event,
                });
            }
        }

        let mut globals = HashSet::new();
        for g in &self.global_events {
            if g.event <= DEFAULT_EVENT {
                return Err(DefinitionError::ReservedEvent { event: g.event });
            }
            if !globals.insert(g.event) {
                return Err(DefinitionError::DuplicateGlobalEvent { event: g.event });
            }
        }

        for &ev in &self.shutdown_events {
            if ev <= DEFAULT_EVENT {
                return Err(DefinitionError::ReservedEvent { event: ev });
            }
        }

        Ok(())
    }
}
