//! Definition layer errors.
//!
//! Everything here is a construction error: a malformed definition or a
//! missing operation fails [`crate::DefinitionRunner::spawn`] before the
//! worker starts. Only a refused worker thread is recoverable; the rest
//! require fixing the definition or the operation map.

use spindle_types::ErrorCode;
use thiserror::Error;

/// Error raised while validating a definition or binding it to an
/// operation map.
#[derive(Debug, Clone, Error)]
pub enum DefinitionError {
    /// The definition declares no states.
    #[error("definition has no states")]
    NoStates,

    /// Two states share one name.
    #[error("duplicate state {name:?}")]
    DuplicateState {
        /// The repeated name.
        name: String,
    },

    /// `first_state` names no declared state.
    #[error("first state {name:?} is not a declared state")]
    UnknownFirstState {
        /// The undeclared name.
        name: String,
    },

    /// A transition endpoint names no declared state.
    #[error("transition references unknown state {name:?}")]
    UnknownState {
        /// The undeclared name.
        name: String,
    },

    /// A user transition or event uses a reserved (non-positive) id.
    ///
    /// Id `0` is the default transition and is only valid as a
    /// transition's event id; `-1` and `-2` are the terminate and invalid
    /// sentinels and never valid.
    #[error("event id {event} is reserved")]
    ReservedEvent {
        /// The offending id.
        event: i32,
    },

    /// Two transitions leave one state on the same event id.
    #[error("duplicate transition from {state:?} on event {event}")]
    DuplicateTransition {
        /// Source state of the duplicates.
        state: String,
        /// Shared event id.
        event: i32,
    },

    /// Two any-state events share one event id.
    #[error("duplicate any-state event {event}")]
    DuplicateGlobalEvent {
        /// Shared event id.
        event: i32,
    },

    /// An action name is not registered in the operation map.
    #[error("operation {name:?} is not registered on the implementation")]
    UnknownOperation {
        /// The unregistered name.
        name: String,
    },

    /// The OS refused to start the worker thread.
    #[error("failed to spawn worker thread: {reason}")]
    WorkerSpawn {
        /// The OS error.
        reason: String,
    },
}

impl ErrorCode for DefinitionError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoStates => "DEF_NO_STATES",
            Self::DuplicateState { .. } => "DEF_DUPLICATE_STATE",
            Self::UnknownFirstState { .. } => "DEF_UNKNOWN_FIRST_STATE",
            Self::UnknownState { .. } => "DEF_UNKNOWN_STATE",
            Self::ReservedEvent { .. } => "DEF_RESERVED_EVENT",
            Self::DuplicateTransition { .. } => "DEF_DUPLICATE_TRANSITION",
            Self::DuplicateGlobalEvent { .. } => "DEF_DUPLICATE_GLOBAL_EVENT",
            Self::UnknownOperation { .. } => "DEF_UNKNOWN_OPERATION",
            Self::WorkerSpawn { .. } => "DEF_WORKER_SPAWN",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::WorkerSpawn { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_types::assert_error_codes;

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(
            &[
                DefinitionError::NoStates,
                DefinitionError::DuplicateState { name: "A".into() },
                DefinitionError::UnknownFirstState { name: "A".into() },
                DefinitionError::UnknownState { name: "A".into() },
                DefinitionError::ReservedEvent { event: -1 },
                DefinitionError::DuplicateTransition {
                    state: "A".into(),
                    event: 1,
                },
                DefinitionError::DuplicateGlobalEvent { event: 1 },
                DefinitionError::UnknownOperation { name: "Op".into() },
                DefinitionError::WorkerSpawn {
                    reason: "out of threads".into(),
                },
            ],
            "DEF_",
        );
    }
}
