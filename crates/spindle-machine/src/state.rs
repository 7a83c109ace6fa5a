//! The state-enum contract for table-driven machines.
//!
//! A machine's states are a plain Rust enum with contiguous discriminants
//! starting at zero. [`StateSet`] is what the dispatch table needs from
//! such an enum: how many states exist, each value's index, and a display
//! name. The [`state_set!`](crate::state_set) macro declares the enum and
//! derives the impl in one step.
//!
//! Event-only machines — machines with handlers but no state variable —
//! use `()` as their state type; its `COUNT` of zero is how the dispatch
//! layer recognizes them.

use std::fmt;

/// Contract between a state enum and the dispatch table.
///
/// # Example
///
/// ```
/// use spindle_machine::{state_set, StateSet};
///
/// state_set! {
///     pub enum Door { Closed, Open }
/// }
///
/// assert_eq!(Door::COUNT, 2);
/// assert_eq!(Door::Open.index(), 1);
/// assert_eq!(Door::Open.name(), "Open");
/// ```
pub trait StateSet: Copy + Eq + fmt::Debug + Send + 'static {
    /// Number of states. Zero marks an event-only machine.
    const COUNT: usize;

    /// The value's position in the dispatch table, `0..COUNT`.
    fn index(self) -> usize;

    /// Display name, used in diagnostics.
    fn name(self) -> &'static str;
}

/// `()` is the state type of event-only machines.
impl StateSet for () {
    const COUNT: usize = 0;

    fn index(self) -> usize {
        0
    }

    fn name(self) -> &'static str {
        ""
    }
}

/// Declares a state enum and implements [`StateSet`] for it.
///
/// The enum gets contiguous discriminants in declaration order, which is
/// what `index()` relies on; do not add explicit discriminants.
///
/// ```
/// use spindle_machine::state_set;
///
/// state_set! {
///     /// Connection lifecycle.
///     pub enum Conn { Idle, Connecting, Established }
/// }
/// ```
#[macro_export]
macro_rules! state_set {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::StateSet for $name {
            const COUNT: usize = [$(stringify!($variant)),+].len();

            fn index(self) -> usize {
                self as usize
            }

            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    state_set! {
        enum Phase { Warmup, Steady, Drain }
    }

    #[test]
    fn count_matches_variants() {
        assert_eq!(Phase::COUNT, 3);
    }

    #[test]
    fn indices_are_contiguous() {
        assert_eq!(Phase::Warmup.index(), 0);
        assert_eq!(Phase::Steady.index(), 1);
        assert_eq!(Phase::Drain.index(), 2);
    }

    #[test]
    fn names_match_variants() {
        assert_eq!(Phase::Steady.name(), "Steady");
    }

    #[test]
    fn unit_is_stateless() {
        assert_eq!(<() as StateSet>::COUNT, 0);
    }
}
