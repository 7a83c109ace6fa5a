//! Named operations on a definition's implementation object.
//!
//! A [`Definition`](crate::Definition) refers to behavior by name:
//! transition actions by their declared `action`, state entry and exit by
//! the conventions `"<StateName>StateEntry"` and `"<StateName>StateExit"`.
//! The [`OperationMap`] is where those names are bound to code — the
//! author registers each public operation of the implementation object
//! once, and the runner resolves names against the map at construction.
//! An action name the map does not contain fails construction; absent
//! entry/exit names simply mean the state has no entry/exit behavior.
//!
//! ```
//! use spindle_def::OperationMap;
//!
//! struct Light {
//!     log: Vec<&'static str>,
//! }
//!
//! impl Light {
//!     fn turn_green(&mut self) {
//!         self.log.push("green");
//!     }
//! }
//!
//! let mut ops = OperationMap::new();
//! ops.register("TurnGreen", Light::turn_green)
//!     .register("GreenStateEntry", |l: &mut Light| l.log.push("enter"));
//! assert!(ops.contains("TurnGreen"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

pub(crate) type Operation<T> = Arc<dyn Fn(&mut T) + Send + Sync>;

/// Name → operation registry for one implementation type.
pub struct OperationMap<T> {
    ops: HashMap<String, Operation<T>>,
}

impl<T> Default for OperationMap<T> {
    fn default() -> Self {
        Self {
            ops: HashMap::new(),
        }
    }
}

impl<T> OperationMap<T> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `op` under `name`, replacing any previous registration.
    pub fn register<F>(&mut self, name: impl Into<String>, op: F) -> &mut Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.ops.insert(name.into(), Arc::new(op));
        self
    }

    /// Whether an operation is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Number of registered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn get(&self, name: &str) -> Option<Operation<T>> {
        self.ops.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        hits: u32,
    }

    #[test]
    fn registered_operation_is_invocable() {
        let mut ops = OperationMap::new();
        ops.register("Bump", |c: &mut Counter| c.hits += 1);

        let mut counter = Counter { hits: 0 };
        ops.get("Bump").unwrap()(&mut counter);
        assert_eq!(counter.hits, 1);
    }

    #[test]
    fn missing_name_is_none() {
        let ops: OperationMap<Counter> = OperationMap::new();
        assert!(!ops.contains("Bump"));
        assert!(ops.get("Bump").is_none());
    }

    #[test]
    fn method_references_register() {
        impl Counter {
            fn reset(&mut self) {
                self.hits = 0;
            }
        }

        let mut ops = OperationMap::new();
        ops.register("Reset", Counter::reset);

        let mut counter = Counter { hits: 5 };
        ops.get("Reset").unwrap()(&mut counter);
        assert_eq!(counter.hits, 0);
    }

    #[test]
    fn re_registration_replaces() {
        let mut ops = OperationMap::new();
        ops.register("Op", |c: &mut Counter| c.hits = 1);
        ops.register("Op", |c: &mut Counter| c.hits = 2);
        assert_eq!(ops.len(), 1);

        let mut counter = Counter { hits: 0 };
        ops.get("Op").unwrap()(&mut counter);
        assert_eq!(counter.hits, 2);
    }
}
