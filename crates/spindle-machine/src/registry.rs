//! Process-wide dispatch-table registry.
//!
//! A machine type's table is built exactly once, the first time any
//! instance of that type is spawned, and shared by every host in the
//! process. The registry is keyed by [`TypeId`] — the machine type *is*
//! the class identity — and guarded by a single lock during construction;
//! once built, tables are immutable and handed out as `Arc`s.

use crate::{DispatchTable, StateMachine, TableBuilder, TableError};
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

type TableMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

fn tables() -> &'static Mutex<TableMap> {
    static TABLES: OnceLock<Mutex<TableMap>> = OnceLock::new();
    TABLES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the dispatch table for machine type `M`, building it on first
/// use.
///
/// Construction runs `M::configure` under the registry lock; a
/// [`TableError`] (duplicate handler, state handler on an event-only
/// machine) is returned to the spawning caller and nothing is cached, so
/// a fixed build will be retried.
pub fn table_for<M: StateMachine>() -> Result<Arc<DispatchTable<M>>, TableError> {
    let mut tables = tables().lock();
    if let Some(existing) = tables.get(&TypeId::of::<M>()) {
        let table = Arc::clone(existing)
            .downcast::<DispatchTable<M>>()
            .expect("registry entry stored under its own TypeId");
        return Ok(table);
    }

    let mut builder = TableBuilder::new();
    M::configure(&mut builder);
    let table = Arc::new(builder.finish()?);
    tables.insert(TypeId::of::<M>(), table.clone());
    tracing::debug!("built dispatch table for {}", std::any::type_name::<M>());
    Ok(table)
}
