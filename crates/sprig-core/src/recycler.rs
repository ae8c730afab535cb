//! Pool of unmounted component records, reused by type.

use crate::collections::map::HashMap;
use crate::component::{ComponentHandle, ComponentId, ComponentRecord, ComponentType, TypeKey};
use crate::runtime::RuntimeHandle;
use crate::value::{Context, Props};

/// Unmounted instances grouped by component type.
///
/// A pooled record is never rendered again; only its cached root tree
/// (`next_vdom`) is handed to the next instance of the same type so the
/// first render can reuse the detached root node.
#[derive(Default)]
pub struct RecyclePool {
    buckets: HashMap<TypeKey, Vec<ComponentRecord>>,
}

impl RecyclePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    pub fn bucket_len(&self, key: TypeKey) -> usize {
        self.buckets.get(&key).map(Vec::len).unwrap_or(0)
    }

    pub(crate) fn collect(&mut self, record: ComponentRecord) {
        record.shared.borrow_mut().owner = None;
        let key = record.type_key();
        log::trace!("pooling {} ({:?})", record.name(), key);
        self.buckets.entry(key).or_default().push(record);
    }

    /// Builds a fresh instance and, when one of the same type is pooled,
    /// moves its cached tree over.
    pub(crate) fn acquire(
        &mut self,
        component_type: ComponentType,
        props: &Props,
        context: &Context,
        id: ComponentId,
        runtime: RuntimeHandle,
        owner: Option<ComponentHandle>,
    ) -> ComponentRecord {
        let mut record = ComponentRecord::new(id, component_type, props, context, runtime, owner);
        let key = component_type.type_key();
        if let Some(mut pooled) = self.buckets.get_mut(&key).and_then(Vec::pop) {
            log::trace!("recycling {} into {id}", component_type.name());
            record.next_vdom = pooled.next_vdom.take();
        }
        record
    }

    /// Empties the pool, returning the records so their cached nodes can be
    /// released.
    pub(crate) fn clear(&mut self) -> Vec<ComponentRecord> {
        self.buckets
            .drain()
            .flat_map(|(_, records)| records)
            .collect()
    }
}

impl std::fmt::Debug for RecyclePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecyclePool")
            .field("len", &self.len())
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/recycler_tests.rs"]
mod tests;
