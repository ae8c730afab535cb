//! Slot storage for mounted component records.

use crate::component::{ComponentId, ComponentRecord};

struct Slot {
    generation: u32,
    record: Option<ComponentRecord>,
}

/// Component records indexed by [`ComponentId`].
///
/// Vacated slots go on a free list and are handed out again with their
/// generation bumped, so the arena stays as large as the most instances
/// ever mounted at once and an old id never resolves to a newer instance.
#[derive(Default)]
pub(crate) struct ComponentArena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

impl ComponentArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Live records.
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Slots allocated, live or free.
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The id the next [`insert`](Self::insert) will occupy.
    pub(crate) fn vacant_id(&self) -> ComponentId {
        match self.free.last() {
            Some(&index) => ComponentId::with_generation(index, self.slots[index].generation),
            None => ComponentId::new(self.slots.len()),
        }
    }

    /// Stores a record built for [`vacant_id`](Self::vacant_id).
    pub(crate) fn insert(&mut self, record: ComponentRecord) -> ComponentId {
        let id = self.vacant_id();
        match self.free.pop() {
            Some(index) => self.slots[index].record = Some(record),
            None => self.slots.push(Slot {
                generation: id.generation,
                record: Some(record),
            }),
        }
        self.live += 1;
        id
    }

    pub(crate) fn get(&self, id: ComponentId) -> Option<&ComponentRecord> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: ComponentId) -> Option<&mut ComponentRecord> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_mut())
    }

    /// Vacates the slot behind `id`, retiring the id.
    pub(crate) fn remove(&mut self, id: ComponentId) -> Option<ComponentRecord> {
        let slot = self
            .slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)?;
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(record)
    }
}

#[cfg(test)]
#[path = "tests/arena_tests.rs"]
mod tests;
