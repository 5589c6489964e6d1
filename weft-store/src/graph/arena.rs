//! Generation-checked arena.
//!
//! Publishers and listeners live in arenas owned by the registry. An [`Id`]
//! carries the generation of the slot it was issued for, so an id held after
//! its entry was removed (an unsubscribed listener, say) resolves to nothing
//! instead of to whatever reuses the slot.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Index into an [`Arena<T>`].
pub struct Id<T> {
    slot: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    fn new(slot: u32, generation: u32) -> Self {
        Self {
            slot,
            generation,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.generation == other.generation
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

enum Entry<T> {
    Vacant,
    /// Allocated but not yet filled; the value is still being built.
    Reserved,
    Occupied(T),
}

struct Slot<T> {
    generation: u32,
    entry: Entry<T>,
}

pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> Id<T> {
        self.allocate(Entry::Occupied(value))
    }

    /// Allocate a slot whose value arrives later through [`Arena::fill`].
    pub fn reserve(&mut self) -> Id<T> {
        self.allocate(Entry::Reserved)
    }

    /// Fill a reserved slot. Returns false if `id` is not reserved.
    pub fn fill(&mut self, id: Id<T>, value: T) -> bool {
        match self.slot_mut(id) {
            Some(slot) if matches!(slot.entry, Entry::Reserved) => {
                slot.entry = Entry::Occupied(value);
                true
            }
            _ => false,
        }
    }

    pub fn is_reserved(&self, id: Id<T>) -> bool {
        self.slot(id)
            .is_some_and(|slot| matches!(slot.entry, Entry::Reserved))
    }

    pub fn get(&self, id: Id<T>) -> Option<&T> {
        match self.slot(id) {
            Some(Slot {
                entry: Entry::Occupied(value),
                ..
            }) => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: Id<T>) -> Option<&mut T> {
        match self.slot_mut(id) {
            Some(Slot {
                entry: Entry::Occupied(value),
                ..
            }) => Some(value),
            _ => None,
        }
    }

    /// Remove an occupied entry and retire its generation.
    pub fn remove(&mut self, id: Id<T>) -> Option<T> {
        let slot = self.slot_mut(id)?;
        let value = match std::mem::replace(&mut slot.entry, Entry::Vacant) {
            Entry::Occupied(value) => value,
            other => {
                slot.entry = other;
                return None;
            }
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot);
        self.len -= 1;
        Some(value)
    }

    /// Give back a reserved slot that will never be filled.
    pub fn release(&mut self, id: Id<T>) -> bool {
        match self.slot_mut(id) {
            Some(slot) if matches!(slot.entry, Entry::Reserved) => {
                slot.entry = Entry::Vacant;
                slot.generation = slot.generation.wrapping_add(1);
            }
            _ => return false,
        }
        self.free.push(id.slot);
        self.len -= 1;
        true
    }

    /// Number of reserved and occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match &slot.entry {
                Entry::Occupied(value) => Some((Id::new(index as u32, slot.generation), value)),
                _ => None,
            })
    }

    fn allocate(&mut self, entry: Entry<T>) -> Id<T> {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = entry;
            return Id::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry,
        });
        Id::new(index, 0)
    }

    fn slot(&self, id: Id<T>) -> Option<&Slot<T>> {
        self.slots
            .get(id.slot as usize)
            .filter(|slot| slot.generation == id.generation)
    }

    fn slot_mut(&mut self, id: Id<T>) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(id.slot as usize)
            .filter(|slot| slot.generation == id.generation)
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_and_remove() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));

        assert_eq!(arena.remove(a), Some("a"));
        assert_eq!(arena.len(), 1);
        assert!(arena.get(a).is_none());
        assert!(arena.remove(a).is_none());
    }

    #[test]
    fn stale_ids_do_not_see_reused_slots() {
        let mut arena = Arena::new();
        let old = arena.insert(1);
        arena.remove(old);

        let new = arena.insert(2);
        assert_ne!(old, new);
        assert!(arena.get(old).is_none());
        assert_eq!(arena.get(new), Some(&2));
    }

    #[test]
    fn reserved_slots_fill_once() {
        let mut arena = Arena::new();
        let id = arena.reserve();

        assert!(arena.is_reserved(id));
        assert!(arena.get(id).is_none());
        assert_eq!(arena.len(), 1);

        assert!(arena.fill(id, 7));
        assert!(!arena.is_reserved(id));
        assert_eq!(arena.get(id), Some(&7));

        assert!(!arena.fill(id, 8));
        assert_eq!(arena.get(id), Some(&7));
    }

    #[test]
    fn released_slots_are_retired() {
        let mut arena = Arena::new();
        let kept = arena.insert(1);
        let id = arena.reserve();

        assert!(!arena.release(kept));
        assert!(arena.release(id));
        assert!(!arena.is_reserved(id));
        assert!(!arena.fill(id, 2));
        assert_eq!(arena.len(), 1);

        let reused = arena.insert(3);
        assert_ne!(reused, id);
        assert_eq!(arena.get(reused), Some(&3));
    }

    #[test]
    fn iter_skips_vacant_and_reserved() {
        let mut arena = Arena::new();
        let a = arena.insert('a');
        let _reserved = arena.reserve();
        let c = arena.insert('c');
        let b = arena.insert('b');
        arena.remove(b);

        let seen: Vec<_> = arena.iter().map(|(id, value)| (id, *value)).collect();
        assert_eq!(seen, vec![(a, 'a'), (c, 'c')]);
    }
}
