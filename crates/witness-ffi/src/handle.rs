//! Generation-checked handle table for objects owned across the C boundary.
//!
//! A handle packs a slot index (upper 32 bits) and the slot's generation
//! (lower 32 bits). Removing a value bumps the generation, so a stale or
//! doubly-freed handle resolves to `None` instead of another object.

fn pack(index: u32, generation: u32) -> u64 {
    (u64::from(index) << 32) | u64::from(generation)
}

fn unpack(handle: u64) -> (usize, u32) {
    ((handle >> 32) as usize, handle as u32)
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Owned values addressed by `u64` handles, with slot reuse.
pub(crate) struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    vacant: Vec<u32>,
}

impl<T> HandleTable<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            vacant: Vec::new(),
        }
    }

    pub fn insert(&mut self, value: T) -> u64 {
        match self.vacant.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.value = Some(value);
                pack(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                pack(index, 0)
            }
        }
    }

    fn slot(&self, handle: u64) -> Option<&Slot<T>> {
        let (index, generation) = unpack(handle);
        self.slots
            .get(index)
            .filter(|slot| slot.generation == generation)
    }

    pub fn get(&self, handle: u64) -> Option<&T> {
        self.slot(handle)?.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: u64) -> Option<&mut T> {
        let (index, generation) = unpack(handle);
        let slot = self.slots.get_mut(index)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Take the value out and invalidate every copy of `handle`.
    ///
    /// A slot whose generation wraps to zero is retired rather than reused.
    pub fn remove(&mut self, handle: u64) -> Option<T> {
        let (index, generation) = unpack(handle);
        let slot = self.slots.get_mut(index)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        if slot.generation != 0 {
            self.vacant.push(index as u32);
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get() {
        let mut table = HandleTable::new();
        let handle = table.insert("a");
        assert_eq!(table.get(handle), Some(&"a"));
    }

    #[test]
    fn removed_handles_go_stale() {
        let mut table = HandleTable::new();
        let handle = table.insert(7_u32);
        assert_eq!(table.remove(handle), Some(7));
        assert_eq!(table.get(handle), None);
        assert_eq!(table.remove(handle), None);

        let reused = table.insert(8_u32);
        assert_ne!(reused, handle);
        assert_eq!(unpack(reused).0, unpack(handle).0);
        assert_eq!(table.get(handle), None);
        assert_eq!(table.get(reused), Some(&8));
    }

    #[test]
    fn get_mut_writes_through() {
        let mut table = HandleTable::new();
        let handle = table.insert(1_u32);
        if let Some(value) = table.get_mut(handle) {
            *value = 2;
        }
        assert_eq!(table.get(handle), Some(&2));
    }

    #[test]
    fn unknown_slot_is_none() {
        let table: HandleTable<u32> = HandleTable::new();
        assert_eq!(table.get(pack(3, 0)), None);
    }
}
