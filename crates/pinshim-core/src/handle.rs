//! Slot+generation handle table.
//!
//! Backs both the heap's array IDs and the C ABI's runtime/config handles.
//! A removed entry bumps its slot's generation, so every handle issued
//! for the old occupant stops resolving: stale handles return `None`
//! instead of aliasing whatever reuses the slot.

/// Handle layout: upper 32 bits = slot index, lower 32 bits = generation.
fn encode(slot: u32, generation: u32) -> u64 {
    ((slot as u64) << 32) | (generation as u64)
}

fn decode(handle: u64) -> (u32, u32) {
    ((handle >> 32) as u32, handle as u32)
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Maps `u64` handles to owned values, reusing slots through a free list.
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> HandleTable<T> {
    /// Create an empty table. Usable in `static` initializers.
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store `value` and return the handle that names it.
    pub fn insert(&mut self, value: T) -> u64 {
        self.live += 1;
        match self.free.pop() {
            Some(idx) => {
                let slot = &mut self.slots[idx as usize];
                slot.value = Some(value);
                encode(idx, slot.generation)
            }
            None => {
                let idx = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                encode(idx, 0)
            }
        }
    }

    fn slot(&self, handle: u64) -> Option<&Slot<T>> {
        let (idx, generation) = decode(handle);
        self.slots
            .get(idx as usize)
            .filter(|s| s.generation == generation)
    }

    fn slot_mut(&mut self, handle: u64) -> Option<&mut Slot<T>> {
        let (idx, generation) = decode(handle);
        self.slots
            .get_mut(idx as usize)
            .filter(|s| s.generation == generation)
    }

    /// Borrow the value behind `handle`, or `None` if stale/never issued.
    pub fn get(&self, handle: u64) -> Option<&T> {
        self.slot(handle)?.value.as_ref()
    }

    /// Mutably borrow the value behind `handle`.
    pub fn get_mut(&mut self, handle: u64) -> Option<&mut T> {
        self.slot_mut(handle)?.value.as_mut()
    }

    /// Whether `handle` currently resolves.
    pub fn contains(&self, handle: u64) -> bool {
        self.get(handle).is_some()
    }

    /// Remove and return the value behind `handle`.
    ///
    /// Double-remove returns `None`. A slot whose generation wraps back to
    /// zero is retired rather than recycled, so handles from its first
    /// epoch can never resolve again.
    pub fn remove(&mut self, handle: u64) -> Option<T> {
        let (idx, _) = decode(handle);
        let slot = self.slot_mut(handle)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        if slot.generation != 0 {
            self.free.push(idx);
        }
        self.live -= 1;
        Some(value)
    }

    /// Number of values currently stored.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no values are stored.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate live `(handle, value)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &T)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.value
                .as_ref()
                .map(|v| (encode(idx as u32, slot.generation), v))
        })
    }

    /// Iterate live `(handle, value)` pairs mutably in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u64, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(idx, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|v| (encode(idx as u32, generation), v))
        })
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get() {
        let mut table = HandleTable::new();
        let h = table.insert("heap");
        assert_eq!(table.get(h), Some(&"heap"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn removed_handle_is_stale() {
        let mut table = HandleTable::new();
        let h = table.insert(5u8);
        assert_eq!(table.remove(h), Some(5));
        assert!(!table.contains(h));
        assert_eq!(table.get_mut(h), None);
        assert!(table.is_empty());
    }

    #[test]
    fn double_remove_is_none() {
        let mut table = HandleTable::new();
        let h = table.insert(1u8);
        table.remove(h);
        assert_eq!(table.remove(h), None);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn reused_slot_gets_new_generation() {
        let mut table = HandleTable::new();
        let old = table.insert(1u8);
        table.remove(old);
        let new = table.insert(2u8);
        assert_eq!(decode(old).0, decode(new).0);
        assert_ne!(old, new);
        assert_eq!(table.get(old), None);
        assert_eq!(table.get(new), Some(&2));
    }

    #[test]
    fn iter_skips_vacant_slots() {
        let mut table = HandleTable::new();
        let a = table.insert(10u8);
        let b = table.insert(20u8);
        let c = table.insert(30u8);
        table.remove(b);
        let seen: Vec<_> = table.iter().collect();
        assert_eq!(seen, vec![(a, &10), (c, &30)]);
        for (_, v) in table.iter_mut() {
            *v += 1;
        }
        assert_eq!(table.get(c), Some(&31));
    }

    #[test]
    fn wrapped_generation_retires_slot() {
        let mut table = HandleTable::new();
        let h = table.insert(0u8);
        table.remove(h);
        table.slots[0].generation = u32::MAX;
        let last = table.insert(1u8);
        assert_eq!(decode(last), (0, u32::MAX));
        table.remove(last);
        assert_eq!(table.slots[0].generation, 0);
        assert!(!table.free.contains(&0));
        assert_eq!(table.get(encode(0, 0)), None);
        let fresh = table.insert(2u8);
        assert_ne!(decode(fresh).0, 0, "retired slot must not be reused");
    }

    #[test]
    fn unknown_slot_is_none() {
        let table: HandleTable<u8> = HandleTable::new();
        assert_eq!(table.get(encode(12, 0)), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Insert,
            Remove(usize),
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![Just(Op::Insert), (0usize..32).prop_map(Op::Remove)]
        }

        proptest! {
            #[test]
            fn issued_handles_track_a_model(ops in proptest::collection::vec(arb_op(), 1..64)) {
                let mut table = HandleTable::new();
                // Every handle ever issued, with its value while live.
                let mut issued: Vec<(u64, Option<usize>)> = Vec::new();
                for (n, op) in ops.into_iter().enumerate() {
                    match op {
                        Op::Insert => {
                            let h = table.insert(n);
                            prop_assert!(issued.iter().all(|&(old, _)| old != h));
                            issued.push((h, Some(n)));
                        }
                        Op::Remove(i) if !issued.is_empty() => {
                            let idx = i % issued.len();
                            let (h, value) = &mut issued[idx];
                            prop_assert_eq!(table.remove(*h), value.take());
                        }
                        Op::Remove(_) => {}
                    }
                    for &(h, value) in &issued {
                        prop_assert_eq!(table.get(h).copied(), value);
                    }
                    let live = issued.iter().filter(|(_, v)| v.is_some()).count();
                    prop_assert_eq!(table.len(), live);
                    prop_assert_eq!(table.iter().count(), live);
                }
            }
        }
    }
}
