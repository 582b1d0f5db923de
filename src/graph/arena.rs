//! Generation-checked slot storage.
//!
//! Nodes live in slots addressed by a [`NodeHandle`]. Removing a node bumps
//! the slot's generation, so any handle still held by per-node state (queues,
//! DSP instances, transpose maps) stops resolving instead of aliasing the
//! next node that reuses the slot.

/// Typed index into an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

impl NodeHandle {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
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

    pub fn insert(&mut self, value: T) -> NodeHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return NodeHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        NodeHandle {
            index,
            generation: 0,
        }
    }

    pub fn remove(&mut self, handle: NodeHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    NodeHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    /// Remove every entry, invalidating all outstanding handles.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(index as u32);
        }
        // Reuse low slots first.
        self.free.reverse();
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever allocated; an upper bound for handle indices.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Side table keyed by [`NodeHandle`], for state owned outside the arena.
///
/// An entry only resolves for the exact handle it was stored under.
pub struct HandleMap<V> {
    entries: Vec<Option<(u32, V)>>,
    len: usize,
}

impl<V> HandleMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, handle: NodeHandle, value: V) -> Option<V> {
        let index = handle.index();
        if index >= self.entries.len() {
            self.entries.resize_with(index + 1, || None);
        }
        let previous = self.entries[index].replace((handle.generation, value));
        match previous {
            Some((generation, old)) if generation == handle.generation => Some(old),
            Some(_) => None,
            None => {
                self.len += 1;
                None
            }
        }
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&V> {
        match self.entries.get(handle.index())? {
            Some((generation, value)) if *generation == handle.generation => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut V> {
        match self.entries.get_mut(handle.index())? {
            Some((generation, value)) if *generation == handle.generation => Some(value),
            _ => None,
        }
    }

    pub fn get_or_insert_with(&mut self, handle: NodeHandle, make: impl FnOnce() -> V) -> &mut V {
        if self.get(handle).is_none() {
            self.remove_slot(handle.index());
            self.insert(handle, make());
        }
        match &mut self.entries[handle.index()] {
            Some((_, value)) => value,
            None => unreachable!("entry inserted above"),
        }
    }

    pub fn remove(&mut self, handle: NodeHandle) -> Option<V> {
        let entry = self.entries.get_mut(handle.index())?;
        match entry {
            Some((generation, _)) if *generation == handle.generation => {
                self.len -= 1;
                entry.take().map(|(_, value)| value)
            }
            _ => None,
        }
    }

    fn remove_slot(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            if entry.take().is_some() {
                self.len -= 1;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &V)> {
        self.entries.iter().enumerate().filter_map(|(index, entry)| {
            entry.as_ref().map(|(generation, value)| {
                (
                    NodeHandle {
                        index: index as u32,
                        generation: *generation,
                    },
                    value,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NodeHandle, &mut V)> {
        self.entries.iter_mut().enumerate().filter_map(|(index, entry)| {
            entry.as_mut().map(|(generation, value)| {
                (
                    NodeHandle {
                        index: index as u32,
                        generation: *generation,
                    },
                    value,
                )
            })
        })
    }

    /// Remove every entry, handing each value to `f`.
    pub fn drain_with(&mut self, mut f: impl FnMut(NodeHandle, V)) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if let Some((generation, value)) = entry.take() {
                f(
                    NodeHandle {
                        index: index as u32,
                        generation,
                    },
                    value,
                );
            }
        }
        self.len = 0;
    }

    pub fn clear(&mut self) {
        self.drain_with(|_, _| {});
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<V> Default for HandleMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-capacity bitset over handle indices, reused across blocks.
pub struct VisitSet {
    words: Vec<u64>,
}

impl VisitSet {
    pub fn with_capacity(slots: usize) -> Self {
        Self {
            words: vec![0; slots.div_ceil(64).max(1)],
        }
    }

    /// Grow to cover `slots` indices. Only allocates when the graph grew.
    pub fn reserve(&mut self, slots: usize) {
        let needed = slots.div_ceil(64).max(1);
        if needed > self.words.len() {
            self.words.resize(needed, 0);
        }
    }

    /// Mark `handle`; returns false if it was already marked.
    pub fn insert(&mut self, handle: NodeHandle) -> bool {
        let index = handle.index();
        let (word, bit) = (index / 64, index % 64);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let mask = 1u64 << bit;
        let fresh = self.words[word] & mask == 0;
        self.words[word] |= mask;
        fresh
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        let index = handle.index();
        self.words
            .get(index / 64)
            .is_some_and(|word| word & (1u64 << (index % 64)) != 0)
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }
}
