//! Arena + free-index pool
//!
//! Contacts and collision events are recycled through this instead of being
//! allocated per step. Slots are handed out lowest-index first after a
//! `release_all`, so iteration order equals acquisition order within a step.
//! Acquiring past `capacity` grows the arena; the extra slots are dropped
//! again on the next `release_all`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle(u32);

impl PoolHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Pool<T> {
    slots: Vec<Option<T>>,
    /// Free slot indices, popped from the back
    free: Vec<usize>,
    capacity: usize,
    overflow_allocations: u64,
}

impl<T> Pool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            free: (0..capacity).rev().collect(),
            capacity,
            overflow_allocations: 0,
        }
    }

    /// Store `value` in a free slot
    pub fn acquire(&mut self, value: T) -> PoolHandle {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(value);
                index
            }
            None => {
                self.slots.push(Some(value));
                self.overflow_allocations += 1;
                if self.overflow_allocations.is_power_of_two() {
                    log::warn!(
                        "Pool over capacity {} ({} transient allocations so far)",
                        self.capacity,
                        self.overflow_allocations
                    );
                }
                self.slots.len() - 1
            }
        };
        PoolHandle(index as u32)
    }

    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.slots.get(handle.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.slots.get_mut(handle.index()).and_then(Option::as_mut)
    }

    /// Free one slot, returning its value
    pub fn release(&mut self, handle: PoolHandle) -> Option<T> {
        let value = self.slots.get_mut(handle.index())?.take();
        if value.is_some() {
            self.free.push(handle.index());
        }
        value
    }

    /// Free every slot and drop transient growth past `capacity`
    pub fn release_all(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.slots.truncate(self.capacity);
        self.free.clear();
        self.free.extend((0..self.slots.len()).rev());
    }

    /// Keep only values matching `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(|v| !keep(v)) {
                *slot = None;
                self.free.push(index);
            }
        }
    }

    /// Live values in slot order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().flatten()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cumulative count of acquisitions that had to grow the arena
    pub fn overflow_allocations(&self) -> u64 {
        self.overflow_allocations
    }
}
