/// Index-addressed storage with slot recycling.
///
/// Values live in a dense `Vec<Option<T>>`; removed slots go on a free
/// stack and are handed out again by the next `insert`. Indices are
/// stable for the lifetime of the value, which is what the BVH needs for
/// parent/child links and for the ids it returns to callers.
///
/// Unlike `SlotMap` there is no generation counter: a stale index may
/// observe a newer value. Owners must forget indices they remove.
#[derive(Debug, Clone)]
pub struct SlotPool<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
    len: u32,
}

impl<T> SlotPool<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new(), len: 0 }
    }

    /// Store `value`, reusing the most recently freed slot if any.
    pub fn insert(&mut self, value: T) -> u32 {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(value);
                index
            }
            None => {
                self.slots.push(Some(value));
                (self.slots.len() - 1) as u32
            }
        }
    }

    /// Take the value out of `index`. Returns `None` for a vacant slot.
    pub fn remove(&mut self, index: u32) -> Option<T> {
        let value = self.slots.get_mut(index as usize)?.take()?;
        self.len -= 1;
        self.free.push(index);
        Some(value)
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots.get_mut(index as usize)?.as_mut()
    }

    pub fn contains(&self, index: u32) -> bool {
        self.get(index).is_some()
    }

    /// Number of occupied slots
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Highest slot index ever handed out + 1.
    pub fn high_water_mark(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i as u32, v)))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.len = 0;
    }
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::ops::Index<u32> for SlotPool<T> {
    type Output = T;

    /// Panics on a vacant slot; internal links are always live.
    fn index(&self, index: u32) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic!("SlotPool: vacant slot {}", index),
        }
    }
}

impl<T> std::ops::IndexMut<u32> for SlotPool<T> {
    fn index_mut(&mut self, index: u32) -> &mut T {
        match self.get_mut(index) {
            Some(value) => value,
            None => panic!("SlotPool: vacant slot {}", index),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "slot_pool_tests.rs"]
mod tests;
