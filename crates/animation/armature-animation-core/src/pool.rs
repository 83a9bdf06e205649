//! Reusable-instance storage.
//!
//! Two shapes are provided:
//! - [`ObjectPool`] hands out owned values and takes them back after clearing.
//! - [`Arena`] keeps values in place and addresses them by generational [`StateId`].
//!
//! Neither allocates in steady state once warmed up.

use crate::ids::StateId;

/// Types that can be reset to a reusable blank state without dropping their buffers.
pub trait Poolable: Default {
    fn clear(&mut self);
}

#[derive(Debug)]
pub struct ObjectPool<T: Poolable> {
    free: Vec<T>,
    max_size: usize,
}

impl<T: Poolable> ObjectPool<T> {
    pub fn new(max_size: usize) -> Self {
        Self {
            free: Vec::new(),
            max_size,
        }
    }

    /// Pops a cleared instance or builds a fresh default one.
    #[inline]
    pub fn acquire(&mut self) -> T {
        self.free.pop().unwrap_or_default()
    }

    /// Clears `value` and keeps it for reuse while below the size limit.
    pub fn release(&mut self, mut value: T) {
        value.clear();
        if self.free.len() < self.max_size {
            self.free.push(value);
        }
    }

    pub fn idle(&self) -> usize {
        self.free.len()
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.free.truncate(max_size);
    }
}

#[derive(Debug)]
struct ArenaSlot<T> {
    generation: u32,
    occupied: bool,
    value: T,
}

/// Slot storage with a free list. Released slots keep their cleared value so
/// buffers survive across reuse.
#[derive(Debug)]
pub struct Arena<T: Poolable> {
    slots: Vec<ArenaSlot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T: Poolable> Default for Arena<T> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<T: Poolable> Arena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            live: 0,
        }
    }

    pub fn acquire(&mut self) -> StateId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.occupied = true;
            return StateId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(ArenaSlot {
            generation: 0,
            occupied: true,
            value: T::default(),
        });
        StateId {
            index,
            generation: 0,
        }
    }

    /// Clears the value behind `id` and returns the slot to the free list.
    pub fn release(&mut self, id: StateId) -> bool {
        match self.slots.get_mut(id.index as usize) {
            Some(slot) if slot.occupied && slot.generation == id.generation => {
                slot.value.clear();
                slot.occupied = false;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn contains(&self, id: StateId) -> bool {
        self.get(id).is_some()
    }

    #[inline]
    pub fn get(&self, id: StateId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.occupied && slot.generation == id.generation)
            .map(|slot| &slot.value)
    }

    #[inline]
    pub fn get_mut(&mut self, id: StateId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.occupied && slot.generation == id.generation)
            .map(|slot| &mut slot.value)
    }

    /// Moves the value out so it can be mutated alongside the rest of the arena.
    /// Must be paired with [`Arena::restore`].
    pub fn take(&mut self, id: StateId) -> Option<T> {
        self.get_mut(id).map(std::mem::take)
    }

    pub fn restore(&mut self, id: StateId, value: T) {
        if let Some(slot) = self.get_mut(id) {
            *slot = value;
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
