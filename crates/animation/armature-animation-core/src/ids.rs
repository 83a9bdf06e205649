#![allow(dead_code)]
//! Identifiers and simple allocators for core entities.

use serde::{Deserialize, Serialize};

/// Handle to a pooled [`AnimationState`](crate::state::AnimationState).
///
/// The generation is bumped every time the slot is recycled, so a handle
/// kept past its state's lifetime resolves to `None` instead of aliasing
/// whichever state reused the slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct StateId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl StateId {
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Index into an armature's blend-state table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlendId(pub u32);

/// Entry registered on a [`WorldClock`](crate::world_clock::WorldClock).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ClockId(pub u32);

/// Monotonic allocator for clock entries.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_clock: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_clock(&mut self) -> ClockId {
        let id = ClockId(self.next_clock);
        self.next_clock = self.next_clock.wrapping_add(1);
        id
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
