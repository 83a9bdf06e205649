#![allow(dead_code)]
//! Per-target layered weight accumulation.
//!
//! Every (channel, target) pair touched by any playing state owns one
//! [`BlendState`]. The table is reset at the start of each tick; states then
//! visit it in descending layer order and each asks [`BlendState::update`]
//! whether, and with what weight, it may contribute.

use hashbrown::HashMap;

use crate::ids::BlendId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendChannel {
    BoneTransform,
    BoneAlpha,
    Surface,
    SlotDeform,
    SlotAlpha,
    SlotZIndex,
}

/// What a blend accumulator writes into; indices refer to the rig.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendTarget {
    Bone(usize),
    Surface(usize),
    Slot(usize),
    /// One display frame of a slot; mesh deforms blend per display.
    Display { slot: usize, display: usize },
}

impl BlendTarget {
    /// Bone or slot index in the rig.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            BlendTarget::Bone(i) | BlendTarget::Surface(i) | BlendTarget::Slot(i) => i,
            BlendTarget::Display { slot, .. } => slot,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendState {
    /// 0 untouched this tick, 1 first contributor (overwrite), >1 later contributors (add).
    pub dirty: u32,
    pub layer: i32,
    pub left_weight: f64,
    pub layer_weight: f64,
    pub blend_weight: f64,
    pub channel: BlendChannel,
    pub target: BlendTarget,
}

impl BlendState {
    pub fn new(channel: BlendChannel, target: BlendTarget) -> Self {
        Self {
            dirty: 0,
            layer: 0,
            left_weight: 0.0,
            layer_weight: 0.0,
            blend_weight: 0.0,
            channel,
            target,
        }
    }

    /// Claims weight for a state at `layer` whose effective weight is `weight`.
    /// Returns whether the caller should blend this tick; the granted weight
    /// is left in `blend_weight`.
    pub fn update(&mut self, layer: i32, weight: f64) -> bool {
        if self.dirty > 0 {
            if self.left_weight > 0.0 {
                if self.layer != layer {
                    if self.layer_weight >= self.left_weight {
                        self.dirty += 1;
                        self.layer = layer;
                        self.left_weight = 0.0;
                        self.blend_weight = 0.0;
                        return false;
                    }
                    self.layer = layer;
                    self.left_weight -= self.layer_weight;
                    self.layer_weight = 0.0;
                }

                let weight = weight * self.left_weight;
                self.dirty += 1;
                self.blend_weight = weight;
                self.layer_weight += weight;
                return true;
            }
            return false;
        }

        self.dirty += 1;
        self.layer = layer;
        self.left_weight = 1.0;
        self.blend_weight = weight;
        self.layer_weight = weight;
        true
    }

    #[inline]
    pub fn reset(&mut self) {
        self.dirty = 0;
        self.layer = 0;
        self.left_weight = 0.0;
        self.layer_weight = 0.0;
        self.blend_weight = 0.0;
    }
}

/// All blend accumulators of one armature, keyed by channel and target.
#[derive(Debug, Default)]
pub struct BlendStateTable {
    index: HashMap<(BlendChannel, BlendTarget), BlendId>,
    states: Vec<BlendState>,
}

impl BlendStateTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            states: Vec::with_capacity(capacity),
        }
    }

    pub fn get_or_insert(&mut self, channel: BlendChannel, target: BlendTarget) -> BlendId {
        if let Some(id) = self.index.get(&(channel, target)) {
            return *id;
        }
        let id = BlendId(self.states.len() as u32);
        self.states.push(BlendState::new(channel, target));
        self.index.insert((channel, target), id);
        id
    }

    pub fn find(&self, channel: BlendChannel, target: BlendTarget) -> Option<&BlendState> {
        self.index
            .get(&(channel, target))
            .and_then(|id| self.get(*id))
    }

    #[inline]
    pub fn get(&self, id: BlendId) -> Option<&BlendState> {
        self.states.get(id.0 as usize)
    }

    #[inline]
    pub fn get_mut(&mut self, id: BlendId) -> Option<&mut BlendState> {
        self.states.get_mut(id.0 as usize)
    }

    pub fn reset_all(&mut self) {
        for state in &mut self.states {
            state.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    fn fresh() -> BlendState {
        BlendState::new(BlendChannel::BoneTransform, BlendTarget::Bone(0))
    }

    #[test]
    fn first_contributor_takes_its_full_weight() {
        let mut bs = fresh();
        assert!(bs.update(0, 0.4));
        assert_eq!(bs.dirty, 1);
        approx(bs.blend_weight, 0.4, 1e-12);
    }

    #[test]
    fn higher_layer_claims_budget_first() {
        let mut bs = fresh();
        assert!(bs.update(2, 0.7));
        assert!(bs.update(1, 1.0));
        approx(bs.blend_weight, 0.3, 1e-12);
        assert_eq!(bs.dirty, 2);
    }

    #[test]
    fn exhausted_layer_blocks_lower_layers() {
        let mut bs = fresh();
        assert!(bs.update(2, 1.0));
        assert!(!bs.update(1, 1.0));
        assert!(!bs.update(0, 1.0));
        approx(bs.blend_weight, 0.0, 1e-12);
    }

    #[test]
    fn same_layer_scales_by_remaining_budget() {
        let mut bs = fresh();
        assert!(bs.update(0, 0.5));
        assert!(bs.update(0, 0.5));
        // Same layer keeps the full remaining budget; sum of factors stays <= 1.
        approx(bs.blend_weight, 0.5, 1e-12);
        approx(bs.layer_weight, 1.0, 1e-12);
    }

    #[test]
    fn table_reuses_ids_and_resets() {
        let mut table = BlendStateTable::with_capacity(4);
        let a = table.get_or_insert(BlendChannel::BoneAlpha, BlendTarget::Bone(1));
        let b = table.get_or_insert(BlendChannel::BoneAlpha, BlendTarget::Bone(1));
        let c = table.get_or_insert(BlendChannel::BoneTransform, BlendTarget::Bone(1));
        assert_eq!(a, b);
        assert_ne!(a, c);
        table.get_mut(a).unwrap().update(0, 1.0);
        table.reset_all();
        assert_eq!(table.get(a).unwrap().dirty, 0);
        assert_eq!(table.len(), 2);
    }
}
