//! Runtime pose targets: bones, surfaces, slots and IK constraints.
//!
//! Timelines write into the `animation_pose`/color/deform buffers here and set
//! dirty flags. Turning those into world transforms and draw calls is the
//! host's job.

use std::sync::Arc;

use hashbrown::HashMap;

use super::Armature;
use crate::config::Config;
use crate::data::{ArmatureData, BoneKind, ColorTransform};
use crate::error::{AnimationError, Result};
use crate::events::{EventObject, EventQueue};

/// Local animation pose of a bone, in armature units and radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub skew: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
        skew: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
    };
}

#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    pub is_surface: bool,
    pub animation_pose: Transform,
    /// Control-point offsets; empty unless this bone is a surface.
    pub deform_vertices: Vec<f64>,
    pub alpha: f64,
    pub transform_dirty: bool,
    /// Per-bucket pose cache handed to pose composition while a cached clip plays alone.
    pub cached_frame_indices: Option<Arc<[i32]>>,
}

/// One display of a slot plus its deform buffer.
#[derive(Clone, Debug, Default)]
pub struct DisplayFrame {
    pub geometry: Option<u32>,
    pub deform_vertices: Vec<f64>,
}

#[derive(Debug)]
pub struct Slot {
    pub name: String,
    /// Owning bone.
    pub parent: usize,
    pub display_index: i32,
    pub display_dirty: bool,
    pub displays: Vec<DisplayFrame>,
    pub color_transform: ColorTransform,
    pub color_dirty: bool,
    pub alpha: f64,
    pub z_index: i32,
    pub z_order: i32,
    pub vertices_dirty: bool,
    /// When set, only states whose name or group matches drive display and color.
    pub display_controller: Option<String>,
    pub child_armature: Option<Box<Armature>>,
    pub cached_frame_indices: Option<Arc<[i32]>>,
}

impl Slot {
    /// Geometry of the current display, if it is a mesh.
    pub fn current_geometry(&self) -> Option<u32> {
        usize::try_from(self.display_index)
            .ok()
            .and_then(|i| self.displays.get(i))
            .and_then(|d| d.geometry)
    }

    pub fn set_display_index(&mut self, index: i32) {
        if self.display_index != index {
            self.display_index = index;
            self.display_dirty = true;
        }
    }
}

#[derive(Clone, Debug)]
pub struct IkConstraint {
    pub name: String,
    pub bend_positive: bool,
    pub weight: f64,
    pub dirty: bool,
}

/// Mutable runtime state of one armature.
#[derive(Debug)]
pub struct Rig {
    pub bones: Vec<Bone>,
    pub slots: Vec<Slot>,
    pub constraints: Vec<IkConstraint>,
    /// Slot indices in draw order.
    pub draw_order: Vec<usize>,
    /// Bucket evaluated by the last contributing state, -1 when invalid.
    pub cache_frame_index: i32,
    pub slots_dirty: bool,
    pub z_order_dirty: bool,
    pub z_index_dirty: bool,
    pub alpha_dirty: bool,
    pub events: EventQueue,
    pub(crate) actions: Vec<EventObject>,
    bone_lookup: HashMap<String, usize>,
    slot_lookup: HashMap<String, usize>,
}

impl Rig {
    pub fn from_data(data: &ArmatureData, config: &Config) -> Result<Self> {
        let mut bone_lookup = HashMap::with_capacity(data.bones.len());
        let mut bones = Vec::with_capacity(data.bones.len());
        for (index, bone) in data.bones.iter().enumerate() {
            if bone_lookup.insert(bone.name.clone(), index).is_some() {
                return Err(AnimationError::InvalidArmature {
                    reason: format!("duplicate bone '{}'", bone.name),
                });
            }
            let parent = match &bone.parent {
                Some(parent) => Some(*bone_lookup.get(parent).ok_or_else(|| {
                    AnimationError::InvalidArmature {
                        reason: format!(
                            "bone '{}' references parent '{parent}' that is not declared before it",
                            bone.name
                        ),
                    }
                })?),
                None => None,
            };
            bones.push(Bone {
                name: bone.name.clone(),
                parent,
                is_surface: matches!(bone.kind, BoneKind::Surface { .. }),
                animation_pose: Transform::IDENTITY,
                deform_vertices: vec![0.0; bone.deform_count()],
                alpha: 1.0,
                transform_dirty: true,
                cached_frame_indices: None,
            });
        }

        let mut slot_lookup = HashMap::with_capacity(data.slots.len());
        let mut slots = Vec::with_capacity(data.slots.len());
        for (index, slot) in data.slots.iter().enumerate() {
            if slot_lookup.insert(slot.name.clone(), index).is_some() {
                return Err(AnimationError::InvalidArmature {
                    reason: format!("duplicate slot '{}'", slot.name),
                });
            }
            let parent = *bone_lookup.get(&slot.parent).ok_or_else(|| {
                AnimationError::InvalidArmature {
                    reason: format!("slot '{}' references unknown bone '{}'", slot.name, slot.parent),
                }
            })?;
            slots.push(Slot {
                name: slot.name.clone(),
                parent,
                display_index: slot.display_index,
                display_dirty: true,
                displays: slot
                    .displays
                    .iter()
                    .map(|d| DisplayFrame {
                        geometry: d.geometry.map(|g| g.offset),
                        deform_vertices: vec![0.0; d.geometry.map(|g| g.vertex_count).unwrap_or(0)],
                    })
                    .collect(),
                color_transform: slot.color,
                color_dirty: true,
                alpha: 1.0,
                z_index: slot.z_index,
                z_order: index as i32,
                vertices_dirty: true,
                display_controller: None,
                child_armature: None,
                cached_frame_indices: None,
            });
        }

        let constraints = data
            .constraints
            .iter()
            .map(|c| IkConstraint {
                name: c.name.clone(),
                bend_positive: c.bend_positive,
                weight: c.weight,
                dirty: true,
            })
            .collect();

        Ok(Self {
            bones,
            draw_order: (0..slots.len()).collect(),
            slots,
            constraints,
            cache_frame_index: -1,
            slots_dirty: true,
            z_order_dirty: false,
            z_index_dirty: false,
            alpha_dirty: true,
            events: EventQueue::with_limit(config.max_events_per_tick),
            actions: Vec::new(),
            bone_lookup,
            slot_lookup,
        })
    }

    #[inline]
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bone_lookup.get(name).copied()
    }

    #[inline]
    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.slot_lookup.get(name).copied()
    }

    pub fn constraint_index(&self, name: &str) -> Option<usize> {
        self.constraints.iter().position(|c| c.name == name)
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bone_index(name).map(|i| &self.bones[i])
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slot_index(name).map(|i| &self.slots[i])
    }

    pub fn slot_mut(&mut self, name: &str) -> Option<&mut Slot> {
        self.slot_index(name).map(move |i| &mut self.slots[i])
    }

    pub fn constraint(&self, name: &str) -> Option<&IkConstraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// Whether `ancestor` is a proper ancestor of `bone`.
    pub fn is_ancestor(&self, ancestor: usize, bone: usize) -> bool {
        let mut cursor = self.bones.get(bone).and_then(|b| b.parent);
        while let Some(index) = cursor {
            if index == ancestor {
                return true;
            }
            cursor = self.bones[index].parent;
        }
        false
    }

    pub(crate) fn reset_bone_pose(&mut self, bone: usize) {
        if let Some(bone) = self.bones.get_mut(bone) {
            bone.animation_pose = Transform::IDENTITY;
        }
    }

    /// Applies an explicit draw order (data-order slot index per position) or
    /// restores the data order.
    pub fn sort_z_order(&mut self, indices: Option<&[i16]>) {
        if !self.z_order_dirty && indices.is_none() {
            return;
        }
        let count = self.slots.len();
        for i in 0..count {
            let slot_index = match indices {
                Some(order) => match order.get(i) {
                    Some(v) if *v >= 0 => *v as usize,
                    _ => continue,
                },
                None => i,
            };
            if let Some(slot) = self.slots.get_mut(slot_index) {
                slot.z_order = i as i32;
            }
        }
        self.slots_dirty = true;
        self.z_order_dirty = indices.is_some();
    }

    /// Re-sorts `draw_order` by `z_index * 1000 + z_order`.
    pub(crate) fn sort_slots(&mut self) {
        if !self.slots_dirty && !self.z_index_dirty {
            return;
        }
        let slots = &self.slots;
        self.draw_order
            .sort_by_key(|i| slots[*i].z_index * 1000 + slots[*i].z_order);
        if self.z_index_dirty {
            for (position, index) in self.draw_order.iter().enumerate() {
                self.slots[*index].z_order = position as i32;
            }
        }
        self.slots_dirty = false;
        self.z_index_dirty = false;
    }
}
