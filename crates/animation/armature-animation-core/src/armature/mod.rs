//! An armature instance: static model, runtime rig and animation controller.

pub mod rig;

use std::any::Any;
use std::sync::Arc;

use crate::animation::{Animation, AnimationControl};
use crate::animation_config::FadeOutMode;
use crate::config::Config;
use crate::data::{ActionKind, ArmatureData, TimelineKind};
use crate::error::{AnimationError, Result};
use crate::events::EventQueue;
use crate::world_clock::Animatable;

use rig::{Bone, IkConstraint, Rig, Slot};

#[derive(Debug)]
pub struct Armature {
    data: Arc<ArmatureData>,
    rig: Rig,
    animation: Animation,
    /// When nested in a slot: follow the parent's clip requests and time scale.
    pub inherit_animation: bool,
}

impl Armature {
    pub fn new(data: impl Into<Arc<ArmatureData>>) -> Result<Self> {
        Self::with_config(data, Config::default())
    }

    pub fn with_config(data: impl Into<Arc<ArmatureData>>, config: Config) -> Result<Self> {
        let data = data.into();
        validate_clips(&data)?;
        let rig = Rig::from_data(&data, &config)?;
        let animation = Animation::new(&data, &config);
        log::debug!(
            "armature '{}': {} bones, {} slots, {} clips",
            data.name,
            rig.bones.len(),
            rig.slots.len(),
            data.animations.len()
        );
        Ok(Self {
            data,
            rig,
            animation,
            inherit_animation: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn data(&self) -> &Arc<ArmatureData> {
        &self.data
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }

    pub fn animation_mut(&mut self) -> AnimationControl<'_> {
        AnimationControl {
            animation: &mut self.animation,
            rig: &mut self.rig,
            data: &self.data,
        }
    }

    pub fn rig(&self) -> &Rig {
        &self.rig
    }

    pub fn rig_mut(&mut self) -> &mut Rig {
        &mut self.rig
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.rig.bone(name)
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.rig.slot(name)
    }

    pub fn constraint(&self, name: &str) -> Option<&IkConstraint> {
        self.rig.constraint(name)
    }

    pub fn events(&self) -> &EventQueue {
        &self.rig.events
    }

    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.rig.events
    }

    /// Slot indices in draw order.
    pub fn draw_order(&self) -> &[usize] {
        &self.rig.draw_order
    }

    /// Nests `child` in the slot called `slot`, returning the armature it replaces.
    pub fn set_child_armature(&mut self, slot: &str, child: Armature) -> Result<Option<Armature>> {
        let slot = self
            .rig
            .slot_mut(slot)
            .ok_or_else(|| AnimationError::SlotNotFound {
                name: slot.to_owned(),
            })?;
        Ok(slot.child_armature.replace(Box::new(child)).map(|b| *b))
    }

    pub fn child_armature(&self, slot: &str) -> Option<&Armature> {
        self.rig.slot(slot)?.child_armature.as_deref()
    }

    pub fn child_armature_mut(&mut self, slot: &str) -> Option<&mut Armature> {
        self.rig.slot_mut(slot)?.child_armature.as_deref_mut()
    }

    /// Enables per-clip frame caching at `frame_rate` buckets per second;
    /// zero or less disables it.
    pub fn set_cache_frame_rate(&mut self, frame_rate: f64) {
        self.animation.build_frame_caches(frame_rate, &self.rig);
    }

    /// Steps playback, then nested armatures.
    pub fn advance_time(&mut self, passed_time: f64) {
        self.advance_with(passed_time, None);
    }

    fn advance_with(&mut self, passed_time: f64, parent_time_scale: Option<f64>) {
        self.animation
            .advance_time(passed_time, &self.data, &mut self.rig, parent_time_scale);
        self.rig.sort_slots();
        self.run_actions();

        let time_scale = self.animation.inherit_time_scale();
        for slot in &mut self.rig.slots {
            if let Some(child) = slot.child_armature.as_deref_mut() {
                let inherited = child.inherit_animation.then_some(time_scale);
                child.advance_with(passed_time, inherited);
            }
        }
    }

    /// Carries out play actions crossed during the last tick.
    fn run_actions(&mut self) {
        if self.rig.actions.is_empty() {
            return;
        }
        let mut actions = std::mem::take(&mut self.rig.actions);
        for event in &actions {
            let Some(action) = event.action.as_deref() else {
                continue;
            };
            if action.kind != ActionKind::Play {
                continue;
            }
            if let Some(slot) = &action.slot {
                match self.child_armature_mut(slot) {
                    Some(child) => child.fade_in_action(&action.name),
                    None => log::debug!(
                        "play action '{}' targets slot '{slot}' without a child armature",
                        action.name
                    ),
                }
            } else if let Some(bone) = &action.bone {
                let Some(bone) = self.rig.bone_index(bone) else {
                    continue;
                };
                for slot in &mut self.rig.slots {
                    if slot.parent != bone {
                        continue;
                    }
                    if let Some(child) = slot.child_armature.as_deref_mut() {
                        child.fade_in_action(&action.name);
                    }
                }
            } else {
                self.fade_in_action(&action.name);
            }
        }
        actions.clear();
        self.rig.actions = actions;
    }

    fn fade_in_action(&mut self, name: &str) {
        self.animation_mut()
            .fade_in(name, -1.0, -1, 0, None, FadeOutMode::SameLayerAndGroup);
    }
}

impl Animatable for Armature {
    fn advance_time(&mut self, passed_time: f64) {
        Armature::advance_time(self, passed_time);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Surface timelines may only target surface bones.
fn validate_clips(data: &ArmatureData) -> Result<()> {
    for clip in data.animations.values() {
        for (bone, timelines) in &clip.bone_timelines {
            let Some(index) = data.bone_index(bone) else {
                log::debug!("clip '{}' animates unknown bone '{bone}'", clip.name);
                continue;
            };
            let is_surface = data.bones[index].deform_count() > 0;
            if !is_surface && timelines.iter().any(|t| t.kind == TimelineKind::Surface) {
                return Err(AnimationError::NotASurface {
                    animation: clip.name.clone(),
                    bone: bone.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BoneData, BoneKind, BoneTracks, ClipSpec, DeformTrackSpec, KeySpec, SlotData};

    fn data() -> ArmatureData {
        ArmatureData {
            name: "hero".into(),
            bones: vec![
                BoneData {
                    name: "root".into(),
                    ..BoneData::default()
                },
                BoneData {
                    name: "cape".into(),
                    parent: Some("root".into()),
                    kind: BoneKind::Surface {
                        segment_x: 1,
                        segment_y: 1,
                    },
                },
            ],
            slots: vec![SlotData {
                name: "body".into(),
                parent: "root".into(),
                ..SlotData::default()
            }],
            ..ArmatureData::default()
        }
    }

    #[test]
    fn rejects_surface_timeline_on_plain_bone() {
        let mut data = data();
        let mut clip = ClipSpec {
            name: "flap".into(),
            frame_count: 4,
            ..ClipSpec::default()
        };
        clip.bones.insert(
            "root".into(),
            BoneTracks {
                surface: Some(DeformTrackSpec {
                    geometry: 0,
                    vertex_count: 8,
                    value_offset: 0,
                    value_count: None,
                    scale: 1.0,
                    offset: 0.0,
                    keys: vec![KeySpec::new(4, vec![0.0; 8])],
                }),
                ..BoneTracks::default()
            },
        );
        data.add_clips(&[clip]).unwrap();
        let err = Armature::new(data).unwrap_err();
        assert!(matches!(err, AnimationError::NotASurface { ref bone, .. } if bone == "root"));
    }

    #[test]
    fn child_armature_is_replaced() {
        let mut parent = Armature::new(data()).unwrap();
        let child = Armature::new(data()).unwrap();
        assert!(parent.set_child_armature("body", child).unwrap().is_none());
        assert!(parent.child_armature("body").is_some());
        assert!(parent.set_child_armature("missing", Armature::new(data()).unwrap()).is_err());
    }
}
