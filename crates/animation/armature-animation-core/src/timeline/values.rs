//! Per-kind keyframe handling: what a timeline does when it lands on a key,
//! what it does every frame in between, and how it writes into its target.

use crate::blend_state::{BlendState, BlendTarget};
use crate::data::{ColorTransform, TimelineKind};
use crate::tween::normalize_radian;

use super::{NestedWrite, PlayState, PlayheadView, TimelineContext, TimelineState, TimelineTarget};

impl TimelineState {
    pub(super) fn arrive(&mut self, view: &PlayheadView, cx: &mut TimelineContext<'_>) {
        match self.kind {
            TimelineKind::Action => {}
            TimelineKind::ZOrder => self.arrive_z_order(cx),
            TimelineKind::SlotDisplay => self.arrive_display(cx),
            TimelineKind::SlotColor => {
                self.tween_arrive(view, cx.clip);
                self.arrive_color(cx);
            }
            kind => {
                self.tween_arrive(view, cx.clip);
                self.values_arrive(cx.clip);
                self.arrive_pose_defaults(kind, cx);
                if self.is_tween && self.is_last_frame() {
                    match kind {
                        TimelineKind::BoneAll => {
                            // Difference slots, as for BoneRotate.
                            self.rd[14] = normalize_radian(self.rd[14]);
                            self.rd[15] = normalize_radian(self.rd[15]);
                        }
                        TimelineKind::BoneRotate => {
                            self.rd[4] = normalize_radian(self.rd[4]);
                            self.rd[5] = normalize_radian(self.rd[5]);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Pose-fallback timelines rest at the setup pose instead of zero.
    fn arrive_pose_defaults(&mut self, kind: TimelineKind, cx: &TimelineContext<'_>) {
        if self.data.is_some() {
            return;
        }
        match kind {
            TimelineKind::BoneAll => {
                self.rd[4] = 1.0;
                self.rd[5] = 1.0;
            }
            TimelineKind::BoneScale => {
                self.rd[0] = 1.0;
                self.rd[1] = 1.0;
            }
            TimelineKind::BoneAlpha | TimelineKind::SlotAlpha => self.rd[0] = 1.0,
            TimelineKind::SlotZIndex => {
                self.rd[0] = cx
                    .armature
                    .slots
                    .get(self.rig_index)
                    .map(|s| s.z_index as f64)
                    .unwrap_or(0.0);
            }
            _ => {}
        }
    }

    pub(super) fn update_frame(&mut self, cx: &mut TimelineContext<'_>) {
        match self.kind {
            TimelineKind::Action | TimelineKind::ZOrder | TimelineKind::SlotDisplay => {}
            TimelineKind::SlotColor => {
                self.tween_update(cx.clip);
                self.update_color();
            }
            kind => {
                self.tween_update(cx.clip);
                self.values_update();
                match kind {
                    TimelineKind::IkConstraint => self.apply_ik(cx),
                    TimelineKind::AnimationProgress
                    | TimelineKind::AnimationWeight
                    | TimelineKind::AnimationParameter => self.push_nested(cx),
                    _ => {}
                }
            }
        }
    }

    fn arrive_z_order(&mut self, cx: &mut TimelineContext<'_>) {
        if self.play_state == PlayState::NotStarted {
            return;
        }
        let fo = self.frame_offset;
        let count = cx.clip.frame(fo + 1).max(0) as usize;
        if count > 0 {
            let start = fo + 2;
            let order = cx.clip.arrays.frame.get(start..start + count);
            cx.rig.sort_z_order(order);
        } else {
            cx.rig.sort_z_order(None);
        }
    }

    fn arrive_display(&mut self, cx: &mut TimelineContext<'_>) {
        if self.play_state == PlayState::NotStarted {
            return;
        }
        let TimelineTarget::Slot(slot) = self.target else {
            return;
        };
        let index = match self.data {
            Some(_) => cx.clip.frame(self.frame_offset + 1) as i32,
            None => cx
                .armature
                .slots
                .get(slot)
                .map(|s| s.display_index)
                .unwrap_or(-1),
        };
        if let Some(slot) = cx.rig.slots.get_mut(slot) {
            slot.set_display_index(index);
        }
    }

    fn color_offset(&self, cx: &TimelineContext<'_>, frame_index: usize) -> usize {
        let at = self.value_offset + self.frame_value_offset + frame_index;
        cx.clip.arrays.frame_int.get(at).copied().unwrap_or(0).max(0) as usize
    }

    fn arrive_color(&mut self, cx: &TimelineContext<'_>) {
        if self.data.is_none() {
            let color = match self.target {
                TimelineTarget::Slot(slot) => cx
                    .armature
                    .slots
                    .get(slot)
                    .map(|s| s.color)
                    .unwrap_or_default(),
                _ => ColorTransform::default(),
            };
            self.rd[..8].copy_from_slice(&color_words(&color));
            return;
        }

        let colors = &cx.clip.arrays.color;
        let channel = |at: usize| colors.get(at).copied().unwrap_or(0) as f64;
        let current = self.color_offset(cx, self.frame_index.max(0) as usize);
        if self.is_tween {
            let next_index = if self.is_last_frame() {
                0
            } else {
                self.frame_index as usize + 1
            };
            let next = self.color_offset(cx, next_index);
            for i in 0..8 {
                let from = channel(current + i);
                self.rd[8 + i] = from;
                self.rd[16 + i] = channel(next + i) - from;
            }
        } else {
            for i in 0..8 {
                self.rd[i] = channel(current + i) * channel_scale(i);
            }
        }
    }

    fn update_color(&mut self) {
        if !self.is_tween {
            return;
        }
        for i in 0..8 {
            self.rd[i] = (self.rd[8 + i] + self.rd[16 + i] * self.tween_progress) * channel_scale(i);
        }
    }

    /// Writes the color result into the slot. While the owning state fades,
    /// the slot color eases toward the result by `fade_progress^4`.
    pub(super) fn settle_color(&mut self, view: &PlayheadView, cx: &mut TimelineContext<'_>) {
        if !self.is_tween && !self.dirty {
            return;
        }
        let TimelineTarget::Slot(slot) = self.target else {
            return;
        };
        let Some(slot) = cx.rig.slots.get_mut(slot) else {
            return;
        };
        let current = color_words(&slot.color_transform);
        let changed = current
            .iter()
            .zip(&self.rd[..8])
            .any(|(a, b)| a != b);

        if view.fading {
            if changed {
                let fade = view.fade_progress.powi(4);
                let color = &mut slot.color_transform;
                color.alpha_multiplier += (self.rd[0] - color.alpha_multiplier) * fade;
                color.red_multiplier += (self.rd[1] - color.red_multiplier) * fade;
                color.green_multiplier += (self.rd[2] - color.green_multiplier) * fade;
                color.blue_multiplier += (self.rd[3] - color.blue_multiplier) * fade;
                color.alpha_offset += ((self.rd[4] - color.alpha_offset as f64) * fade) as i32;
                color.red_offset += ((self.rd[5] - color.red_offset as f64) * fade) as i32;
                color.green_offset += ((self.rd[6] - color.green_offset as f64) * fade) as i32;
                color.blue_offset += ((self.rd[7] - color.blue_offset as f64) * fade) as i32;
                slot.color_dirty = true;
            }
        } else if self.dirty {
            self.dirty = false;
            if changed {
                let color = &mut slot.color_transform;
                color.alpha_multiplier = self.rd[0];
                color.red_multiplier = self.rd[1];
                color.green_multiplier = self.rd[2];
                color.blue_multiplier = self.rd[3];
                color.alpha_offset = self.rd[4] as i32;
                color.red_offset = self.rd[5] as i32;
                color.green_offset = self.rd[6] as i32;
                color.blue_offset = self.rd[7] as i32;
                slot.color_dirty = true;
            }
        }
    }

    fn apply_ik(&mut self, cx: &mut TimelineContext<'_>) {
        let TimelineTarget::Constraint(index) = self.target else {
            return;
        };
        let (bend_positive, weight) = match self.data {
            Some(_) => (self.rd[0] > 0.0, self.rd[1]),
            None => match cx.armature.constraints.get(index) {
                Some(c) => (c.bend_positive, c.weight),
                None => return,
            },
        };
        if let Some(constraint) = cx.rig.constraints.get_mut(index) {
            constraint.bend_positive = bend_positive;
            constraint.weight = weight;
            constraint.dirty = true;
        }
        self.dirty = false;
    }

    fn push_nested(&mut self, cx: &mut TimelineContext<'_>) {
        let TimelineTarget::State(child) = self.target else {
            return;
        };
        let write = match self.kind {
            TimelineKind::AnimationProgress => NestedWrite::Progress {
                child,
                progress: self.rd[0],
            },
            TimelineKind::AnimationWeight => NestedWrite::Weight {
                child,
                weight: self.rd[0],
            },
            _ => NestedWrite::Parameter {
                child,
                x: self.rd[0],
                y: self.rd[1],
            },
        };
        cx.nested.push(write);
        self.dirty = false;
    }
}

#[inline]
fn channel_scale(i: usize) -> f64 {
    if i < 4 {
        0.01
    } else {
        1.0
    }
}

fn color_words(color: &ColorTransform) -> [f64; 8] {
    [
        color.alpha_multiplier,
        color.red_multiplier,
        color.green_multiplier,
        color.blue_multiplier,
        color.alpha_offset as f64,
        color.red_offset as f64,
        color.green_offset as f64,
        color.blue_offset as f64,
    ]
}

/// Writes a blended timeline into its accumulator's target. The first
/// contributor of a tick overwrites (`blend.dirty == 1`); later ones add.
pub(super) fn blend(
    timeline: &mut TimelineState,
    is_dirty: bool,
    blend: &BlendState,
    cx: &mut TimelineContext<'_>,
) {
    let weight = blend.blend_weight;
    let additive = blend.dirty > 1;
    let rd = &timeline.rd;
    let touched = is_dirty || timeline.dirty;

    match (timeline.kind, blend.target) {
        (TimelineKind::BoneAll, BlendTarget::Bone(index)) => {
            let scale = cx.armature.scale;
            let Some(bone) = cx.rig.bones.get_mut(index) else {
                return;
            };
            let pose = &mut bone.animation_pose;
            if additive {
                pose.x += rd[0] * weight * scale;
                pose.y += rd[1] * weight * scale;
                pose.rotation += rd[2] * weight;
                pose.skew += rd[3] * weight;
                pose.scale_x += (rd[4] - 1.0) * weight;
                pose.scale_y += (rd[5] - 1.0) * weight;
            } else {
                pose.x = rd[0] * weight * scale;
                pose.y = rd[1] * weight * scale;
                pose.rotation = rd[2] * weight;
                pose.skew = rd[3] * weight;
                pose.scale_x = (rd[4] - 1.0) * weight + 1.0;
                pose.scale_y = (rd[5] - 1.0) * weight + 1.0;
            }
            if touched {
                timeline.dirty = false;
                bone.transform_dirty = true;
            }
        }
        (TimelineKind::BoneTranslate, BlendTarget::Bone(index)) => {
            let Some(bone) = cx.rig.bones.get_mut(index) else {
                return;
            };
            let pose = &mut bone.animation_pose;
            if additive {
                pose.x += rd[0] * weight;
                pose.y += rd[1] * weight;
            } else if weight != 1.0 {
                pose.x = rd[0] * weight;
                pose.y = rd[1] * weight;
            } else {
                pose.x = rd[0];
                pose.y = rd[1];
            }
            if touched {
                timeline.dirty = false;
                bone.transform_dirty = true;
            }
        }
        (TimelineKind::BoneRotate, BlendTarget::Bone(index)) => {
            let Some(bone) = cx.rig.bones.get_mut(index) else {
                return;
            };
            let pose = &mut bone.animation_pose;
            if additive {
                pose.rotation += rd[0] * weight;
                pose.skew += rd[1] * weight;
            } else if weight != 1.0 {
                pose.rotation = rd[0] * weight;
                pose.skew = rd[1] * weight;
            } else {
                pose.rotation = rd[0];
                pose.skew = rd[1];
            }
            if touched {
                timeline.dirty = false;
                bone.transform_dirty = true;
            }
        }
        (TimelineKind::BoneScale, BlendTarget::Bone(index)) => {
            let Some(bone) = cx.rig.bones.get_mut(index) else {
                return;
            };
            let pose = &mut bone.animation_pose;
            if additive {
                pose.scale_x += (rd[0] - 1.0) * weight;
                pose.scale_y += (rd[1] - 1.0) * weight;
            } else if weight != 1.0 {
                pose.scale_x = (rd[0] - 1.0) * weight + 1.0;
                pose.scale_y = (rd[1] - 1.0) * weight + 1.0;
            } else {
                pose.scale_x = rd[0];
                pose.scale_y = rd[1];
            }
            if touched {
                timeline.dirty = false;
                bone.transform_dirty = true;
            }
        }
        (TimelineKind::BoneAlpha, BlendTarget::Bone(index)) => {
            let Some(bone) = cx.rig.bones.get_mut(index) else {
                return;
            };
            bone.alpha = blend_alpha(bone.alpha, rd[0], weight, additive);
            if touched {
                timeline.dirty = false;
                cx.rig.alpha_dirty = true;
            }
        }
        (TimelineKind::SlotAlpha, BlendTarget::Slot(index)) => {
            let Some(slot) = cx.rig.slots.get_mut(index) else {
                return;
            };
            slot.alpha = blend_alpha(slot.alpha, rd[0], weight, additive);
            if touched {
                timeline.dirty = false;
                cx.rig.alpha_dirty = true;
            }
        }
        (TimelineKind::SlotZIndex, BlendTarget::Slot(index)) => {
            let Some(slot) = cx.rig.slots.get_mut(index) else {
                return;
            };
            let value = (rd[0] * weight) as i32;
            if additive {
                slot.z_index += value;
            } else {
                slot.z_index = value;
            }
            if touched {
                timeline.dirty = false;
                cx.rig.z_index_dirty = true;
            }
        }
        (TimelineKind::Surface, BlendTarget::Surface(index)) => {
            let Some(bone) = cx.rig.bones.get_mut(index) else {
                return;
            };
            blend_deform(timeline, &mut bone.deform_vertices, weight, blend.dirty, cx.clip);
            if touched {
                timeline.dirty = false;
                bone.transform_dirty = true;
            }
        }
        (TimelineKind::SlotDeform, BlendTarget::Display { slot: index, display }) => {
            let Some(slot) = cx.rig.slots.get_mut(index) else {
                return;
            };
            let geometry = slot.displays.get(display).and_then(|d| d.geometry);
            if let Some(frame) = slot.displays.get_mut(display) {
                blend_deform(timeline, &mut frame.deform_vertices, weight, blend.dirty, cx.clip);
            }
            if touched {
                timeline.dirty = false;
                if slot.current_geometry() == geometry {
                    slot.vertices_dirty = true;
                }
            }
        }
        (kind, target) => {
            log::debug!("timeline {kind:?} cannot blend into {target:?}");
        }
    }
}

#[inline]
fn blend_alpha(current: f64, value: f64, weight: f64, additive: bool) -> f64 {
    if additive {
        (current + value * weight).min(1.0)
    } else {
        value * weight
    }
}

/// Rebuilds a deform buffer from the windowed per-key values plus the shared
/// values outside the window.
fn blend_deform(
    timeline: &TimelineState,
    vertices: &mut [f64],
    weight: f64,
    blend_dirty: u32,
    clip: &crate::data::AnimationData,
) {
    let layout = timeline.deform;
    let count = layout.deform_count.min(vertices.len());
    if timeline.data.is_none() {
        if blend_dirty == 1 {
            vertices[..count].iter_mut().for_each(|v| *v = 0.0);
        }
        return;
    }
    let window = timeline.value_count;
    let shared = |i: usize| {
        clip.arrays
            .frame_float
            .get(layout.same_value_offset + i)
            .copied()
            .unwrap_or(0.0) as f64
            * timeline.value_scale
    };
    for (i, vertex) in vertices.iter_mut().enumerate().take(count) {
        let value = if i < layout.deform_offset {
            shared(i)
        } else if i < layout.deform_offset + window {
            timeline.rd[i - layout.deform_offset]
        } else {
            shared(i - window)
        };
        if blend_dirty > 1 {
            *vertex += value * weight;
        } else {
            *vertex = value * weight;
        }
    }
}
