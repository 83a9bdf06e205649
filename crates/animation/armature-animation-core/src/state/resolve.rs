//! Resolves a state's clip against the armature: one evaluator per authored
//! timeline on a masked-in target, plus pose-fallback evaluators for
//! masked-in targets the clip does not animate.

use crate::blend_state::{BlendChannel, BlendTarget};
use crate::data::{offsets, AnimationData, TimelineData, TimelineKind};
use crate::timeline::{TimelineState, TimelineTarget};

use super::{release_where, AnimationState, TickContext};

impl AnimationState {
    #[allow(clippy::too_many_arguments)]
    fn make_timeline(
        &self,
        kind: TimelineKind,
        target: TimelineTarget,
        rig_index: usize,
        data: Option<TimelineData>,
        clip: &AnimationData,
        pose_deform_count: usize,
        cx: &mut TickContext<'_>,
    ) -> TimelineState {
        let mut timeline = cx.pool.acquire();
        timeline.init(
            kind,
            target,
            data,
            clip,
            self.position,
            self.duration,
            cx.armature.scale,
            pose_deform_count,
        );
        timeline.rig_index = rig_index;
        timeline
    }

    /// Full resolve on the first tick: constraint timelines. Bone and slot
    /// timelines follow through [`Self::update_bone_and_slot_timelines`].
    pub(super) fn update_timelines(&mut self, clip: &AnimationData, cx: &mut TickContext<'_>) {
        for list in [
            &mut self.bone_timelines,
            &mut self.bone_blend_timelines,
            &mut self.slot_timelines,
            &mut self.slot_blend_timelines,
            &mut self.constraint_timelines,
        ] {
            if list.capacity() == 0 {
                list.reserve(cx.reserve);
            }
        }

        for index in 0..cx.rig.constraints.len() {
            let name = cx.rig.constraints[index].name.clone();
            match clip.constraint_timelines(&name) {
                Some(timelines) => {
                    for data in timelines {
                        if data.kind != TimelineKind::IkConstraint {
                            continue;
                        }
                        let timeline = self.make_timeline(
                            TimelineKind::IkConstraint,
                            TimelineTarget::Constraint(index),
                            index,
                            Some(*data),
                            clip,
                            0,
                            cx,
                        );
                        self.constraint_timelines.push(timeline);
                    }
                }
                None if self.reset_to_pose => {
                    let timeline = self.make_timeline(
                        TimelineKind::IkConstraint,
                        TimelineTarget::Constraint(index),
                        index,
                        None,
                        clip,
                        0,
                        cx,
                    );
                    self.constraint_timelines.push(timeline);
                }
                None => {}
            }
        }
        log::debug!(
            "state '{}' resolved {} constraint timelines",
            self.name,
            self.constraint_timelines.len()
        );
    }

    /// Re-resolves bone and slot timelines against the current bone mask.
    /// Targets that already have evaluators keep them; targets that left the
    /// mask lose theirs.
    pub(super) fn update_bone_and_slot_timelines(
        &mut self,
        clip: &AnimationData,
        cx: &mut TickContext<'_>,
    ) {
        self.resolve_bones(clip, cx);
        self.resolve_slots(clip, cx);
        log::debug!(
            "state '{}' resolved {} timelines (mask: {} bones)",
            self.name,
            self.timeline_count(),
            self.bone_mask.len()
        );
    }

    fn resolve_bones(&mut self, clip: &AnimationData, cx: &mut TickContext<'_>) {
        let bone_count = cx.rig.bones.len();
        let mut existing = vec![false; bone_count];
        for timeline in self.bone_timelines.iter().chain(&self.bone_blend_timelines) {
            if let Some(flag) = existing.get_mut(timeline.rig_index) {
                *flag = true;
            }
        }
        let mut keep = vec![false; bone_count];

        for index in 0..bone_count {
            if !self.contains_bone_mask(&cx.rig.bones[index].name) {
                continue;
            }
            keep[index] = true;
            if existing[index] {
                continue;
            }

            let name = cx.rig.bones[index].name.clone();
            let is_surface = cx.rig.bones[index].is_surface;
            let transform = cx
                .blends
                .get_or_insert(BlendChannel::BoneTransform, BlendTarget::Bone(index));

            match clip.bone_timelines(&name) {
                Some(timelines) => {
                    for data in timelines {
                        match data.kind {
                            TimelineKind::BoneAll
                            | TimelineKind::BoneTranslate
                            | TimelineKind::BoneRotate
                            | TimelineKind::BoneScale => {
                                let timeline = self.make_timeline(
                                    data.kind,
                                    TimelineTarget::Blend(transform),
                                    index,
                                    Some(*data),
                                    clip,
                                    0,
                                    cx,
                                );
                                self.bone_timelines.push(timeline);
                            }
                            TimelineKind::BoneAlpha => {
                                let blend = cx
                                    .blends
                                    .get_or_insert(BlendChannel::BoneAlpha, BlendTarget::Bone(index));
                                let timeline = self.make_timeline(
                                    data.kind,
                                    TimelineTarget::Blend(blend),
                                    index,
                                    Some(*data),
                                    clip,
                                    0,
                                    cx,
                                );
                                self.bone_blend_timelines.push(timeline);
                            }
                            TimelineKind::Surface => {
                                let blend = cx
                                    .blends
                                    .get_or_insert(BlendChannel::Surface, BlendTarget::Surface(index));
                                let timeline = self.make_timeline(
                                    data.kind,
                                    TimelineTarget::Blend(blend),
                                    index,
                                    Some(*data),
                                    clip,
                                    0,
                                    cx,
                                );
                                self.bone_blend_timelines.push(timeline);
                            }
                            kind => log::debug!("bone '{name}' ignores {kind:?} timeline"),
                        }
                    }
                }
                None if self.reset_to_pose => {
                    if is_surface {
                        let blend = cx
                            .blends
                            .get_or_insert(BlendChannel::Surface, BlendTarget::Surface(index));
                        let count = cx.rig.bones[index].deform_vertices.len();
                        let timeline = self.make_timeline(
                            TimelineKind::Surface,
                            TimelineTarget::Blend(blend),
                            index,
                            None,
                            clip,
                            count,
                            cx,
                        );
                        self.bone_blend_timelines.push(timeline);
                    } else {
                        let timeline = self.make_timeline(
                            TimelineKind::BoneAll,
                            TimelineTarget::Blend(transform),
                            index,
                            None,
                            clip,
                            0,
                            cx,
                        );
                        self.bone_timelines.push(timeline);
                    }
                }
                None => {}
            }
        }

        let stale = |t: &TimelineState| !keep.get(t.rig_index).copied().unwrap_or(false);
        release_where(&mut self.bone_timelines, cx.pool, stale);
        release_where(&mut self.bone_blend_timelines, cx.pool, stale);
    }

    fn resolve_slots(&mut self, clip: &AnimationData, cx: &mut TickContext<'_>) {
        let slot_count = cx.rig.slots.len();
        let mut existing = vec![false; slot_count];
        for timeline in self.slot_timelines.iter().chain(&self.slot_blend_timelines) {
            if let Some(flag) = existing.get_mut(timeline.rig_index) {
                *flag = true;
            }
        }
        let mut keep = vec![false; slot_count];
        let mut deformed: Vec<u32> = Vec::new();

        for index in 0..slot_count {
            let parent = cx.rig.slots[index].parent;
            if !self.contains_bone_mask(&cx.rig.bones[parent].name) {
                continue;
            }
            keep[index] = true;
            if existing[index] {
                continue;
            }

            let name = cx.rig.slots[index].name.clone();
            let mut has_display = false;
            let mut has_color = false;
            deformed.clear();

            if let Some(timelines) = clip.slot_timelines(&name) {
                for data in timelines {
                    match data.kind {
                        TimelineKind::SlotDisplay => {
                            let timeline = self.make_timeline(
                                data.kind,
                                TimelineTarget::Slot(index),
                                index,
                                Some(*data),
                                clip,
                                0,
                                cx,
                            );
                            self.slot_timelines.push(timeline);
                            has_display = true;
                        }
                        TimelineKind::SlotColor => {
                            let timeline = self.make_timeline(
                                data.kind,
                                TimelineTarget::Slot(index),
                                index,
                                Some(*data),
                                clip,
                                0,
                                cx,
                            );
                            self.slot_timelines.push(timeline);
                            has_color = true;
                        }
                        TimelineKind::SlotZIndex | TimelineKind::SlotAlpha => {
                            let channel = if data.kind == TimelineKind::SlotZIndex {
                                BlendChannel::SlotZIndex
                            } else {
                                BlendChannel::SlotAlpha
                            };
                            let blend = cx.blends.get_or_insert(channel, BlendTarget::Slot(index));
                            let timeline = self.make_timeline(
                                data.kind,
                                TimelineTarget::Blend(blend),
                                index,
                                Some(*data),
                                clip,
                                0,
                                cx,
                            );
                            self.slot_blend_timelines.push(timeline);
                        }
                        TimelineKind::SlotDeform => {
                            let header = clip.frame_int_offset
                                + clip.header(data, offsets::TIMELINE_FRAME_VALUE_COUNT).max(0) as usize;
                            let geometry = clip
                                .arrays
                                .frame_int
                                .get(header + offsets::DEFORM_GEOMETRY_OFFSET)
                                .copied()
                                .and_then(|g| u32::try_from(g).ok());
                            let display = cx.rig.slots[index]
                                .displays
                                .iter()
                                .position(|d| d.geometry.is_some() && d.geometry == geometry);
                            let (Some(geometry), Some(display)) = (geometry, display) else {
                                log::warn!(
                                    "clip '{}' deforms geometry {geometry:?} that no display of slot '{name}' uses",
                                    clip.name
                                );
                                continue;
                            };
                            let blend = cx.blends.get_or_insert(
                                BlendChannel::SlotDeform,
                                BlendTarget::Display { slot: index, display },
                            );
                            let timeline = self.make_timeline(
                                data.kind,
                                TimelineTarget::Blend(blend),
                                index,
                                Some(*data),
                                clip,
                                0,
                                cx,
                            );
                            self.slot_blend_timelines.push(timeline);
                            deformed.push(geometry);
                        }
                        kind => log::debug!("slot '{name}' ignores {kind:?} timeline"),
                    }
                }
            }

            if self.reset_to_pose {
                if !has_display {
                    let timeline = self.make_timeline(
                        TimelineKind::SlotDisplay,
                        TimelineTarget::Slot(index),
                        index,
                        None,
                        clip,
                        0,
                        cx,
                    );
                    self.slot_timelines.push(timeline);
                }
                if !has_color {
                    let timeline = self.make_timeline(
                        TimelineKind::SlotColor,
                        TimelineTarget::Slot(index),
                        index,
                        None,
                        clip,
                        0,
                        cx,
                    );
                    self.slot_timelines.push(timeline);
                }
                for display in 0..cx.rig.slots[index].displays.len() {
                    let frame = &cx.rig.slots[index].displays[display];
                    let Some(geometry) = frame.geometry else {
                        continue;
                    };
                    if frame.deform_vertices.is_empty() || deformed.contains(&geometry) {
                        continue;
                    }
                    let count = frame.deform_vertices.len();
                    let blend = cx.blends.get_or_insert(
                        BlendChannel::SlotDeform,
                        BlendTarget::Display { slot: index, display },
                    );
                    let timeline = self.make_timeline(
                        TimelineKind::SlotDeform,
                        TimelineTarget::Blend(blend),
                        index,
                        None,
                        clip,
                        count,
                        cx,
                    );
                    self.slot_blend_timelines.push(timeline);
                }
            }
        }

        let stale = |t: &TimelineState| !keep.get(t.rig_index).copied().unwrap_or(false);
        release_where(&mut self.slot_timelines, cx.pool, stale);
        release_where(&mut self.slot_blend_timelines, cx.pool, stale);
    }
}
