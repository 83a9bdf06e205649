//! One playing instance of a clip: playhead, fade state machine and the
//! timelines resolved against the armature.
//!
//! States live in the controller's arena and are addressed by [`StateId`].
//! Anything that has to reach another state (nested children, blend trees,
//! cascading fade-outs) is recorded here and carried out by the controller
//! once this state is back in the arena.

mod resolve;

use std::sync::{Arc, OnceLock};

use crate::animation_config::AnimationConfig;
use crate::armature::rig::Rig;
use crate::blend_state::BlendStateTable;
use crate::data::{AnimationData, ArmatureData, BlendType, TimelineData, TimelineKind};
use crate::events::{EventKind, EventObject};
use crate::ids::StateId;
use crate::pool::{ObjectPool, Poolable};
use crate::timeline::{
    ActionCursor, NestedWrite, PlayheadView, TimelineContext, TimelineState, TimelineTarget,
};

pub use crate::timeline::{PlayState, Playhead};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FadeState {
    #[default]
    FadingIn,
    Complete,
    FadingOut,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SubFadeState {
    #[default]
    Start,
    Progressing,
    Complete,
}

/// How much of the timeline set must be rebuilt on the next tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum TimelineDirty {
    None,
    BonesAndSlots,
    #[default]
    All,
}

/// Borrowed armature pieces a state needs while it ticks.
pub(crate) struct TickContext<'a> {
    pub armature: &'a ArmatureData,
    pub rig: &'a mut Rig,
    pub blends: &'a mut BlendStateTable,
    pub pool: &'a mut ObjectPool<TimelineState>,
    /// Per-bucket "already evaluated" flags of the clip's frame cache.
    pub cached_frames: Option<&'a mut [bool]>,
    pub nested: &'a mut Vec<NestedWrite>,
    /// Parent state's `weight_result`, 1 for top-level states.
    pub parent_weight: f64,
    pub reserve: usize,
}

fn empty_name() -> Arc<str> {
    static EMPTY: OnceLock<Arc<str>> = OnceLock::new();
    Arc::clone(EMPTY.get_or_init(|| Arc::from("")))
}

#[derive(Debug)]
pub struct AnimationState {
    pub action_enabled: bool,
    pub additive: bool,
    /// Whether slot display/color timelines may drive their slots.
    pub display_control: bool,
    /// Masked-in targets without authored keys are driven back to the setup pose.
    pub reset_to_pose: bool,
    pub blend_type: BlendType,
    /// 0 loops forever.
    pub play_times: u32,
    pub layer: i32,
    pub time_scale: f64,
    pub parameter_x: f64,
    pub parameter_y: f64,
    /// Blend-tree coordinates of this state when it is a child.
    pub position_x: f64,
    pub position_y: f64,
    /// < 0 disables auto fade-out on completion.
    pub auto_fade_out_time: f64,
    pub fade_total_time: f64,

    pub(crate) id: Option<StateId>,
    pub(crate) name: Arc<str>,
    pub(crate) group: String,
    weight: f64,
    pub(crate) timeline_dirty: TimelineDirty,
    pub(crate) playhead: Playhead,
    pub(crate) fade_state: FadeState,
    pub(crate) sub_fade_state: SubFadeState,
    position: f64,
    duration: f64,
    fade_time: f64,
    time: f64,
    fade_progress: f64,
    pub(crate) weight_result: f64,
    bone_mask: Vec<String>,

    bone_timelines: Vec<TimelineState>,
    bone_blend_timelines: Vec<TimelineState>,
    slot_timelines: Vec<TimelineState>,
    slot_blend_timelines: Vec<TimelineState>,
    constraint_timelines: Vec<TimelineState>,
    animation_timelines: Vec<TimelineState>,
    action_timeline: TimelineState,
    z_order_timeline: Option<TimelineState>,

    pub(crate) animation: Option<Arc<AnimationData>>,
    pub(crate) parent: Option<StateId>,
    pub(crate) active_child_a: Option<StateId>,
    pub(crate) active_child_b: Option<StateId>,
    /// The blend tree must be re-weighted after this tick.
    pub(crate) pending_blend_tree: bool,
    /// Nested children must follow a fade-out started during this tick.
    pub(crate) cascade_fade_out: bool,
}

impl Default for AnimationState {
    fn default() -> Self {
        Self {
            action_enabled: false,
            additive: false,
            display_control: false,
            reset_to_pose: false,
            blend_type: BlendType::None,
            play_times: 1,
            layer: 0,
            time_scale: 1.0,
            parameter_x: 0.0,
            parameter_y: 0.0,
            position_x: 0.0,
            position_y: 0.0,
            auto_fade_out_time: -1.0,
            fade_total_time: 0.0,
            id: None,
            name: empty_name(),
            group: String::new(),
            weight: 1.0,
            timeline_dirty: TimelineDirty::All,
            playhead: Playhead::default(),
            fade_state: FadeState::FadingIn,
            sub_fade_state: SubFadeState::Start,
            position: 0.0,
            duration: 0.0,
            fade_time: 0.0,
            time: 0.0,
            fade_progress: 0.0,
            weight_result: 0.0,
            bone_mask: Vec::new(),
            bone_timelines: Vec::new(),
            bone_blend_timelines: Vec::new(),
            slot_timelines: Vec::new(),
            slot_blend_timelines: Vec::new(),
            constraint_timelines: Vec::new(),
            animation_timelines: Vec::new(),
            action_timeline: TimelineState::default(),
            z_order_timeline: None,
            animation: None,
            parent: None,
            active_child_a: None,
            active_child_b: None,
            pending_blend_tree: false,
            cascade_fade_out: false,
        }
    }
}

impl Poolable for AnimationState {
    fn clear(&mut self) {
        let mut mask = std::mem::take(&mut self.bone_mask);
        mask.clear();
        let mut lists = [
            std::mem::take(&mut self.bone_timelines),
            std::mem::take(&mut self.bone_blend_timelines),
            std::mem::take(&mut self.slot_timelines),
            std::mem::take(&mut self.slot_blend_timelines),
            std::mem::take(&mut self.constraint_timelines),
            std::mem::take(&mut self.animation_timelines),
        ];
        for list in &mut lists {
            list.clear();
        }
        let [bone, bone_blend, slot, slot_blend, constraint, animation] = lists;
        let mut action = std::mem::take(&mut self.action_timeline);
        action.clear();
        *self = Self {
            bone_mask: mask,
            bone_timelines: bone,
            bone_blend_timelines: bone_blend,
            slot_timelines: slot,
            slot_blend_timelines: slot_blend,
            constraint_timelines: constraint,
            animation_timelines: animation,
            action_timeline: action,
            ..Self::default()
        };
    }
}

impl AnimationState {
    /// Binds a fresh state to `clip` with an already normalized request.
    pub(crate) fn init(
        &mut self,
        id: StateId,
        armature: &ArmatureData,
        clip: Arc<AnimationData>,
        config: &AnimationConfig,
        pool: &mut ObjectPool<TimelineState>,
    ) {
        self.id = Some(id);
        self.reset_to_pose = config.reset_to_pose;
        self.additive = config.additive;
        self.display_control = config.display_control;
        self.action_enabled = config.action_enabled;
        self.blend_type = clip.blend_type;
        self.layer = config.layer;
        self.play_times = config.play_times.max(0) as u32;
        self.time_scale = config.time_scale;
        self.fade_total_time = config.fade_in_time;
        self.auto_fade_out_time = config.auto_fade_out_time;
        self.name = Arc::from(config.state_name());
        self.group.clear();
        self.group.push_str(&config.group);
        self.weight = config.weight;

        self.playhead = if config.pause_fade_in {
            Playhead::new(Playhead::PLAY)
        } else {
            Playhead::new(Playhead::PLAY | Playhead::FADE)
        };

        if config.duration < 0.0 {
            self.position = 0.0;
            self.duration = clip.duration;
            self.time = if config.position != 0.0 {
                if self.time_scale >= 0.0 {
                    config.position
                } else {
                    config.position - self.duration
                }
            } else {
                0.0
            };
        } else {
            self.position = config.position;
            self.duration = config.duration;
            self.time = 0.0;
        }

        if self.time_scale < 0.0 && self.time == 0.0 {
            self.time = -0.000001;
        }
        if self.fade_total_time <= 0.0 {
            self.fade_progress = 0.999999;
        }

        self.bone_mask.extend(config.bone_mask.iter().cloned());

        self.action_timeline.init(
            TimelineKind::Action,
            TimelineTarget::None,
            clip.action_timeline,
            &clip,
            self.position,
            self.duration,
            armature.scale,
            0,
        );
        self.action_timeline.current_time = self.time;
        if self.action_timeline.current_time < 0.0 {
            self.action_timeline.current_time = self.duration - self.action_timeline.current_time;
        }

        if let Some(data) = clip.z_order_timeline {
            let mut timeline = pool.acquire();
            timeline.init(
                TimelineKind::ZOrder,
                TimelineTarget::None,
                Some(data),
                &clip,
                self.position,
                self.duration,
                armature.scale,
                0,
            );
            self.z_order_timeline = Some(timeline);
        }

        log::debug!("state '{}' bound to clip '{}' on layer {}", self.name, clip.name, self.layer);
        self.animation = Some(clip);
    }

    /// Hands every timeline back to the pool. Called before the arena clears the state.
    pub(crate) fn release_timelines(&mut self, pool: &mut ObjectPool<TimelineState>) {
        for list in [
            &mut self.bone_timelines,
            &mut self.bone_blend_timelines,
            &mut self.slot_timelines,
            &mut self.slot_blend_timelines,
            &mut self.constraint_timelines,
            &mut self.animation_timelines,
        ] {
            for timeline in list.drain(..) {
                pool.release(timeline);
            }
        }
        if let Some(timeline) = self.z_order_timeline.take() {
            pool.release(timeline);
        }
    }

    fn view(&self, action: Option<ActionCursor>) -> PlayheadView {
        PlayheadView {
            state: self.id.unwrap_or(StateId {
                index: u32::MAX,
                generation: 0,
            }),
            play_times: self.play_times,
            playhead: self.playhead,
            clip_duration: self.animation.as_ref().map(|a| a.duration).unwrap_or(0.0),
            action,
            fading: self.fade_state != FadeState::Complete
                || self.sub_fade_state != SubFadeState::Progressing,
            fade_progress: self.fade_progress,
            events_enabled: self.parent.is_none() && self.action_enabled,
            action_enabled: self.action_enabled,
            reset_z_order: self.display_control && self.reset_to_pose,
            reverse: self.time_scale < 0.0,
        }
    }

    fn action_cursor(&self) -> ActionCursor {
        ActionCursor {
            play_state: self.action_timeline.play_state,
            current_play_times: self.action_timeline.current_play_times,
            current_time: self.action_timeline.current_time,
        }
    }

    fn queue_lifecycle(&self, kind: EventKind, rig: &mut Rig) {
        if self.parent.is_some() || !self.action_enabled || !rig.events.has_listener(kind) {
            return;
        }
        if let Some(id) = self.id {
            rig.events.queue(EventObject::lifecycle(kind, id, &self.name));
        }
    }

    fn advance_fade_time(&mut self, passed_time: f64, rig: &mut Rig) {
        let is_fade_out = self.fade_state == FadeState::FadingOut;

        if self.sub_fade_state == SubFadeState::Start {
            self.sub_fade_state = SubFadeState::Progressing;
            let kind = if is_fade_out {
                EventKind::FadeOut
            } else {
                EventKind::FadeIn
            };
            self.queue_lifecycle(kind, rig);
        }

        self.fade_time += passed_time.abs();

        if self.fade_time >= self.fade_total_time {
            self.sub_fade_state = SubFadeState::Complete;
            self.fade_progress = if is_fade_out { 0.0 } else { 1.0 };
        } else if self.fade_time > 0.0 {
            let ratio = self.fade_time / self.fade_total_time;
            self.fade_progress = if is_fade_out { 1.0 - ratio } else { ratio };
        } else {
            self.fade_progress = if is_fade_out { 1.0 } else { 0.0 };
        }

        if self.sub_fade_state == SubFadeState::Complete {
            if !is_fade_out {
                self.playhead.set(Playhead::FADE);
                self.fade_state = FadeState::Complete;
            }
            let kind = if is_fade_out {
                EventKind::FadeOutComplete
            } else {
                EventKind::FadeInComplete
            };
            self.queue_lifecycle(kind, rig);
        }
    }

    /// Advances fades and time, then evaluates and blends every timeline.
    pub(crate) fn advance_time(&mut self, passed_time: f64, cache_frame_rate: f64, cx: &mut TickContext<'_>) {
        let Some(clip) = self.animation.clone() else {
            return;
        };

        if self.fade_state != FadeState::Complete || self.sub_fade_state != SubFadeState::Progressing {
            self.advance_fade_time(passed_time, cx.rig);
        }

        if self.playhead.is_running() {
            self.time += if self.time_scale != 1.0 {
                passed_time * self.time_scale
            } else {
                passed_time
            };
        }

        if self.timeline_dirty != TimelineDirty::None {
            if self.timeline_dirty == TimelineDirty::All {
                self.update_timelines(&clip, cx);
            }
            self.timeline_dirty = TimelineDirty::None;
            self.update_bone_and_slot_timelines(&clip, cx);
        }

        let is_blend_dirty =
            self.fade_state != FadeState::Complete || self.sub_fade_state == SubFadeState::Progressing;
        let cache_enabled = self.fade_state == FadeState::Complete && cache_frame_rate > 0.0;
        let mut update_timeline = true;
        let mut update_bone_timeline = true;
        let time = self.time;
        self.weight_result = self.weight * self.fade_progress * cx.parent_weight;

        let action_view = self.view(None);
        let mut tcx = TimelineContext {
            clip: &clip,
            armature: cx.armature,
            rig: &mut *cx.rig,
            nested: &mut *cx.nested,
            state_name: &self.name,
        };

        if self.action_timeline.play_state <= PlayState::Playing {
            self.action_timeline.update_action(time, &action_view, &mut tcx);
        }

        if self.weight == 0.0 {
            return;
        }

        if cache_enabled {
            let interval = cache_frame_rate * 2.0;
            self.action_timeline.current_time =
                (self.action_timeline.current_time * interval).floor() / interval;
        }

        let view = PlayheadView {
            action: Some(self.action_cursor()),
            ..action_view
        };

        if let Some(timeline) = self.z_order_timeline.as_mut() {
            if timeline.play_state <= PlayState::Playing {
                timeline.update(time, &view, &mut tcx);
            }
        }

        if cache_enabled {
            let index = (self.action_timeline.current_time * cache_frame_rate).floor() as i32;
            if tcx.rig.cache_frame_index == index {
                update_timeline = false;
                update_bone_timeline = false;
            } else {
                tcx.rig.cache_frame_index = index;
                if let Some(flag) = cx
                    .cached_frames
                    .as_deref_mut()
                    .and_then(|frames| frames.get_mut(index.max(0) as usize))
                {
                    if *flag {
                        update_bone_timeline = false;
                    } else {
                        *flag = true;
                    }
                }
            }
        }

        if update_timeline {
            let layer = self.layer;
            let weight = self.weight_result;

            if update_bone_timeline {
                let mut prev = None;
                let mut is_blend = false;
                for timeline in &mut self.bone_timelines {
                    if timeline.play_state <= PlayState::Playing {
                        timeline.update(time, &view, &mut tcx);
                    }
                    let Some(id) = timeline.blend_id() else {
                        continue;
                    };
                    if prev != Some(id) {
                        prev = Some(id);
                        is_blend = false;
                        if let Some(blend) = cx.blends.get_mut(id) {
                            is_blend = blend.update(layer, weight);
                            if blend.dirty == 1 {
                                tcx.rig.reset_bone_pose(blend.target.index());
                            }
                        }
                    }
                    if is_blend {
                        if let Some(blend) = cx.blends.get(id).copied() {
                            timeline.blend(is_blend_dirty, &blend, &mut tcx);
                        }
                    }
                }
            }

            for timeline in &mut self.bone_blend_timelines {
                if timeline.play_state <= PlayState::Playing {
                    timeline.update(time, &view, &mut tcx);
                }
                blend_one(timeline, layer, weight, is_blend_dirty, cx.blends, &mut tcx);
            }

            if self.display_control {
                for timeline in &mut self.slot_timelines {
                    if timeline.play_state > PlayState::Playing {
                        continue;
                    }
                    let allowed = match timeline.target {
                        TimelineTarget::Slot(slot) => match tcx
                            .rig
                            .slots
                            .get(slot)
                            .and_then(|s| s.display_controller.as_deref())
                        {
                            None => true,
                            Some(controller) => controller == &*self.name || controller == self.group,
                        },
                        _ => true,
                    };
                    if allowed {
                        timeline.update(time, &view, &mut tcx);
                    }
                }
            }

            for timeline in &mut self.slot_blend_timelines {
                if timeline.play_state <= PlayState::Playing {
                    timeline.update(time, &view, &mut tcx);
                    blend_one(timeline, layer, weight, is_blend_dirty, cx.blends, &mut tcx);
                }
            }

            for timeline in &mut self.constraint_timelines {
                if timeline.play_state <= PlayState::Playing {
                    timeline.update(time, &view, &mut tcx);
                }
            }

            if !self.animation_timelines.is_empty() {
                for timeline in &mut self.animation_timelines {
                    if timeline.play_state <= PlayState::Playing {
                        timeline.update(time, &view, &mut tcx);
                    }
                }
                if self.blend_type == BlendType::E1D {
                    self.pending_blend_tree = true;
                }
            }
        }

        if self.fade_state == FadeState::Complete {
            if self.sub_fade_state == SubFadeState::Complete {
                self.sub_fade_state = SubFadeState::Progressing;
                self.remove_pose_timelines(cx.pool);
            }
            if self.action_timeline.play_state == PlayState::Completed
                && self.auto_fade_out_time >= 0.0
                && self.fade_out(self.auto_fade_out_time, true)
            {
                self.cascade_fade_out = true;
            }
        }
    }

    fn remove_pose_timelines(&mut self, pool: &mut ObjectPool<TimelineState>) {
        for list in [
            &mut self.bone_timelines,
            &mut self.bone_blend_timelines,
            &mut self.slot_timelines,
            &mut self.slot_blend_timelines,
            &mut self.constraint_timelines,
        ] {
            release_where(list, pool, TimelineState::is_pose);
        }
    }

    /// Starts (or shortens) a fade-out. Returns `true` when a new fade-out
    /// began, in which case nested children must follow.
    pub fn fade_out(&mut self, fade_out_time: f64, pause_playhead: bool) -> bool {
        let fade_out_time = fade_out_time.max(0.0);
        if pause_playhead {
            self.playhead.keep(Playhead::PLAY);
        }

        let started = if self.fade_state == FadeState::FadingOut {
            if fade_out_time > self.fade_total_time - self.fade_time {
                return false;
            }
            false
        } else {
            self.fade_state = FadeState::FadingOut;
            self.sub_fade_state = SubFadeState::Start;
            if fade_out_time <= 0.0 || self.fade_progress <= 0.0 {
                self.fade_progress = 0.000001;
            }
            for list in [
                &mut self.bone_timelines,
                &mut self.bone_blend_timelines,
                &mut self.slot_timelines,
                &mut self.slot_blend_timelines,
                &mut self.constraint_timelines,
                &mut self.animation_timelines,
            ] {
                for timeline in list.iter_mut() {
                    timeline.fade_out();
                }
            }
            true
        };

        self.display_control = false;
        self.fade_total_time = if self.fade_progress > 0.000001 {
            fade_out_time / self.fade_progress
        } else {
            0.0
        };
        self.fade_time = self.fade_total_time * (1.0 - self.fade_progress);
        started
    }

    /// Scrubs the playhead. Bone, slot and z-order timelines re-evaluate on
    /// the next tick.
    pub fn set_current_time(&mut self, value: f64) {
        let action = &self.action_timeline;
        let current_play_times = action.current_play_times
            - if action.play_state == PlayState::Completed { 1 } else { 0 };
        let mut value = value;
        if self.duration > 0.0 && (value < 0.0 || self.duration < value) {
            value = value % self.duration + current_play_times as f64 * self.duration;
            if value < 0.0 {
                value += self.duration;
            }
        }

        if self.play_times > 0
            && current_play_times == self.play_times as i32 - 1
            && value == self.duration
            && self.parent.is_none()
        {
            value = self.duration - 0.000001;
        }

        if self.time == value {
            return;
        }
        self.time = value;
        let view = self.view(None);
        self.action_timeline.seek_action(self.time, &view);

        if let Some(timeline) = self.z_order_timeline.as_mut() {
            timeline.play_state = PlayState::NotStarted;
        }
        for timeline in self.bone_timelines.iter_mut().chain(self.slot_timelines.iter_mut()) {
            timeline.play_state = PlayState::NotStarted;
        }
    }

    pub fn play(&mut self) {
        self.playhead = Playhead::new(Playhead::PLAY | Playhead::FADE);
    }

    pub fn stop(&mut self) {
        self.playhead.keep(Playhead::FADE);
    }

    pub fn set_weight(&mut self, value: f64) {
        if self.weight == value {
            return;
        }
        self.weight = value;
        for timeline in self
            .bone_timelines
            .iter_mut()
            .chain(self.bone_blend_timelines.iter_mut())
            .chain(self.slot_blend_timelines.iter_mut())
        {
            timeline.dirty = true;
        }
    }

    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Forces slot timelines to write again; used when a blend-tree child becomes active.
    pub(crate) fn activate_timelines(&mut self) {
        for timeline in &mut self.slot_timelines {
            timeline.reactivate();
        }
    }

    /// Binds a child state through `timelines` (progress/weight/parameter).
    /// Returns the child's blend-tree position when this state blends its children.
    pub(crate) fn add_state(
        &mut self,
        child: StateId,
        timelines: &[TimelineData],
        armature: &ArmatureData,
        pool: &mut ObjectPool<TimelineState>,
    ) -> Option<(f64, f64)> {
        let clip = self.animation.clone()?;
        let mut position = None;
        for data in timelines {
            let mut timeline = pool.acquire();
            timeline.init(
                data.kind,
                TimelineTarget::State(child),
                Some(*data),
                &clip,
                self.position,
                self.duration,
                armature.scale,
                0,
            );
            if data.kind == TimelineKind::AnimationProgress {
                if self.blend_type != BlendType::None {
                    position = Some((data.x, data.y));
                }
                self.reset_to_pose = false;
            }
            self.animation_timelines.push(timeline);
        }
        position
    }

    /// Children bound through animation timelines.
    pub(crate) fn child_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.animation_timelines.iter().filter_map(TimelineState::child_state)
    }

    pub fn contains_bone_mask(&self, name: &str) -> bool {
        self.bone_mask.is_empty() || self.bone_mask.iter().any(|b| b == name)
    }

    /// Adds `name` (and with `recursive`, every descendant) to the mask.
    pub fn add_bone_mask(&mut self, rig: &Rig, name: &str, recursive: bool) {
        let Some(current) = rig.bone_index(name) else {
            return;
        };
        if !self.bone_mask.iter().any(|b| b == name) {
            self.bone_mask.push(name.to_owned());
        }
        if recursive {
            for (index, bone) in rig.bones.iter().enumerate() {
                if !self.bone_mask.contains(&bone.name) && rig.is_ancestor(current, index) {
                    self.bone_mask.push(bone.name.clone());
                }
            }
        }
        self.mark_mask_dirty();
    }

    /// Removes `name` from the mask. With `recursive`, descendants are
    /// removed too; removing from an empty mask (everything) instead masks in
    /// every bone outside the `name` subtree.
    pub fn remove_bone_mask(&mut self, rig: &Rig, name: &str, recursive: bool) {
        if let Some(index) = self.bone_mask.iter().position(|b| b == name) {
            self.bone_mask.remove(index);
        }
        if recursive {
            if let Some(current) = rig.bone_index(name) {
                if !self.bone_mask.is_empty() {
                    self.bone_mask.retain(|masked| {
                        rig.bone_index(masked)
                            .map(|index| !rig.is_ancestor(current, index))
                            .unwrap_or(true)
                    });
                } else {
                    for (index, bone) in rig.bones.iter().enumerate() {
                        if index != current && !rig.is_ancestor(current, index) {
                            self.bone_mask.push(bone.name.clone());
                        }
                    }
                }
            }
        }
        self.mark_mask_dirty();
    }

    pub fn remove_all_bone_mask(&mut self) {
        self.bone_mask.clear();
        self.mark_mask_dirty();
    }

    /// A pending full resolve already covers bones and slots.
    fn mark_mask_dirty(&mut self) {
        if self.timeline_dirty == TimelineDirty::None {
            self.timeline_dirty = TimelineDirty::BonesAndSlots;
        }
    }

    pub fn bone_mask(&self) -> &[String] {
        &self.bone_mask
    }

    pub fn is_fade_in(&self) -> bool {
        self.fade_state == FadeState::FadingIn
    }

    pub fn is_fade_out(&self) -> bool {
        self.fade_state == FadeState::FadingOut
    }

    pub fn is_fade_complete(&self) -> bool {
        self.fade_state == FadeState::Complete
    }

    /// Fully faded out and ready to be recycled.
    #[inline]
    pub fn is_faded_out(&self) -> bool {
        self.fade_state == FadeState::FadingOut && self.sub_fade_state == SubFadeState::Complete
    }

    pub fn is_playing(&self) -> bool {
        self.playhead.has(Playhead::PLAY) && self.action_timeline.play_state <= PlayState::Playing
    }

    pub fn is_completed(&self) -> bool {
        self.action_timeline.play_state == PlayState::Completed
    }

    pub fn fade_state(&self) -> FadeState {
        self.fade_state
    }

    pub fn sub_fade_state(&self) -> SubFadeState {
        self.sub_fade_state
    }

    pub fn playhead(&self) -> Playhead {
        self.playhead
    }

    pub fn current_play_times(&self) -> i32 {
        self.action_timeline.current_play_times
    }

    pub fn current_time(&self) -> f64 {
        self.action_timeline.current_time
    }

    pub fn total_time(&self) -> f64 {
        self.duration
    }

    pub fn fade_progress(&self) -> f64 {
        self.fade_progress
    }

    pub fn weight_result(&self) -> f64 {
        self.weight_result
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn id(&self) -> Option<StateId> {
        self.id
    }

    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    pub fn animation_data(&self) -> Option<&Arc<AnimationData>> {
        self.animation.as_ref()
    }

    /// Timelines currently resolved for this state, excluding the action timeline.
    pub fn timeline_count(&self) -> usize {
        self.bone_timelines.len()
            + self.bone_blend_timelines.len()
            + self.slot_timelines.len()
            + self.slot_blend_timelines.len()
            + self.constraint_timelines.len()
            + self.animation_timelines.len()
    }
}

/// Claims weight from the timeline's own accumulator and blends if granted.
fn blend_one(
    timeline: &mut TimelineState,
    layer: i32,
    weight: f64,
    is_blend_dirty: bool,
    blends: &mut BlendStateTable,
    tcx: &mut TimelineContext<'_>,
) {
    let Some(id) = timeline.blend_id() else {
        return;
    };
    let Some(blend) = blends.get_mut(id) else {
        return;
    };
    if blend.update(layer, weight) {
        let blend = *blend;
        timeline.blend(is_blend_dirty, &blend, tcx);
    }
}

/// Moves timelines matching `pred` back into the pool, keeping list order.
pub(crate) fn release_where(
    list: &mut Vec<TimelineState>,
    pool: &mut ObjectPool<TimelineState>,
    mut pred: impl FnMut(&TimelineState) -> bool,
) {
    let mut i = 0;
    while i < list.len() {
        if pred(&list[i]) {
            pool.release(list.remove(i));
        } else {
            i += 1;
        }
    }
}
