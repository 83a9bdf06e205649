//! Keyframe evaluators.
//!
//! A [`TimelineState`] maps a state's elapsed time to a keyframe and tween
//! progress, decodes the keyframe values, and blends them into its target.
//! The closed set of kinds is matched in [`values`]; the action/event driver
//! lives in [`action`].
//!
//! Value layout in `rd`: `[result; n] [current; n] [difference; n]`.

mod action;
mod values;

use std::sync::Arc;

use crate::armature::rig::Rig;
use crate::blend_state::BlendState;
use crate::data::{offsets, AnimationData, ArmatureData, TimelineData, TimelineKind, TweenType};
use crate::ids::{BlendId, StateId};
use crate::pool::Poolable;
use crate::tween::{curve_value, easing_value};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlayState {
    #[default]
    NotStarted,
    Playing,
    Completed,
}

/// Two independent playhead bits: play enabled and fade not paused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Playhead(u8);

impl Playhead {
    pub const PLAY: u8 = 0b01;
    pub const FADE: u8 = 0b10;

    #[inline]
    pub fn new(bits: u8) -> Self {
        Self(bits & 0b11)
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Time advances only with both bits set.
    #[inline]
    pub fn is_running(self) -> bool {
        self.0 == Self::PLAY | Self::FADE
    }

    #[inline]
    pub fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    #[inline]
    pub fn set(&mut self, bit: u8) {
        self.0 |= bit;
    }

    #[inline]
    pub fn keep(&mut self, mask: u8) {
        self.0 &= mask;
    }
}

/// What a timeline writes into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum TimelineTarget {
    #[default]
    None,
    Blend(BlendId),
    Slot(usize),
    Constraint(usize),
    State(StateId),
}

/// Snapshot of the action timeline, shared by every other timeline of a state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct ActionCursor {
    pub play_state: PlayState,
    pub current_play_times: i32,
    pub current_time: f64,
}

/// Read-only view of the owning state for one evaluation pass.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PlayheadView {
    pub state: StateId,
    pub play_times: u32,
    pub playhead: Playhead,
    pub clip_duration: f64,
    /// `None` while evaluating the action timeline itself.
    pub action: Option<ActionCursor>,
    pub fading: bool,
    pub fade_progress: f64,
    /// Top-level state with actions enabled.
    pub events_enabled: bool,
    pub action_enabled: bool,
    pub reset_z_order: bool,
    pub reverse: bool,
}

impl PlayheadView {
    #[inline]
    fn current_play_times(&self) -> i32 {
        self.action.map(|a| a.current_play_times).unwrap_or(0)
    }
}

/// Writes aimed at other states, applied by the controller after the tick of
/// the writing state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum NestedWrite {
    Progress { child: StateId, progress: f64 },
    Weight { child: StateId, weight: f64 },
    Parameter { child: StateId, x: f64, y: f64 },
}

pub(crate) struct TimelineContext<'a> {
    pub clip: &'a AnimationData,
    pub armature: &'a ArmatureData,
    pub rig: &'a mut Rig,
    pub nested: &'a mut Vec<NestedWrite>,
    pub state_name: &'a Arc<str>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum ValueSource {
    #[default]
    None,
    Int,
    Float,
    Color,
}

/// Window layout of surface and mesh deform buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct DeformLayout {
    pub deform_count: usize,
    pub deform_offset: usize,
    pub same_value_offset: usize,
    pub geometry: Option<u32>,
}

#[derive(Debug, Default)]
pub struct TimelineState {
    pub(crate) kind: TimelineKind,
    pub(crate) target: TimelineTarget,
    /// Bone, slot or constraint index the timeline was resolved against.
    pub(crate) rig_index: usize,
    pub(crate) data: Option<TimelineData>,
    pub dirty: bool,
    pub play_state: PlayState,
    pub current_play_times: i32,
    pub current_time: f64,

    frame_rate: f64,
    frame_rate_r: f64,
    frame_count: usize,
    frame_index: i32,
    frame_offset: usize,
    frame_value_offset: usize,
    value_offset: usize,
    position: f64,
    duration: f64,
    time_scale: f64,
    time_offset: f64,

    is_tween: bool,
    tween_type: TweenType,
    tween_easing: f64,
    tween_progress: f64,
    curve_count: usize,
    frame_position: f64,
    frame_duration_r: f64,

    value_source: ValueSource,
    value_count: usize,
    value_scale: f64,
    rd: Vec<f64>,
    pub(crate) deform: DeformLayout,
}

impl Poolable for TimelineState {
    fn clear(&mut self) {
        let mut rd = std::mem::take(&mut self.rd);
        rd.clear();
        *self = Self {
            rd,
            ..Self::default()
        };
    }
}

/// Per-kind value shape: source array, values per key, scale.
fn value_layout(kind: TimelineKind, armature_scale: f64) -> (ValueSource, usize, f64) {
    match kind {
        TimelineKind::BoneAll => (ValueSource::Float, 6, 1.0),
        TimelineKind::BoneTranslate => (ValueSource::Float, 2, armature_scale),
        TimelineKind::BoneRotate | TimelineKind::BoneScale => (ValueSource::Float, 2, 1.0),
        TimelineKind::BoneAlpha | TimelineKind::SlotAlpha => (ValueSource::Int, 1, 0.01),
        TimelineKind::SlotZIndex => (ValueSource::Int, 1, 1.0),
        TimelineKind::IkConstraint => (ValueSource::Int, 2, 0.01),
        TimelineKind::AnimationProgress | TimelineKind::AnimationWeight => {
            (ValueSource::Int, 1, 0.0001)
        }
        TimelineKind::AnimationParameter => (ValueSource::Int, 2, 0.0001),
        TimelineKind::Surface | TimelineKind::SlotDeform => (ValueSource::Float, 0, armature_scale),
        TimelineKind::SlotColor => (ValueSource::Color, 8, 1.0),
        TimelineKind::Action | TimelineKind::ZOrder | TimelineKind::SlotDisplay => {
            (ValueSource::None, 0, 1.0)
        }
    }
}

impl TimelineState {
    #[inline]
    pub fn kind(&self) -> TimelineKind {
        self.kind
    }

    #[inline]
    pub fn is_pose(&self) -> bool {
        self.data.is_none()
    }

    /// Binds the evaluator to one timeline of `clip`. `data == None` builds a
    /// pose-fallback evaluator; `pose_deform_count` sizes its deform output.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn init(
        &mut self,
        kind: TimelineKind,
        target: TimelineTarget,
        data: Option<TimelineData>,
        clip: &AnimationData,
        position: f64,
        duration: f64,
        armature_scale: f64,
        pose_deform_count: usize,
    ) {
        self.kind = kind;
        self.target = target;
        self.data = data;
        self.frame_rate = clip.frame_rate as f64;
        self.frame_rate_r = if clip.frame_rate > 0 {
            1.0 / self.frame_rate
        } else {
            0.0
        };
        self.position = position;
        self.duration = duration;
        self.play_state = PlayState::NotStarted;
        self.current_play_times = -1;
        self.current_time = -1.0;
        self.frame_index = -1;
        self.dirty = false;

        match data {
            Some(td) => {
                self.frame_count = clip.header(&td, offsets::TIMELINE_KEY_FRAME_COUNT).max(0) as usize;
                self.frame_value_offset =
                    clip.header(&td, offsets::TIMELINE_FRAME_VALUE_OFFSET).max(0) as usize;
                let scale = clip.header(&td, offsets::TIMELINE_SCALE);
                self.time_scale = if scale != 0 { 100.0 / scale as f64 } else { 1.0 };
                self.time_offset = clip.header(&td, offsets::TIMELINE_OFFSET) as f64 * 0.01;
            }
            None => {
                self.frame_count = 0;
                self.frame_value_offset = 0;
                self.time_scale = 1.0;
                self.time_offset = 0.0;
            }
        }

        let (source, count, scale) = value_layout(kind, armature_scale);
        self.value_source = source;
        self.value_count = count;
        self.value_scale = scale;
        self.value_offset = match source {
            ValueSource::Int | ValueSource::Color => clip.frame_int_offset,
            ValueSource::Float => clip.frame_float_offset,
            ValueSource::None => 0,
        };

        if matches!(kind, TimelineKind::Surface | TimelineKind::SlotDeform) {
            self.init_deform(clip, pose_deform_count);
        }

        self.rd.clear();
        self.rd.resize(self.value_count * 3, 0.0);
    }

    fn init_deform(&mut self, clip: &AnimationData, pose_deform_count: usize) {
        match self.data {
            Some(td) => {
                let header = clip.frame_int_offset
                    + clip.header(&td, offsets::TIMELINE_FRAME_VALUE_COUNT).max(0) as usize;
                let word = |i: usize| clip.arrays.frame_int.get(header + i).copied().unwrap_or(0);
                let geometry = word(offsets::DEFORM_GEOMETRY_OFFSET);
                self.deform.geometry = u32::try_from(geometry).ok();
                self.deform.deform_count = word(offsets::DEFORM_COUNT).max(0) as usize;
                self.value_count = word(offsets::DEFORM_VALUE_COUNT).max(0) as usize;
                self.deform.deform_offset = word(offsets::DEFORM_VALUE_OFFSET).max(0) as usize;
                self.deform.same_value_offset =
                    word(offsets::DEFORM_FLOAT_OFFSET).max(0) as usize + clip.frame_float_offset;
            }
            None => {
                self.deform.deform_count = pose_deform_count;
                self.deform.deform_offset = 0;
                self.deform.same_value_offset = 0;
                self.value_count = 0;
            }
        }
    }

    /// Maps `passed_time` (state time) onto this timeline. Returns `false`
    /// when neither the loop count nor the local time changed.
    pub(crate) fn set_current_time(&mut self, passed_time: f64, view: &PlayheadView) -> bool {
        let prev_state = self.play_state;
        let prev_play_times = self.current_play_times;
        let prev_time = self.current_time;

        match view.action {
            Some(action) if self.frame_count <= 1 => {
                self.play_state = if action.play_state >= PlayState::Playing {
                    PlayState::Completed
                } else {
                    PlayState::NotStarted
                };
                self.current_play_times = 1;
                self.current_time = action.current_time;
            }
            Some(action) if self.time_scale == 1.0 && self.time_offset == 0.0 => {
                self.play_state = action.play_state;
                self.current_play_times = action.current_play_times;
                self.current_time = action.current_time;
            }
            _ => {
                let play_times = view.play_times;
                let total_time = play_times as f64 * self.duration;
                let mut passed_time = passed_time * self.time_scale;
                if self.time_offset != 0.0 {
                    passed_time += self.time_offset * view.clip_duration;
                }

                if play_times > 0 && (passed_time >= total_time || passed_time <= -total_time) {
                    if self.play_state <= PlayState::Playing && view.playhead.is_running() {
                        self.play_state = PlayState::Completed;
                    }
                    self.current_play_times = play_times as i32;
                    self.current_time = if passed_time < 0.0 {
                        0.0
                    } else if self.play_state == PlayState::Completed {
                        self.duration + 0.000001
                    } else {
                        self.duration
                    };
                } else {
                    if self.play_state != PlayState::Playing && view.playhead.is_running() {
                        self.play_state = PlayState::Playing;
                    }
                    if self.duration <= 0.0 {
                        self.current_play_times = 0;
                        self.current_time = 0.0;
                    } else if passed_time < 0.0 {
                        let passed_time = -passed_time;
                        self.current_play_times = (passed_time / self.duration).floor() as i32;
                        self.current_time = self.duration - passed_time % self.duration;
                    } else {
                        self.current_play_times = (passed_time / self.duration).floor() as i32;
                        self.current_time = passed_time % self.duration;
                    }
                }
                self.current_time += self.position;
            }
        }

        if self.current_play_times == prev_play_times && self.current_time == prev_time {
            return false;
        }

        if (prev_state == PlayState::NotStarted && self.play_state != prev_state)
            || (self.play_state <= PlayState::Playing && self.current_play_times != prev_play_times)
        {
            self.frame_index = -1;
        }
        true
    }

    pub(crate) fn update(
        &mut self,
        passed_time: f64,
        view: &PlayheadView,
        cx: &mut TimelineContext<'_>,
    ) {
        if self.set_current_time(passed_time, view) {
            if self.frame_count > 1 {
                if let Some(td) = self.data {
                    let bucket = (self.current_time * self.frame_rate).floor() as i64;
                    let index = cx.clip.key_frame_at(&td, bucket) as i32;
                    if self.frame_index != index {
                        self.frame_index = index;
                        self.frame_offset = cx.clip.frame_position_of(&td, index as usize);
                        self.arrive(view, cx);
                    }
                }
            } else if self.frame_index < 0 {
                self.frame_index = 0;
                if let Some(td) = self.data {
                    self.frame_offset = cx.clip.frame_position_of(&td, 0);
                }
                self.arrive(view, cx);
            }

            if self.is_tween || self.dirty {
                self.update_frame(cx);
            }
        }

        if self.kind == TimelineKind::SlotColor {
            self.settle_color(view, cx);
        }
    }

    /// Stops contributing while the owning state fades out.
    pub(crate) fn fade_out(&mut self) {
        match self.kind {
            TimelineKind::SlotColor => self.is_tween = false,
            TimelineKind::BoneAll => {
                self.dirty = false;
                self.rd[2] = crate::tween::normalize_radian(self.rd[2]);
                self.rd[3] = crate::tween::normalize_radian(self.rd[3]);
            }
            TimelineKind::BoneRotate => {
                self.dirty = false;
                self.rd[0] = crate::tween::normalize_radian(self.rd[0]);
                self.rd[1] = crate::tween::normalize_radian(self.rd[1]);
            }
            _ => self.dirty = false,
        }
    }

    /// Forces slot timelines to re-apply on their next update.
    pub(crate) fn reactivate(&mut self) {
        self.dirty = true;
        self.current_time = -1.0;
    }

    #[inline]
    pub(crate) fn blend_id(&self) -> Option<BlendId> {
        match self.target {
            TimelineTarget::Blend(id) => Some(id),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn child_state(&self) -> Option<StateId> {
        match self.target {
            TimelineTarget::State(id) => Some(id),
            _ => None,
        }
    }

    #[inline]
    fn is_last_frame(&self) -> bool {
        self.frame_count > 0 && self.frame_index == self.frame_count as i32 - 1
    }

    fn tween_arrive(&mut self, view: &PlayheadView, clip: &AnimationData) {
        let more_loops = view.play_times == 0
            || view.current_play_times() < view.play_times as i32 - 1;
        if self.frame_count > 1 && (!self.is_last_frame() || more_loops) {
            let fo = self.frame_offset;
            self.tween_type = TweenType::from_raw(clip.frame(fo + offsets::FRAME_TWEEN_TYPE));
            self.is_tween = self.tween_type != TweenType::None;
            if self.is_tween {
                let parameter = clip.frame(fo + offsets::FRAME_TWEEN_EASING_OR_CURVE_SAMPLE_COUNT);
                match self.tween_type {
                    TweenType::Curve => self.curve_count = parameter.max(0) as usize,
                    TweenType::Line | TweenType::None => {}
                    _ => self.tween_easing = parameter as f64 * 0.01,
                }
            } else {
                self.dirty = true;
            }

            self.frame_position = clip.frame(fo + offsets::FRAME_POSITION) as f64 * self.frame_rate_r;
            let span = if self.is_last_frame() {
                clip.duration - self.frame_position
            } else {
                match self.data {
                    Some(td) => {
                        let next = clip.frame_position_of(&td, self.frame_index as usize + 1);
                        clip.frame(next + offsets::FRAME_POSITION) as f64 * self.frame_rate_r
                            - self.frame_position
                    }
                    None => 0.0,
                }
            };
            self.frame_duration_r = if span > 0.0 { 1.0 / span } else { 0.0 };
        } else {
            self.dirty = true;
            self.is_tween = false;
        }
    }

    fn tween_update(&mut self, clip: &AnimationData) {
        if !self.is_tween {
            return;
        }
        self.dirty = true;
        let progress = (self.current_time - self.frame_position) * self.frame_duration_r;
        self.tween_progress = match self.tween_type {
            TweenType::Curve => curve_value(
                progress,
                &clip.arrays.frame,
                self.frame_offset + offsets::FRAME_CURVE_SAMPLES,
                self.curve_count,
            ),
            TweenType::Line | TweenType::None => progress,
            tween => easing_value(tween, progress, self.tween_easing),
        };
    }

    #[inline]
    fn read_value(&self, clip: &AnimationData, index: usize) -> f64 {
        match self.value_source {
            ValueSource::Int | ValueSource::Color => {
                clip.arrays.frame_int.get(index).copied().unwrap_or(0) as f64
            }
            ValueSource::Float => clip.arrays.frame_float.get(index).copied().unwrap_or(0.0) as f64,
            ValueSource::None => 0.0,
        }
    }

    /// Decodes the current keyframe into results (step) or current/difference (tween).
    fn values_arrive(&mut self, clip: &AnimationData) {
        let n = self.value_count;
        if self.data.is_none() {
            self.rd[..n].iter_mut().for_each(|v| *v = 0.0);
            return;
        }
        let base = self.value_offset + self.frame_value_offset + self.frame_index.max(0) as usize * n;
        if self.is_tween {
            let next = if self.is_last_frame() {
                self.value_offset + self.frame_value_offset
            } else {
                base + n
            };
            for i in 0..n {
                let current = self.read_value(clip, base + i) * self.value_scale;
                let target = self.read_value(clip, next + i) * self.value_scale;
                self.rd[n + i] = current;
                self.rd[2 * n + i] = target - current;
            }
        } else {
            for i in 0..n {
                self.rd[i] = self.read_value(clip, base + i) * self.value_scale;
            }
        }
    }

    fn values_update(&mut self) {
        if !self.is_tween {
            return;
        }
        let n = self.value_count;
        for i in 0..n {
            self.rd[i] = self.rd[n + i] + self.rd[2 * n + i] * self.tween_progress;
        }
    }

    #[inline]
    pub(crate) fn result(&self, i: usize) -> f64 {
        self.rd.get(i).copied().unwrap_or(0.0)
    }

    pub(crate) fn blend(&mut self, is_dirty: bool, blend: &BlendState, cx: &mut TimelineContext<'_>) {
        values::blend(self, is_dirty, blend, cx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(play_times: u32) -> PlayheadView {
        PlayheadView {
            state: StateId {
                index: 0,
                generation: 0,
            },
            play_times,
            playhead: Playhead::new(Playhead::PLAY | Playhead::FADE),
            clip_duration: 1.0,
            action: None,
            fading: false,
            fade_progress: 1.0,
            events_enabled: true,
            action_enabled: true,
            reset_z_order: true,
            reverse: false,
        }
    }

    fn cursor() -> TimelineState {
        let mut t = TimelineState::default();
        let clip = AnimationData {
            frame_rate: 10,
            duration: 1.0,
            ..AnimationData::default()
        };
        t.init(TimelineKind::Action, TimelineTarget::None, None, &clip, 0.0, 1.0, 1.0, 0);
        t
    }

    #[test]
    fn looping_time_wraps_and_counts_loops() {
        let mut t = cursor();
        assert!(t.set_current_time(1.5, &view(0)));
        assert_eq!(t.play_state, PlayState::Playing);
        assert_eq!(t.current_play_times, 1);
        assert!((t.current_time - 0.5).abs() < 1e-9);
        assert!(!t.set_current_time(1.5, &view(0)));
    }

    #[test]
    fn finite_play_completes_past_total() {
        let mut t = cursor();
        t.set_current_time(0.2, &view(2));
        assert_eq!(t.play_state, PlayState::Playing);
        t.set_current_time(2.5, &view(2));
        assert_eq!(t.play_state, PlayState::Completed);
        assert_eq!(t.current_play_times, 2);
        assert!((t.current_time - 1.000001).abs() < 1e-12);
    }

    #[test]
    fn negative_time_walks_backwards() {
        let mut t = cursor();
        t.set_current_time(-0.25, &view(0));
        assert_eq!(t.current_play_times, 0);
        assert!((t.current_time - 0.75).abs() < 1e-9);
    }

    #[test]
    fn paused_playhead_does_not_start() {
        let mut t = cursor();
        let mut v = view(0);
        v.playhead = Playhead::new(Playhead::FADE);
        t.set_current_time(0.0, &v);
        assert_eq!(t.play_state, PlayState::NotStarted);
    }

    #[test]
    fn single_frame_timelines_mirror_action_cursor() {
        let mut t = cursor();
        let mut v = view(0);
        v.action = Some(ActionCursor {
            play_state: PlayState::Playing,
            current_play_times: 3,
            current_time: 0.4,
        });
        assert!(t.set_current_time(9.0, &v));
        assert_eq!(t.play_state, PlayState::Completed);
        assert_eq!(t.current_play_times, 1);
        assert!((t.current_time - 0.4).abs() < 1e-12);
    }

    #[test]
    fn clear_keeps_value_buffer() {
        let mut t = cursor();
        t.rd.resize(18, 1.0);
        let cap = t.rd.capacity();
        t.clear();
        assert!(t.rd.is_empty());
        assert_eq!(t.rd.capacity(), cap);
        assert_eq!(t.frame_index, 0);
    }
}
