//! Per-armature animation controller.
//!
//! [`Animation`] owns every live [`AnimationState`] of one armature in a
//! generational arena plus an ordered list of active states (descending
//! layer, arrival order within a layer). Requests that need the armature's
//! rig (`play`, `fade_in`, bone masks) go through [`AnimationControl`], which
//! [`crate::Armature::animation_mut`] hands out.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use hashbrown::HashMap;
use indexmap::IndexMap;

use crate::animation_config::{AnimationConfig, FadeOutMode};
use crate::armature::rig::Rig;
use crate::blend_state::{BlendChannel, BlendState, BlendStateTable, BlendTarget};
use crate::config::Config;
use crate::data::{AnimationData, ArmatureData};
use crate::error::{AnimationError, Result};
use crate::ids::StateId;
use crate::pool::{Arena, ObjectPool};
use crate::state::{AnimationState, FadeState, SubFadeState, TickContext};
use crate::timeline::{NestedWrite, TimelineState};

/// Fade-out applied to nested children when their parent fades out: long
/// enough that they are held until the parent is gone.
const CHILD_FADE_OUT_TIME: f64 = 999999.0;

/// Per-clip frame cache built by [`crate::Armature::set_cache_frame_rate`].
#[derive(Clone, Debug)]
pub struct FrameCache {
    pub cache_frame_rate: f64,
    /// One flag per bucket: whether bone timelines were already evaluated there.
    pub cached_frames: Vec<bool>,
    pub(crate) bone_indices: Vec<Arc<[i32]>>,
    pub(crate) slot_indices: Vec<Arc<[i32]>>,
}

impl FrameCache {
    fn new(clip: &AnimationData, frame_rate: f64, rig: &Rig) -> Self {
        let cache_frame_rate = (frame_rate * clip.scale).ceil().max(1.0);
        let buckets = (cache_frame_rate * clip.duration).ceil() as usize + 1;
        let table = || -> Arc<[i32]> { vec![-1; buckets].into() };
        Self {
            cache_frame_rate,
            cached_frames: vec![false; buckets],
            bone_indices: rig.bones.iter().map(|_| table()).collect(),
            slot_indices: rig.slots.iter().map(|_| table()).collect(),
        }
    }
}

#[derive(Debug)]
pub struct Animation {
    /// Multiplies every tick of this controller.
    pub time_scale: f64,
    inherit_time_scale: f64,
    animation_dirty: bool,
    states: Arena<AnimationState>,
    active: Vec<StateId>,
    last_state: Option<StateId>,
    blends: BlendStateTable,
    timelines: ObjectPool<TimelineState>,
    caches: HashMap<String, FrameCache>,
    animations: IndexMap<String, Arc<AnimationData>>,
    default_animation: Option<String>,
    nested: Vec<NestedWrite>,
    config: Config,
}

impl Animation {
    pub fn new(data: &ArmatureData, config: &Config) -> Self {
        Self {
            time_scale: 1.0,
            inherit_time_scale: 1.0,
            animation_dirty: false,
            states: Arena::with_capacity(config.initial_states),
            active: Vec::with_capacity(config.initial_states),
            last_state: None,
            blends: BlendStateTable::with_capacity(config.initial_blend_states),
            timelines: ObjectPool::new(config.max_pooled_timelines),
            caches: HashMap::new(),
            animations: data.animations.clone(),
            default_animation: data.default_animation.clone(),
            nested: Vec::new(),
            config: config.clone(),
        }
    }

    /// Scale applied to this tick, including the parent armature's when inherited.
    pub fn inherit_time_scale(&self) -> f64 {
        self.inherit_time_scale
    }

    pub fn has_animation(&self, name: &str) -> bool {
        self.animations.contains_key(name)
    }

    pub fn animation_names(&self) -> impl Iterator<Item = &str> {
        self.animations.keys().map(String::as_str)
    }

    pub fn animations(&self) -> &IndexMap<String, Arc<AnimationData>> {
        &self.animations
    }

    /// Active states, highest layer first.
    pub fn states(&self) -> &[StateId] {
        &self.active
    }

    pub fn state(&self, id: StateId) -> Option<&AnimationState> {
        self.states.get(id)
    }

    pub fn state_mut(&mut self, id: StateId) -> Option<&mut AnimationState> {
        self.states.get_mut(id)
    }

    /// Most recently inserted state named `name`; `layer < 0` matches any layer.
    pub fn get_state(&self, name: &str, layer: i32) -> Option<StateId> {
        self.active.iter().rev().copied().find(|id| {
            self.states
                .get(*id)
                .is_some_and(|s| s.name() == name && (layer < 0 || s.layer == layer))
        })
    }

    pub fn is_playing(&self) -> bool {
        self.active
            .iter()
            .any(|id| self.states.get(*id).is_some_and(AnimationState::is_playing))
    }

    pub fn is_completed(&self) -> bool {
        !self.active.is_empty()
            && self
                .active
                .iter()
                .all(|id| self.states.get(*id).is_some_and(AnimationState::is_completed))
    }

    pub fn last_state(&self) -> Option<StateId> {
        self.last_state.filter(|id| self.states.contains(*id))
    }

    pub fn last_animation_name(&self) -> Option<&str> {
        self.last_state().and_then(|id| self.states.get(id)).map(AnimationState::name)
    }

    pub fn blend_state(&self, channel: BlendChannel, target: BlendTarget) -> Option<&BlendState> {
        self.blends.find(channel, target)
    }

    pub fn frame_cache(&self, clip: &str) -> Option<&FrameCache> {
        self.caches.get(clip)
    }

    /// Pauses the named state, or every state.
    pub fn stop(&mut self, name: Option<&str>) {
        match name {
            Some(name) => {
                if let Some(state) = self.get_state(name, -1).and_then(|id| self.states.get_mut(id)) {
                    state.stop();
                }
            }
            None => {
                for id in &self.active {
                    if let Some(state) = self.states.get_mut(*id) {
                        state.stop();
                    }
                }
            }
        }
    }

    /// Recycles every state.
    pub fn reset(&mut self) {
        let mut ids = std::mem::take(&mut self.active);
        for id in ids.drain(..) {
            if let Some(state) = self.states.get_mut(id) {
                state.release_timelines(&mut self.timelines);
            }
            self.states.release(id);
        }
        self.active = ids;
        self.last_state = None;
    }

    /// Fades out `id` and, when a new fade-out starts, every nested child.
    /// Returns `false` for unknown ids.
    pub fn fade_out(&mut self, id: StateId, fade_out_time: f64, pause_playhead: bool) -> bool {
        let Some(state) = self.states.get_mut(id) else {
            return false;
        };
        if state.fade_out(fade_out_time, pause_playhead) {
            self.cascade_fade_out(id);
        }
        true
    }

    fn cascade_fade_out(&mut self, id: StateId) {
        let children: Vec<StateId> = match self.states.get(id) {
            Some(state) => state.child_states().collect(),
            None => return,
        };
        for child in children {
            self.fade_out(child, CHILD_FADE_OUT_TIME, true);
        }
    }

    fn is_faded_out(&self, id: StateId) -> bool {
        self.states.get(id).is_some_and(AnimationState::is_faded_out)
    }

    /// Returns a state to the arena. Its nested children are detached and
    /// marked fully faded out.
    fn recycle(&mut self, id: StateId) {
        let Some(state) = self.states.get_mut(id) else {
            return;
        };
        state.release_timelines(&mut self.timelines);
        log::debug!("recycling state '{}'", state.name());

        for other in &self.active {
            if let Some(child) = self.states.get_mut(*other) {
                if child.parent == Some(id) {
                    child.fade_state = FadeState::FadingOut;
                    child.sub_fade_state = SubFadeState::Complete;
                    child.parent = None;
                }
            }
        }
        self.states.release(id);
    }

    /// Applies the request's fade-out policy to top-level states.
    fn fade_out_for(&mut self, config: &AnimationConfig) {
        if config.fade_out_mode == FadeOutMode::Single {
            return;
        }
        for i in 0..self.active.len() {
            let id = self.active[i];
            let Some(state) = self.states.get(id) else {
                continue;
            };
            if state.parent.is_some() {
                continue;
            }
            let hit = match config.fade_out_mode {
                FadeOutMode::SameLayer => state.layer == config.layer,
                FadeOutMode::SameGroup => state.group() == config.group,
                FadeOutMode::SameLayerAndGroup => {
                    state.layer == config.layer && state.group() == config.group
                }
                FadeOutMode::All => true,
                FadeOutMode::Single => false,
            };
            if hit {
                self.fade_out(id, config.fade_out_time, config.pause_fade_out);
            }
        }
    }

    /// Inserts `id` so that layers stay in descending order.
    fn insert_by_layer(&mut self, id: StateId, layer: i32) {
        let layer_of = |i: usize| {
            self.states
                .get(self.active[i])
                .map(|s| s.layer)
                .unwrap_or(i32::MIN)
        };
        let len = self.active.len();
        let mut at = None;
        for i in 0..len {
            if layer > layer_of(i) {
                at = Some(i);
                break;
            }
            if i != len - 1 && layer > layer_of(i + 1) {
                at = Some(i + 1);
                break;
            }
        }
        match at {
            Some(i) => self.active.insert(i, id),
            None => self.active.push(id),
        }
    }

    pub(crate) fn build_frame_caches(&mut self, frame_rate: f64, rig: &Rig) {
        self.caches.clear();
        if frame_rate > 0.0 {
            for (name, clip) in &self.animations {
                self.caches.insert(name.clone(), FrameCache::new(clip, frame_rate, rig));
            }
        }
        self.animation_dirty = true;
    }

    /// Advances every active state by `passed_time`.
    ///
    /// `parent_time_scale` is the parent armature's inherited scale when this
    /// armature inherits its parent's animation.
    pub(crate) fn advance_time(
        &mut self,
        passed_time: f64,
        data: &ArmatureData,
        rig: &mut Rig,
        parent_time_scale: Option<f64>,
    ) {
        let mut passed_time = passed_time.abs();
        self.inherit_time_scale = match parent_time_scale {
            Some(parent) => parent * self.time_scale,
            None => self.time_scale,
        };
        if self.inherit_time_scale != 1.0 {
            passed_time *= self.inherit_time_scale;
        }

        self.blends.reset_all();

        match self.active.len() {
            0 => rig.cache_frame_index = -1,
            1 => {
                let id = self.active[0];
                if !self.is_faded_out(id) {
                    let cache = self
                        .states
                        .get(id)
                        .and_then(|s| s.animation.as_ref())
                        .and_then(|clip| self.caches.get(&clip.name));
                    let cache_frame_rate = cache.map(|c| c.cache_frame_rate).unwrap_or(0.0);
                    if self.animation_dirty && cache_frame_rate > 0.0 {
                        self.animation_dirty = false;
                        if let Some(cache) = cache {
                            for (bone, indices) in rig.bones.iter_mut().zip(&cache.bone_indices) {
                                bone.cached_frame_indices = Some(Arc::clone(indices));
                            }
                            for (slot, indices) in rig.slots.iter_mut().zip(&cache.slot_indices) {
                                slot.cached_frame_indices = if slot.displays.is_empty() {
                                    None
                                } else {
                                    Some(Arc::clone(indices))
                                };
                            }
                        }
                    }
                    self.advance_state(id, passed_time, cache_frame_rate, data, rig);
                }
                if self.is_faded_out(id) {
                    self.recycle(id);
                    self.active.clear();
                    self.last_state = None;
                }
            }
            count => {
                let mut removed = 0;
                for i in 0..count {
                    let id = self.active[i];
                    if !self.is_faded_out(id) {
                        self.advance_state(id, passed_time, 0.0, data, rig);
                    }
                    if self.is_faded_out(id) {
                        removed += 1;
                        self.recycle(id);
                        self.animation_dirty = true;
                        if self.last_state == Some(id) {
                            self.last_state = None;
                        }
                    } else if removed > 0 {
                        self.active[i - removed] = id;
                    }
                }
                if removed > 0 {
                    self.active.truncate(count - removed);
                    if self.last_state.is_none() {
                        self.last_state = self.active.last().copied();
                    }
                    log::trace!("compacted {removed} faded-out states, {} remain", self.active.len());
                }
                rig.cache_frame_index = -1;
            }
        }
    }

    fn advance_state(
        &mut self,
        id: StateId,
        passed_time: f64,
        cache_frame_rate: f64,
        data: &ArmatureData,
        rig: &mut Rig,
    ) {
        let parent_weight = self
            .states
            .get(id)
            .and_then(|s| s.parent)
            .and_then(|p| self.states.get(p))
            .map(|p| p.weight_result)
            .unwrap_or(1.0);
        let Some(mut state) = self.states.take(id) else {
            return;
        };

        let cached_frames = if cache_frame_rate > 0.0 {
            state
                .animation
                .as_ref()
                .and_then(|clip| self.caches.get_mut(&clip.name))
                .map(|c| c.cached_frames.as_mut_slice())
        } else {
            None
        };
        let mut cx = TickContext {
            armature: data,
            rig,
            blends: &mut self.blends,
            pool: &mut self.timelines,
            cached_frames,
            nested: &mut self.nested,
            parent_weight,
            reserve: self.config.initial_timelines_per_state,
        };
        state.advance_time(passed_time, cache_frame_rate, &mut cx);

        let blend_tree = std::mem::take(&mut state.pending_blend_tree);
        let cascade = std::mem::take(&mut state.cascade_fade_out);
        self.states.restore(id, state);

        self.apply_nested(id);
        if blend_tree {
            self.update_blend_tree(id);
        }
        if cascade {
            self.cascade_fade_out(id);
        }
    }

    /// Carries out progress/weight/parameter writes queued by `parent`.
    fn apply_nested(&mut self, parent: StateId) {
        let mut writes = std::mem::take(&mut self.nested);
        for write in &writes {
            let child = match *write {
                NestedWrite::Progress { child, .. }
                | NestedWrite::Weight { child, .. }
                | NestedWrite::Parameter { child, .. } => child,
            };
            let Some(state) = self.states.get_mut(child) else {
                continue;
            };
            if state.parent != Some(parent) {
                continue;
            }
            match *write {
                NestedWrite::Progress { progress, .. } => {
                    let total = state.total_time();
                    state.set_current_time(progress * total);
                }
                NestedWrite::Weight { weight, .. } => state.set_weight(weight),
                NestedWrite::Parameter { x, y, .. } => {
                    state.parameter_x = x;
                    state.parameter_y = y;
                }
            }
        }
        writes.clear();
        self.nested = writes;
    }

    /// 1D blend tree: the nearest child at or left of `parameter_x` and the
    /// nearest child right of it share the weight by inverse distance.
    fn update_blend_tree(&mut self, parent: StateId) {
        let Some(state) = self.states.get(parent) else {
            return;
        };
        let parameter = state.parameter_x;
        let (mut left_distance, mut right_distance) = (100.0, 100.0);
        let (mut left, mut right) = (None, None);
        for child in state.child_states() {
            let Some(child_state) = self.states.get(child) else {
                continue;
            };
            let d = parameter - child_state.position_x;
            if d >= 0.0 {
                if d < left_distance {
                    left_distance = d;
                    left = Some(child);
                }
            } else if -d < right_distance {
                right_distance = -d;
                right = Some(child);
            }
        }
        let (active_a, active_b) = (state.active_child_a, state.active_child_b);

        let Some(left) = left else {
            return;
        };
        if active_a != Some(left) {
            if let Some(old) = active_a.and_then(|id| self.states.get_mut(id)) {
                old.set_weight(0.0);
            }
            if let Some(new) = self.states.get_mut(left) {
                new.activate_timelines();
            }
        }
        if active_b != right {
            if let Some(old) = active_b.and_then(|id| self.states.get_mut(id)) {
                old.set_weight(0.0);
            }
        }
        if let Some(state) = self.states.get_mut(parent) {
            state.active_child_a = Some(left);
            state.active_child_b = right;
        }

        let left_weight = right_distance / (left_distance + right_distance);
        if let Some(state) = self.states.get_mut(left) {
            state.set_weight(left_weight);
        }
        if let Some(state) = right.and_then(|id| self.states.get_mut(id)) {
            state.set_weight(1.0 - left_weight);
        }
    }
}

/// Mutable access to an armature's controller together with its rig.
pub struct AnimationControl<'a> {
    pub(crate) animation: &'a mut Animation,
    pub(crate) rig: &'a mut Rig,
    pub(crate) data: &'a ArmatureData,
}

impl Deref for AnimationControl<'_> {
    type Target = Animation;

    fn deref(&self) -> &Animation {
        self.animation
    }
}

impl DerefMut for AnimationControl<'_> {
    fn deref_mut(&mut self) -> &mut Animation {
        self.animation
    }
}

impl AnimationControl<'_> {
    /// Plays `name`, or with no name: the default clip if nothing played yet,
    /// the last state if it is paused, otherwise the last clip again.
    pub fn play(&mut self, name: Option<&str>, play_times: i32) -> Option<StateId> {
        let mut config = AnimationConfig {
            reset_to_pose: true,
            play_times,
            fade_in_time: 0.0,
            ..AnimationConfig::default()
        };

        match name.filter(|n| !n.is_empty()) {
            Some(name) => {
                config.animation = name.to_owned();
                self.play_config(&config);
            }
            None => match self.animation.last_state() {
                None => {
                    if let Some(default) = self.animation.default_animation.clone() {
                        config.animation = default;
                        self.play_config(&config);
                    }
                }
                Some(last) => {
                    let Some(state) = self.animation.states.get_mut(last) else {
                        return None;
                    };
                    if !state.is_playing() && !state.is_completed() {
                        state.play();
                    } else {
                        config.animation = state
                            .animation_data()
                            .map(|clip| clip.name.clone())
                            .unwrap_or_default();
                        self.play_config(&config);
                    }
                }
            },
        }
        self.animation.last_state()
    }

    pub fn fade_in(
        &mut self,
        name: &str,
        fade_in_time: f64,
        play_times: i32,
        layer: i32,
        group: Option<&str>,
        fade_out_mode: FadeOutMode,
    ) -> Option<StateId> {
        let config = AnimationConfig {
            fade_out_mode,
            play_times,
            layer,
            fade_in_time,
            animation: name.to_owned(),
            group: group.unwrap_or_default().to_owned(),
            ..AnimationConfig::default()
        };
        self.play_config(&config)
    }

    pub fn goto_and_play_by_time(&mut self, name: &str, time: f64, play_times: i32) -> Option<StateId> {
        let config = AnimationConfig {
            reset_to_pose: true,
            play_times,
            position: time,
            fade_in_time: 0.0,
            animation: name.to_owned(),
            ..AnimationConfig::default()
        };
        self.play_config(&config)
    }

    pub fn goto_and_play_by_frame(&mut self, name: &str, frame: u32, play_times: i32) -> Option<StateId> {
        let position = match self.animation.animations.get(name) {
            Some(clip) if clip.frame_count > 0 => {
                clip.duration * frame as f64 / clip.frame_count as f64
            }
            _ => 0.0,
        };
        self.goto_and_play_by_time(name, position, play_times)
    }

    pub fn goto_and_play_by_progress(
        &mut self,
        name: &str,
        progress: f64,
        play_times: i32,
    ) -> Option<StateId> {
        let position = match self.animation.animations.get(name) {
            Some(clip) => clip.duration * progress.max(0.0),
            None => 0.0,
        };
        self.goto_and_play_by_time(name, position, play_times)
    }

    pub fn goto_and_stop_by_time(&mut self, name: &str, time: f64) -> Option<StateId> {
        let id = self.goto_and_play_by_time(name, time, 1);
        self.stop_state(id)
    }

    pub fn goto_and_stop_by_frame(&mut self, name: &str, frame: u32) -> Option<StateId> {
        let id = self.goto_and_play_by_frame(name, frame, 1);
        self.stop_state(id)
    }

    pub fn goto_and_stop_by_progress(&mut self, name: &str, progress: f64) -> Option<StateId> {
        let id = self.goto_and_play_by_progress(name, progress, 1);
        self.stop_state(id)
    }

    fn stop_state(&mut self, id: Option<StateId>) -> Option<StateId> {
        if let Some(state) = id.and_then(|id| self.animation.states.get_mut(id)) {
            state.stop();
        }
        id
    }

    /// Like [`Self::try_play_config`], logging unknown clips instead of failing.
    pub fn play_config(&mut self, config: &AnimationConfig) -> Option<StateId> {
        match self.try_play_config(config) {
            Ok(id) => Some(id),
            Err(err) => {
                log::warn!("{err}");
                None
            }
        }
    }

    pub fn try_play_config(&mut self, config: &AnimationConfig) -> Result<StateId> {
        let clip = self
            .animation
            .animations
            .get(&config.animation)
            .cloned()
            .ok_or_else(|| AnimationError::AnimationNotFound {
                name: config.animation.clone(),
            })?;

        if config.fade_out_mode == FadeOutMode::Single {
            let reuse = self.animation.active.iter().copied().find(|id| {
                self.animation.states.get(*id).is_some_and(|s| {
                    s.fade_state != FadeState::FadingOut
                        && s.layer == config.layer
                        && s.animation.as_ref().is_some_and(|a| Arc::ptr_eq(a, &clip))
                })
            });
            if let Some(id) = reuse {
                return Ok(id);
            }
        }

        let mut config = config.clone();
        normalize(&mut config, &clip, self.animation.active.is_empty());
        self.animation.fade_out_for(&config);

        let animation = &mut *self.animation;
        let id = animation.states.acquire();
        if let Some(state) = animation.states.get_mut(id) {
            state.init(id, self.data, Arc::clone(&clip), &config, &mut animation.timelines);
        }
        animation.animation_dirty = true;
        self.rig.cache_frame_index = -1;
        animation.insert_by_layer(id, config.layer);

        for slot in &mut self.rig.slots {
            let Some(child) = slot.child_armature.as_deref_mut() else {
                continue;
            };
            if child.inherit_animation
                && child.animation().has_animation(&config.animation)
                && child.animation().get_state(&config.animation, -1).is_none()
            {
                child.animation_mut().fade_in(
                    &config.animation,
                    -1.0,
                    -1,
                    0,
                    None,
                    FadeOutMode::SameLayerAndGroup,
                );
            }
        }

        for (child_name, timelines) in &clip.animation_timelines {
            let Some(child) =
                self.fade_in(child_name, 0.0, 1, config.layer, None, FadeOutMode::Single)
            else {
                continue;
            };
            if let Some(child_state) = self.animation.states.get_mut(child) {
                child_state.action_enabled = false;
                child_state.reset_to_pose = false;
                child_state.stop();
            }
            self.add_state(id, child, timelines);

            let index = self.animation.active.iter().position(|s| *s == id);
            let child_index = self.animation.active.iter().position(|s| *s == child);
            if let (Some(index), Some(child_index)) = (index, child_index) {
                if child_index < index {
                    self.animation.active.remove(index);
                    self.animation.active.insert(child_index, id);
                }
            }
        }

        self.animation.last_state = Some(id);
        log::debug!(
            "playing '{}' on layer {} ({} active)",
            config.animation,
            config.layer,
            self.animation.active.len()
        );
        Ok(id)
    }

    /// Binds `child` under `parent` through the parent clip's timelines for it.
    pub fn add_state(&mut self, parent: StateId, child: StateId, timelines: &[crate::data::TimelineData]) {
        let animation = &mut *self.animation;
        let Some(mut parent_state) = animation.states.take(parent) else {
            return;
        };
        let position = parent_state.add_state(child, timelines, self.data, &mut animation.timelines);
        animation.states.restore(parent, parent_state);

        if let Some(child_state) = animation.states.get_mut(child) {
            if let Some((x, y)) = position {
                child_state.position_x = x;
                child_state.position_y = y;
                child_state.set_weight(0.0);
            }
            child_state.parent = Some(parent);
        }
    }

    pub fn add_bone_mask(&mut self, id: StateId, bone: &str, recursive: bool) -> Result<()> {
        self.check_bone(bone)?;
        let state = self.animation.states.get_mut(id).ok_or(AnimationError::StaleState)?;
        state.add_bone_mask(self.rig, bone, recursive);
        Ok(())
    }

    pub fn remove_bone_mask(&mut self, id: StateId, bone: &str, recursive: bool) -> Result<()> {
        self.check_bone(bone)?;
        let state = self.animation.states.get_mut(id).ok_or(AnimationError::StaleState)?;
        state.remove_bone_mask(self.rig, bone, recursive);
        Ok(())
    }

    pub fn remove_all_bone_mask(&mut self, id: StateId) {
        if let Some(state) = self.animation.states.get_mut(id) {
            state.remove_all_bone_mask();
        }
    }

    fn check_bone(&self, bone: &str) -> Result<()> {
        match self.rig.bone_index(bone) {
            Some(_) => Ok(()),
            None => Err(AnimationError::BoneNotFound {
                name: bone.to_owned(),
            }),
        }
    }

    /// Accumulator for `channel` on the bone or slot called `name`.
    pub fn get_blend_state(&self, channel: BlendChannel, name: &str) -> Option<&BlendState> {
        let target = match channel {
            BlendChannel::BoneTransform | BlendChannel::BoneAlpha => {
                BlendTarget::Bone(self.rig.bone_index(name)?)
            }
            BlendChannel::Surface => BlendTarget::Surface(self.rig.bone_index(name)?),
            BlendChannel::SlotAlpha | BlendChannel::SlotZIndex => {
                BlendTarget::Slot(self.rig.slot_index(name)?)
            }
            BlendChannel::SlotDeform => {
                let slot = self.rig.slot_index(name)?;
                let display = usize::try_from(self.rig.slots[slot].display_index).ok()?;
                BlendTarget::Display { slot, display }
            }
        };
        self.animation.blend_state(channel, target)
    }
}

/// Resolves sentinel values of a request against the clip.
fn normalize(config: &mut AnimationConfig, clip: &AnimationData, first_state: bool) {
    if first_state {
        config.fade_in_time = 0.0;
    } else if config.fade_in_time < 0.0 {
        config.fade_in_time = clip.fade_in_time;
    }
    if config.fade_out_time < 0.0 {
        config.fade_out_time = config.fade_in_time;
    }
    if config.time_scale <= -100.0 {
        config.time_scale = 1.0 / clip.scale;
    }

    if clip.frame_count > 0 {
        if config.position < 0.0 {
            config.position = clip.duration + config.position % clip.duration;
        } else if config.position == clip.duration {
            config.position -= 0.000001;
        } else if config.position > clip.duration {
            config.position %= clip.duration;
        }
        if config.duration > 0.0 && config.position + config.duration > clip.duration {
            config.duration = clip.duration - config.position;
        }
        if config.play_times < 0 {
            config.play_times = clip.play_times as i32;
        }
    } else {
        config.play_times = 1;
        config.position = 0.0;
        if config.duration > 0.0 {
            config.duration = 0.0;
        }
    }

    if config.duration == 0.0 {
        config.duration = -1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(frame_count: u32, duration: f64) -> AnimationData {
        AnimationData {
            name: "walk".into(),
            frame_rate: 24,
            frame_count,
            duration,
            play_times: 3,
            scale: 2.0,
            fade_in_time: 0.25,
            ..AnimationData::default()
        }
    }

    #[test]
    fn normalize_fills_clip_defaults() {
        let mut cfg = AnimationConfig::new("walk");
        normalize(&mut cfg, &clip(24, 1.0), false);
        assert_eq!(cfg.play_times, 3);
        assert_eq!(cfg.fade_in_time, 0.25);
        assert_eq!(cfg.fade_out_time, 0.25);
        assert_eq!(cfg.time_scale, 0.5);
        assert_eq!(cfg.duration, -1.0);
    }

    #[test]
    fn first_state_never_fades_in() {
        let mut cfg = AnimationConfig::new("walk");
        cfg.fade_in_time = 0.4;
        normalize(&mut cfg, &clip(24, 1.0), true);
        assert_eq!(cfg.fade_in_time, 0.0);
    }

    #[test]
    fn positions_wrap_into_clip() {
        let mut cfg = AnimationConfig::new("walk");
        cfg.position = 1.0;
        normalize(&mut cfg, &clip(24, 1.0), false);
        assert!(cfg.position < 1.0 && cfg.position > 0.999);

        let mut cfg = AnimationConfig::new("walk");
        cfg.position = 2.25;
        normalize(&mut cfg, &clip(24, 1.0), false);
        assert!((cfg.position - 0.25).abs() < 1e-12);

        let mut cfg = AnimationConfig::new("walk");
        cfg.position = -0.25;
        normalize(&mut cfg, &clip(24, 1.0), false);
        assert!((cfg.position - 0.75).abs() < 1e-12);
    }

    #[test]
    fn window_is_clamped_to_clip_end() {
        let mut cfg = AnimationConfig::new("walk");
        cfg.position = 0.5;
        cfg.duration = 2.0;
        normalize(&mut cfg, &clip(24, 1.0), false);
        assert!((cfg.duration - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_clips_play_once_at_zero() {
        let mut cfg = AnimationConfig::new("walk");
        cfg.position = 0.3;
        cfg.duration = 0.5;
        cfg.play_times = 0;
        normalize(&mut cfg, &clip(0, 0.0), false);
        assert_eq!(cfg.play_times, 1);
        assert_eq!(cfg.position, 0.0);
        assert_eq!(cfg.duration, -1.0);
    }
}
