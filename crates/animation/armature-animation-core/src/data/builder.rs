//! Encodes authored clip descriptions into [`FrameArrays`].
//!
//! Durations are in frames at the armature frame rate. Rotations and skews
//! are authored in degrees and stored in radians; successive rotation keys
//! are unwrapped onto the shortest arc.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{
    offsets, ActionData, AnimationData, BlendType, ColorTransform, FrameArrays, TimelineData,
    TimelineKind, TweenType,
};
use crate::error::{AnimationError, Result};
use crate::tween::normalize_radian;

/// Interpolation toward the next key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TweenSpec {
    None,
    #[default]
    Linear,
    QuadIn(f64),
    QuadOut(f64),
    QuadInOut(f64),
    /// Interior samples of the eased progress at evenly spaced points
    /// `i / (n + 1)`; the endpoints 0 and 1 are implied.
    Curve(Vec<f64>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeySpec<V> {
    /// Frames until the next key. Ignored for the last key, which runs to the clip end.
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub tween: TweenSpec,
    pub value: V,
}

impl<V> KeySpec<V> {
    pub fn new(duration: u32, value: V) -> Self {
        Self {
            duration,
            tween: TweenSpec::Linear,
            value,
        }
    }

    pub fn with_tween(mut self, tween: TweenSpec) -> Self {
        self.tween = tween;
        self
    }
}

fn one() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackSpec<V> {
    /// Playback-speed multiplier relative to the owning state.
    #[serde(default = "one")]
    pub scale: f64,
    /// Start offset as a fraction of the clip duration.
    #[serde(default)]
    pub offset: f64,
    pub keys: Vec<KeySpec<V>>,
}

impl<V> TrackSpec<V> {
    pub fn new(keys: Vec<KeySpec<V>>) -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
            keys,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformKey {
    pub x: f64,
    pub y: f64,
    /// Degrees.
    pub rotation: f64,
    /// Degrees.
    pub skew: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for TransformKey {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            skew: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IkKey {
    pub bend_positive: bool,
    pub weight: f64,
}

pub type ColorKey = ColorTransform;

/// Vertex-offset track for a mesh display or a surface bone.
///
/// Every key carries the full `vertex_count` buffer; only the window
/// `[value_offset, value_offset + value_count)` is stored per key, the rest is
/// taken once from the first key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeformTrackSpec {
    /// Geometry of the targeted display. Unused for surfaces.
    #[serde(default)]
    pub geometry: u32,
    pub vertex_count: usize,
    #[serde(default)]
    pub value_offset: usize,
    #[serde(default)]
    pub value_count: Option<usize>,
    #[serde(default = "one")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
    pub keys: Vec<KeySpec<Vec<f64>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoneTracks {
    pub all: Option<TrackSpec<TransformKey>>,
    /// `[x, y]`.
    pub translate: Option<TrackSpec<[f64; 2]>>,
    /// `[rotation, skew]` in degrees.
    pub rotate: Option<TrackSpec<[f64; 2]>>,
    pub scale: Option<TrackSpec<[f64; 2]>>,
    pub alpha: Option<TrackSpec<f64>>,
    pub surface: Option<DeformTrackSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotTracks {
    /// Display index per key; never tweened.
    pub display: Option<TrackSpec<i32>>,
    pub color: Option<TrackSpec<ColorKey>>,
    pub deform: Vec<DeformTrackSpec>,
    pub z_index: Option<TrackSpec<i32>>,
    pub alpha: Option<TrackSpec<f64>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionFrameSpec {
    pub frame: u32,
    pub actions: Vec<ActionData>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZOrderKey {
    pub duration: u32,
    /// Data-order slot index for each draw position; `None` restores data order.
    pub order: Option<Vec<i16>>,
}

/// A child clip blended under the parent clip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildClipSpec {
    pub x: f64,
    pub y: f64,
    /// Normalized playhead of the child (0..=1).
    pub progress: Option<TrackSpec<f64>>,
    pub weight: Option<TrackSpec<f64>>,
    pub parameter: Option<TrackSpec<[f64; 2]>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipSpec {
    pub name: String,
    pub frame_count: u32,
    /// 0 loops forever.
    pub play_times: u32,
    pub scale: f64,
    /// Seconds.
    pub fade_in_time: f64,
    pub blend_type: BlendType,
    pub bones: IndexMap<String, BoneTracks>,
    pub slots: IndexMap<String, SlotTracks>,
    pub constraints: IndexMap<String, TrackSpec<IkKey>>,
    pub actions: Vec<ActionFrameSpec>,
    pub z_order: Option<Vec<ZOrderKey>>,
    pub children: IndexMap<String, ChildClipSpec>,
}

impl Default for ClipSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            frame_count: 0,
            play_times: 1,
            scale: 1.0,
            fade_in_time: 0.0,
            blend_type: BlendType::None,
            bones: IndexMap::new(),
            slots: IndexMap::new(),
            constraints: IndexMap::new(),
            actions: Vec::new(),
            z_order: None,
            children: IndexMap::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameValues {
    Step,
    Int,
    Float,
}

/// Per-key header data handed to the encoder; the value is written by a closure.
struct KeyHeader<'a> {
    duration: u32,
    tween: Option<&'a TweenSpec>,
}

/// Accumulates clips into one shared [`FrameArrays`].
#[derive(Debug)]
pub struct ClipBuilder {
    frame_rate: u32,
    arrays: FrameArrays,
    clips: Vec<AnimationData>,
}

impl ClipBuilder {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            frame_rate: frame_rate.max(1),
            arrays: FrameArrays::default(),
            clips: Vec::new(),
        }
    }

    pub fn add(&mut self, spec: &ClipSpec) -> Result<&mut Self> {
        if spec.name.is_empty() {
            return Err(invalid(spec, "clip name is empty"));
        }
        if self.clips.iter().any(|c| c.name == spec.name) {
            return Err(invalid(spec, "duplicate clip name"));
        }

        let mut clip = AnimationData {
            name: spec.name.clone(),
            frame_rate: self.frame_rate,
            frame_count: spec.frame_count,
            duration: spec.frame_count as f64 / self.frame_rate as f64,
            play_times: spec.play_times,
            scale: if spec.scale > 0.0 { spec.scale } else { 1.0 },
            fade_in_time: spec.fade_in_time,
            blend_type: spec.blend_type,
            frame_offset: self.arrays.frame.len(),
            frame_int_offset: self.arrays.frame_int.len(),
            frame_float_offset: self.arrays.frame_float.len(),
            ..AnimationData::default()
        };

        let mut enc = Encoder {
            arrays: &mut self.arrays,
            frame_count: spec.frame_count,
            frame_offset: clip.frame_offset,
            frame_int_offset: clip.frame_int_offset,
            frame_float_offset: clip.frame_float_offset,
        };

        enc.encode_actions(spec, &mut clip);
        if let Some(keys) = &spec.z_order {
            let headers: Vec<_> = keys
                .iter()
                .map(|k| KeyHeader {
                    duration: k.duration,
                    tween: None,
                })
                .collect();
            clip.z_order_timeline = enc.timeline(
                TimelineKind::ZOrder,
                1.0,
                0.0,
                &headers,
                FrameValues::Step,
                0,
                |arrays, i, pos| {
                    arrays.frame.push(pos);
                    match &keys[i].order {
                        Some(order) => {
                            arrays.frame.push(order.len() as i16);
                            arrays.frame.extend_from_slice(order);
                        }
                        None => arrays.frame.push(0),
                    }
                },
            );
        }

        for (bone, tracks) in &spec.bones {
            let mut list = Vec::new();
            if let Some(track) = &tracks.all {
                let mut prev_rotation = 0.0;
                list.extend(enc.tweened(TimelineKind::BoneAll, track, FrameValues::Float, 6, |arrays, i, key| {
                    let mut rotation = key.rotation.to_radians();
                    if i > 0 {
                        rotation = prev_rotation + normalize_radian(rotation - prev_rotation);
                    }
                    prev_rotation = rotation;
                    arrays.frame_float.extend_from_slice(&[
                        key.x as f32,
                        key.y as f32,
                        rotation as f32,
                        normalize_radian(key.skew.to_radians()) as f32,
                        key.scale_x as f32,
                        key.scale_y as f32,
                    ]);
                }));
            }
            if let Some(track) = &tracks.translate {
                list.extend(enc.tweened(TimelineKind::BoneTranslate, track, FrameValues::Float, 2, |arrays, _, v| {
                    arrays.frame_float.extend_from_slice(&[v[0] as f32, v[1] as f32]);
                }));
            }
            if let Some(track) = &tracks.rotate {
                let mut prev_rotation = 0.0;
                list.extend(enc.tweened(TimelineKind::BoneRotate, track, FrameValues::Float, 2, |arrays, i, v| {
                    let mut rotation = v[0].to_radians();
                    if i > 0 {
                        rotation = prev_rotation + normalize_radian(rotation - prev_rotation);
                    }
                    prev_rotation = rotation;
                    arrays.frame_float.extend_from_slice(&[
                        rotation as f32,
                        normalize_radian(v[1].to_radians()) as f32,
                    ]);
                }));
            }
            if let Some(track) = &tracks.scale {
                list.extend(enc.tweened(TimelineKind::BoneScale, track, FrameValues::Float, 2, |arrays, _, v| {
                    arrays.frame_float.extend_from_slice(&[v[0] as f32, v[1] as f32]);
                }));
            }
            if let Some(track) = &tracks.alpha {
                list.extend(enc.tweened(TimelineKind::BoneAlpha, track, FrameValues::Int, 1, |arrays, _, v| {
                    arrays.frame_int.push((v * 100.0).round() as i32);
                }));
            }
            if let Some(track) = &tracks.surface {
                list.extend(enc.deform(spec, TimelineKind::Surface, track, -1)?);
            }
            if !list.is_empty() {
                clip.bone_timelines.insert(bone.clone(), list);
            }
        }

        for (slot, tracks) in &spec.slots {
            let mut list = Vec::new();
            if let Some(track) = &tracks.display {
                let headers: Vec<_> = track
                    .keys
                    .iter()
                    .map(|k| KeyHeader {
                        duration: k.duration,
                        tween: None,
                    })
                    .collect();
                list.extend(enc.timeline(
                    TimelineKind::SlotDisplay,
                    track.scale,
                    track.offset,
                    &headers,
                    FrameValues::Step,
                    0,
                    |arrays, i, pos| {
                        arrays.frame.push(pos);
                        arrays.frame.push(track.keys[i].value as i16);
                    },
                ));
            }
            if let Some(track) = &tracks.color {
                list.extend(enc.tweened(TimelineKind::SlotColor, track, FrameValues::Int, 1, |arrays, _, c| {
                    arrays.frame_int.push(arrays.color.len() as i32);
                    arrays.color.extend_from_slice(&[
                        (c.alpha_multiplier * 100.0).round() as i16,
                        (c.red_multiplier * 100.0).round() as i16,
                        (c.green_multiplier * 100.0).round() as i16,
                        (c.blue_multiplier * 100.0).round() as i16,
                        c.alpha_offset as i16,
                        c.red_offset as i16,
                        c.green_offset as i16,
                        c.blue_offset as i16,
                    ]);
                }));
            }
            for track in &tracks.deform {
                list.extend(enc.deform(spec, TimelineKind::SlotDeform, track, track.geometry as i32)?);
            }
            if let Some(track) = &tracks.z_index {
                list.extend(enc.tweened(TimelineKind::SlotZIndex, track, FrameValues::Int, 1, |arrays, _, v| {
                    arrays.frame_int.push(*v);
                }));
            }
            if let Some(track) = &tracks.alpha {
                list.extend(enc.tweened(TimelineKind::SlotAlpha, track, FrameValues::Int, 1, |arrays, _, v| {
                    arrays.frame_int.push((v * 100.0).round() as i32);
                }));
            }
            if !list.is_empty() {
                clip.slot_timelines.insert(slot.clone(), list);
            }
        }

        for (constraint, track) in &spec.constraints {
            let timeline = enc.tweened(TimelineKind::IkConstraint, track, FrameValues::Int, 2, |arrays, _, k| {
                arrays.frame_int.push(if k.bend_positive { 100 } else { 0 });
                arrays.frame_int.push((k.weight * 100.0).round() as i32);
            });
            if let Some(timeline) = timeline {
                clip.constraint_timelines.insert(constraint.clone(), vec![timeline]);
            }
        }

        for (child, child_spec) in &spec.children {
            let mut list = Vec::new();
            if let Some(track) = &child_spec.progress {
                list.extend(enc.tweened(TimelineKind::AnimationProgress, track, FrameValues::Int, 1, |arrays, _, v| {
                    arrays.frame_int.push((v * 10000.0).round() as i32);
                }));
            }
            if let Some(track) = &child_spec.weight {
                list.extend(enc.tweened(TimelineKind::AnimationWeight, track, FrameValues::Int, 1, |arrays, _, v| {
                    arrays.frame_int.push((v * 10000.0).round() as i32);
                }));
            }
            if let Some(track) = &child_spec.parameter {
                list.extend(enc.tweened(TimelineKind::AnimationParameter, track, FrameValues::Int, 2, |arrays, _, v| {
                    arrays.frame_int.push((v[0] * 10000.0).round() as i32);
                    arrays.frame_int.push((v[1] * 10000.0).round() as i32);
                }));
            }
            for timeline in &mut list {
                timeline.x = child_spec.x;
                timeline.y = child_spec.y;
            }
            clip.animation_timelines.insert(child.clone(), list);
        }

        self.clips.push(clip);
        Ok(self)
    }

    /// Finalizes the shared arrays and hands out the clips in insertion order.
    pub fn build(self) -> Vec<AnimationData> {
        let arrays = Arc::new(self.arrays);
        self.clips
            .into_iter()
            .map(|mut clip| {
                clip.arrays = Arc::clone(&arrays);
                clip
            })
            .collect()
    }
}

fn invalid(spec: &ClipSpec, reason: &str) -> AnimationError {
    AnimationError::InvalidClip {
        name: spec.name.clone(),
        reason: reason.to_string(),
    }
}

struct Encoder<'a> {
    arrays: &'a mut FrameArrays,
    frame_count: u32,
    frame_offset: usize,
    frame_int_offset: usize,
    frame_float_offset: usize,
}

impl Encoder<'_> {
    /// Writes one timeline header plus its keyframes.
    ///
    /// `write_frame(arrays, key_index, position)` must append the frame record
    /// (starting with `position`) and any value words for that key.
    #[allow(clippy::too_many_arguments)]
    fn timeline(
        &mut self,
        kind: TimelineKind,
        scale: f64,
        offset: f64,
        keys: &[KeyHeader<'_>],
        values: FrameValues,
        value_count: usize,
        mut write_frame: impl FnMut(&mut FrameArrays, usize, i16),
    ) -> Option<TimelineData> {
        if keys.is_empty() {
            return None;
        }
        let key_count = keys.len();
        let header = self.arrays.timeline.len();
        let frame_value_offset = match values {
            FrameValues::Step => 0,
            FrameValues::Int => self.arrays.frame_int.len() - self.frame_int_offset,
            FrameValues::Float => self.arrays.frame_float.len() - self.frame_float_offset,
        };
        self.arrays.timeline.extend_from_slice(&[
            (scale * 100.0).round() as i32,
            (offset * 100.0).round() as i32,
            key_count as i32,
            value_count as i32,
            frame_value_offset as i32,
        ]);
        self.arrays
            .timeline
            .resize(header + offsets::TIMELINE_FRAME_OFFSET + key_count, 0);

        let total = self.frame_count as usize + 1;
        let frame_indices_offset = if key_count == 1 {
            None
        } else {
            let start = self.arrays.frame_indices.len();
            self.arrays.frame_indices.resize(start + total, 0);
            Some(start)
        };

        let mut key = 0usize;
        let mut frame_start = 0usize;
        let mut frame_len = 0usize;
        for i in 0..total {
            if frame_start + frame_len <= i && key < key_count {
                frame_start = i;
                frame_len = if key == key_count - 1 {
                    self.frame_count as usize - i.min(self.frame_count as usize)
                } else {
                    keys[key].duration as usize
                };

                let frame_position = self.arrays.frame.len();
                self.arrays.timeline[header + offsets::TIMELINE_FRAME_OFFSET + key] =
                    (frame_position - self.frame_offset) as i32;
                match keys[key].tween {
                    Some(tween) => {
                        self.tween_frame(frame_start as i16, frame_len, tween);
                        write_frame(&mut *self.arrays, key, frame_start as i16);
                    }
                    None => write_frame(&mut *self.arrays, key, frame_start as i16),
                }
                key += 1;
            }
            if let Some(start) = frame_indices_offset {
                self.arrays.frame_indices[start + i] = (key - 1) as u32;
            }
        }

        Some(TimelineData {
            kind,
            offset: header,
            frame_indices_offset,
            x: 0.0,
            y: 0.0,
        })
    }

    fn tween_frame(&mut self, position: i16, frame_len: usize, tween: &TweenSpec) {
        let frame = &mut self.arrays.frame;
        frame.push(position);
        if frame_len == 0 {
            frame.push(TweenType::None.to_raw());
            return;
        }
        match tween {
            TweenSpec::None => frame.push(TweenType::None.to_raw()),
            TweenSpec::Linear => frame.push(TweenType::Line.to_raw()),
            TweenSpec::QuadIn(e) => {
                frame.extend_from_slice(&[TweenType::QuadIn.to_raw(), (e * 100.0).round() as i16])
            }
            TweenSpec::QuadOut(e) => {
                frame.extend_from_slice(&[TweenType::QuadOut.to_raw(), (e * 100.0).round() as i16])
            }
            TweenSpec::QuadInOut(e) => frame
                .extend_from_slice(&[TweenType::QuadInOut.to_raw(), (e * 100.0).round() as i16]),
            TweenSpec::Curve(samples) if samples.is_empty() => {
                frame.push(TweenType::Line.to_raw())
            }
            TweenSpec::Curve(samples) => {
                frame.push(TweenType::Curve.to_raw());
                frame.push(samples.len() as i16);
                frame.extend(
                    samples
                        .iter()
                        .map(|s| (s.clamp(0.0, 1.0) * 10000.0).round() as i16),
                );
            }
        }
    }

    /// Tween frames followed by `value_count` values per key.
    fn tweened<V>(
        &mut self,
        kind: TimelineKind,
        track: &TrackSpec<V>,
        values: FrameValues,
        value_count: usize,
        mut write_value: impl FnMut(&mut FrameArrays, usize, &V),
    ) -> Option<TimelineData> {
        let headers: Vec<_> = track
            .keys
            .iter()
            .map(|k| KeyHeader {
                duration: k.duration,
                tween: Some(&k.tween),
            })
            .collect();
        self.timeline(
            kind,
            track.scale,
            track.offset,
            &headers,
            values,
            value_count,
            |arrays, i, _| write_value(arrays, i, &track.keys[i].value),
        )
    }

    fn deform(
        &mut self,
        spec: &ClipSpec,
        kind: TimelineKind,
        track: &DeformTrackSpec,
        geometry: i32,
    ) -> Result<Option<TimelineData>> {
        let vertex_count = track.vertex_count;
        let value_offset = track.value_offset;
        let value_count = track.value_count.unwrap_or(vertex_count - value_offset.min(vertex_count));
        if value_offset + value_count > vertex_count {
            return Err(invalid(spec, "deform window exceeds vertex count"));
        }
        if track.keys.iter().any(|k| k.value.len() != vertex_count) {
            return Err(invalid(spec, "deform key length differs from vertex count"));
        }

        let end = value_offset + value_count;
        let timeline = self.tweened(kind, &TrackSpec {
            scale: track.scale,
            offset: track.offset,
            keys: track
                .keys
                .iter()
                .map(|k| KeySpec {
                    duration: k.duration,
                    tween: k.tween.clone(),
                    value: &k.value[value_offset..end],
                })
                .collect(),
        }, FrameValues::Float, 0, |arrays, _, window| {
            arrays.frame_float.extend(window.iter().map(|v| *v as f32));
        });
        let Some(timeline) = timeline else {
            return Ok(None);
        };

        let same_value_offset = self.arrays.frame_float.len() - self.frame_float_offset;
        if let Some(first) = track.keys.first() {
            let outside = first.value[..value_offset]
                .iter()
                .chain(&first.value[end..])
                .map(|v| *v as f32);
            self.arrays.frame_float.extend(outside);
        }

        let deform_header = self.arrays.frame_int.len();
        self.arrays.frame_int.extend_from_slice(&[
            geometry,
            vertex_count as i32,
            value_count as i32,
            value_offset as i32,
            same_value_offset as i32,
        ]);
        self.arrays.timeline[timeline.offset + offsets::TIMELINE_FRAME_VALUE_COUNT] =
            (deform_header - self.frame_int_offset) as i32;
        Ok(Some(timeline))
    }

    fn encode_actions(&mut self, spec: &ClipSpec, clip: &mut AnimationData) {
        if spec.actions.iter().all(|f| f.actions.is_empty()) {
            return;
        }

        // Merge by frame, keep frame 0 present so the first key starts the clip.
        let mut frames: Vec<(u32, Vec<usize>)> = vec![(0, Vec::new())];
        let mut sorted: Vec<&ActionFrameSpec> = spec.actions.iter().collect();
        sorted.sort_by_key(|f| f.frame);
        for frame in sorted {
            let at = frame.frame.min(spec.frame_count);
            let mut indices = Vec::with_capacity(frame.actions.len());
            for action in &frame.actions {
                indices.push(clip.actions.len());
                clip.actions.push(Arc::new(action.clone()));
            }
            match frames.iter_mut().find(|(f, _)| *f == at) {
                Some((_, existing)) => existing.extend(indices),
                None => frames.push((at, indices)),
            }
        }

        let headers: Vec<_> = frames
            .iter()
            .enumerate()
            .map(|(i, (at, _))| KeyHeader {
                duration: frames.get(i + 1).map(|(next, _)| next - at).unwrap_or(0),
                tween: None,
            })
            .collect();
        clip.action_timeline = self.timeline(
            TimelineKind::Action,
            1.0,
            0.0,
            &headers,
            FrameValues::Step,
            0,
            |arrays, i, pos| {
                let indices = &frames[i].1;
                arrays.frame.push(pos);
                arrays.frame.push(indices.len() as i16);
                arrays.frame.extend(indices.iter().map(|a| *a as i16));
            },
        );
    }
}
