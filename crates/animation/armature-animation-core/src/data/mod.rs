//! Static data consumed by the runtime: the armature model and decoded clips.
//!
//! Clips keep their keyframes in a handful of flat numeric arrays shared by
//! every clip built together ([`FrameArrays`]). Each timeline is described by
//! a header in `timeline`; see [`offsets`] for the word layout.

pub mod builder;

use std::sync::Arc;

use hashbrown::HashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use builder::{
    ActionFrameSpec, BoneTracks, ChildClipSpec, ClipBuilder, ClipSpec, ColorKey, DeformTrackSpec,
    IkKey, KeySpec, SlotTracks, TrackSpec, TransformKey, TweenSpec, ZOrderKey,
};

/// Word offsets inside a timeline header and inside deform headers.
pub mod offsets {
    pub const TIMELINE_SCALE: usize = 0;
    pub const TIMELINE_OFFSET: usize = 1;
    pub const TIMELINE_KEY_FRAME_COUNT: usize = 2;
    pub const TIMELINE_FRAME_VALUE_COUNT: usize = 3;
    pub const TIMELINE_FRAME_VALUE_OFFSET: usize = 4;
    pub const TIMELINE_FRAME_OFFSET: usize = 5;

    pub const DEFORM_GEOMETRY_OFFSET: usize = 0;
    pub const DEFORM_COUNT: usize = 1;
    pub const DEFORM_VALUE_COUNT: usize = 2;
    pub const DEFORM_VALUE_OFFSET: usize = 3;
    pub const DEFORM_FLOAT_OFFSET: usize = 4;

    pub const FRAME_POSITION: usize = 0;
    pub const FRAME_TWEEN_TYPE: usize = 1;
    pub const FRAME_TWEEN_EASING_OR_CURVE_SAMPLE_COUNT: usize = 2;
    pub const FRAME_CURVE_SAMPLES: usize = 3;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TweenType {
    #[default]
    None,
    Line,
    Curve,
    QuadIn,
    QuadOut,
    QuadInOut,
}

impl TweenType {
    pub fn to_raw(self) -> i16 {
        match self {
            TweenType::None => 0,
            TweenType::Line => 1,
            TweenType::Curve => 2,
            TweenType::QuadIn => 3,
            TweenType::QuadOut => 4,
            TweenType::QuadInOut => 5,
        }
    }

    pub fn from_raw(raw: i16) -> Self {
        match raw {
            1 => TweenType::Line,
            2 => TweenType::Curve,
            3 => TweenType::QuadIn,
            4 => TweenType::QuadOut,
            5 => TweenType::QuadInOut,
            _ => TweenType::None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimelineKind {
    #[default]
    Action,
    ZOrder,

    BoneAll,
    BoneTranslate,
    BoneRotate,
    BoneScale,
    BoneAlpha,
    Surface,

    SlotDisplay,
    SlotColor,
    SlotDeform,
    SlotZIndex,
    SlotAlpha,

    IkConstraint,

    AnimationProgress,
    AnimationWeight,
    AnimationParameter,
}

/// How a parent state mixes its declared child clips.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendType {
    #[default]
    None,
    /// One-dimensional blend tree driven by `parameter_x`.
    E1D,
}

/// One timeline of one clip: a kind tag plus the offset of its header in
/// [`FrameArrays::timeline`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimelineData {
    pub kind: TimelineKind,
    pub offset: usize,
    /// Start of the bucket-to-keyframe table; `None` for single-key timelines.
    pub frame_indices_offset: Option<usize>,
    /// Blend-tree position of a child clip (animation timelines only).
    pub x: f64,
    pub y: f64,
}

/// Flat sample storage shared by every clip encoded together.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameArrays {
    pub frame: Vec<i16>,
    pub frame_int: Vec<i32>,
    pub frame_float: Vec<f32>,
    pub color: Vec<i16>,
    pub timeline: Vec<i32>,
    pub frame_indices: Vec<u32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    #[default]
    Play,
    Frame,
    Sound,
}

/// An action attached to an action keyframe.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionData {
    pub kind: ActionKind,
    /// Clip to play, event name, or sound name.
    pub name: String,
    pub bone: Option<String>,
    pub slot: Option<String>,
    pub data: Option<serde_json::Value>,
}

/// A decoded clip. Immutable once built and shared by every state playing it.
#[derive(Clone, Debug, Default)]
pub struct AnimationData {
    pub name: String,
    pub frame_rate: u32,
    pub frame_count: u32,
    /// Seconds.
    pub duration: f64,
    /// 0 loops forever.
    pub play_times: u32,
    pub scale: f64,
    pub fade_in_time: f64,
    pub blend_type: BlendType,

    pub frame_offset: usize,
    pub frame_int_offset: usize,
    pub frame_float_offset: usize,
    pub arrays: Arc<FrameArrays>,
    pub actions: Vec<Arc<ActionData>>,

    pub action_timeline: Option<TimelineData>,
    pub z_order_timeline: Option<TimelineData>,
    pub bone_timelines: HashMap<String, Vec<TimelineData>>,
    pub slot_timelines: HashMap<String, Vec<TimelineData>>,
    pub constraint_timelines: HashMap<String, Vec<TimelineData>>,
    /// Child clips blended under this one, in declaration order.
    pub animation_timelines: IndexMap<String, Vec<TimelineData>>,
}

impl AnimationData {
    pub fn bone_timelines(&self, name: &str) -> Option<&[TimelineData]> {
        self.bone_timelines.get(name).map(Vec::as_slice)
    }

    pub fn slot_timelines(&self, name: &str) -> Option<&[TimelineData]> {
        self.slot_timelines.get(name).map(Vec::as_slice)
    }

    pub fn constraint_timelines(&self, name: &str) -> Option<&[TimelineData]> {
        self.constraint_timelines.get(name).map(Vec::as_slice)
    }

    /// Header word `slot` of `timeline`.
    #[inline]
    pub(crate) fn header(&self, timeline: &TimelineData, slot: usize) -> i32 {
        self.arrays
            .timeline
            .get(timeline.offset + slot)
            .copied()
            .unwrap_or(0)
    }

    /// Absolute position in `frame` of keyframe `index` of `timeline`.
    #[inline]
    pub(crate) fn frame_position_of(&self, timeline: &TimelineData, index: usize) -> usize {
        self.frame_offset + self.header(timeline, offsets::TIMELINE_FRAME_OFFSET + index) as usize
    }

    /// Keyframe index covering time bucket `bucket`.
    pub(crate) fn key_frame_at(&self, timeline: &TimelineData, bucket: i64) -> usize {
        let Some(start) = timeline.frame_indices_offset else {
            return 0;
        };
        let bucket = bucket.clamp(0, self.frame_count as i64) as usize;
        self.arrays
            .frame_indices
            .get(start + bucket)
            .copied()
            .unwrap_or(0) as usize
    }

    #[inline]
    pub(crate) fn frame(&self, index: usize) -> i16 {
        self.arrays.frame.get(index).copied().unwrap_or(0)
    }
}

/// Straight RGBA color transform: multipliers in 0..=1, offsets in 0..=255.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorTransform {
    pub alpha_multiplier: f64,
    pub red_multiplier: f64,
    pub green_multiplier: f64,
    pub blue_multiplier: f64,
    pub alpha_offset: i32,
    pub red_offset: i32,
    pub green_offset: i32,
    pub blue_offset: i32,
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self {
            alpha_multiplier: 1.0,
            red_multiplier: 1.0,
            green_multiplier: 1.0,
            blue_multiplier: 1.0,
            alpha_offset: 0,
            red_offset: 0,
            green_offset: 0,
            blue_offset: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoneKind {
    #[default]
    Bone,
    /// Free-form deformation lattice with `(segment_x + 1) * (segment_y + 1)` control points.
    Surface { segment_x: usize, segment_y: usize },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<String>,
    pub kind: BoneKind,
}

impl BoneData {
    /// Length of the surface control-point buffer (x/y pairs).
    pub fn deform_count(&self) -> usize {
        match self.kind {
            BoneKind::Bone => 0,
            BoneKind::Surface {
                segment_x,
                segment_y,
            } => (segment_x + 1) * (segment_y + 1) * 2,
        }
    }
}

/// Mesh geometry referenced by deform timelines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryData {
    /// Identity of the geometry in the shared vertex store.
    pub offset: u32,
    pub vertex_count: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayData {
    pub name: String,
    pub geometry: Option<GeometryData>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotData {
    pub name: String,
    /// Owning bone name.
    pub parent: String,
    pub display_index: i32,
    pub z_index: i32,
    pub color: ColorTransform,
    pub displays: Vec<DisplayData>,
}

impl Default for SlotData {
    fn default() -> Self {
        Self {
            name: String::new(),
            parent: String::new(),
            display_index: 0,
            z_index: 0,
            color: ColorTransform::default(),
            displays: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IkConstraintData {
    pub name: String,
    pub bend_positive: bool,
    pub weight: f64,
}

impl Default for IkConstraintData {
    fn default() -> Self {
        Self {
            name: String::new(),
            bend_positive: true,
            weight: 1.0,
        }
    }
}

/// Static armature model. Bones are listed parents-first; slots in default
/// draw order.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmatureData {
    pub name: String,
    pub frame_rate: u32,
    pub scale: f64,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    pub constraints: Vec<IkConstraintData>,
    pub default_animation: Option<String>,
    #[serde(skip)]
    pub animations: IndexMap<String, Arc<AnimationData>>,
}

impl Default for ArmatureData {
    fn default() -> Self {
        Self {
            name: String::new(),
            frame_rate: 24,
            scale: 1.0,
            bones: Vec::new(),
            slots: Vec::new(),
            constraints: Vec::new(),
            default_animation: None,
            animations: IndexMap::new(),
        }
    }
}

impl ArmatureData {
    pub fn add_animation(&mut self, animation: AnimationData) {
        if self.default_animation.is_none() {
            self.default_animation = Some(animation.name.clone());
        }
        self.animations
            .insert(animation.name.clone(), Arc::new(animation));
    }

    /// Encodes `clips` at the armature frame rate and registers them.
    pub fn add_clips(&mut self, clips: &[ClipSpec]) -> crate::Result<()> {
        let mut builder = ClipBuilder::new(self.frame_rate);
        for clip in clips {
            builder.add(clip)?;
        }
        for animation in builder.build() {
            self.add_animation(animation);
        }
        Ok(())
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    pub fn animation(&self, name: &str) -> Option<&Arc<AnimationData>> {
        self.animations.get(name)
    }
}
