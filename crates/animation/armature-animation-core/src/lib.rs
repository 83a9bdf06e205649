#![allow(dead_code)]
//! Armature Animation Core (engine-agnostic)
//!
//! Layered blending runtime for 2D skeletal animation. Clips are encoded
//! once into shared frame arrays ([`data`]); each [`Armature`] owns a rig of
//! pose targets and an [`Animation`] controller that plays any number of
//! fading, layered, masked and nested clips against it. Everything a tick
//! needs is pooled, so steady-state stepping does not allocate.

pub mod animation;
pub mod animation_config;
pub mod armature;
pub mod blend_state;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod ids;
pub mod pool;
pub mod state;
pub mod timeline;
pub mod tween;
pub mod world_clock;

// Re-exports for hosts
pub use animation::{Animation, AnimationControl, FrameCache};
pub use animation_config::{AnimationConfig, FadeOutMode};
pub use armature::rig::{Bone, DisplayFrame, IkConstraint, Rig, Slot, Transform};
pub use armature::Armature;
pub use blend_state::{BlendChannel, BlendState, BlendTarget};
pub use config::Config;
pub use data::{
    AnimationData, ArmatureData, BlendType, BoneData, BoneKind, ClipBuilder, ClipSpec, SlotData,
};
pub use error::{AnimationError, Result};
pub use events::{EventKind, EventObject, EventQueue};
pub use ids::{BlendId, ClockId, StateId};
pub use state::{AnimationState, FadeState, PlayState, Playhead, SubFadeState};
pub use world_clock::{Animatable, SystemTimeSource, TimeSource, WorldClock};
