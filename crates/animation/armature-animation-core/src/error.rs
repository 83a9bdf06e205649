//! Error types for armature construction and playback requests.

/// Errors raised while building armatures, encoding clips, or resolving playback requests.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AnimationError {
    /// Clip name not present on the armature.
    #[error("Animation not found: {name}")]
    AnimationNotFound { name: String },

    /// Bone name not present on the armature.
    #[error("Bone not found: {name}")]
    BoneNotFound { name: String },

    /// Slot name not present on the armature.
    #[error("Slot not found: {name}")]
    SlotNotFound { name: String },

    /// A surface timeline targets a bone that carries no control mesh.
    #[error("Surface timeline in animation '{animation}' targets bone '{bone}', which is not a surface")]
    NotASurface { animation: String, bone: String },

    /// State handle outlived its state.
    #[error("Animation state was recycled")]
    StaleState,

    /// Static armature model is inconsistent (dangling parent, duplicate names, ...).
    #[error("Invalid armature data: {reason}")]
    InvalidArmature { reason: String },

    /// Authored clip description could not be encoded.
    #[error("Invalid clip '{name}': {reason}")]
    InvalidClip { name: String, reason: String },
}

impl AnimationError {
    /// Whether the caller can keep using the armature after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnimationError::AnimationNotFound { .. }
                | AnimationError::BoneNotFound { .. }
                | AnimationError::SlotNotFound { .. }
                | AnimationError::StaleState
        )
    }

    pub fn category(&self) -> &'static str {
        match self {
            AnimationError::AnimationNotFound { .. } | AnimationError::StaleState => "request",
            AnimationError::BoneNotFound { .. } | AnimationError::SlotNotFound { .. } => "lookup",
            AnimationError::NotASurface { .. } | AnimationError::InvalidArmature { .. } => "data",
            AnimationError::InvalidClip { .. } => "authoring",
        }
    }
}

pub type Result<T> = core::result::Result<T, AnimationError>;
