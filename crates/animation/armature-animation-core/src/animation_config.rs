#![allow(dead_code)]
//! Playback request value bag.

use serde::{Deserialize, Serialize};

/// Which playing states a new request fades out.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FadeOutMode {
    /// Fade nothing out; reuse a live state on the same layer playing the same clip.
    Single,
    SameLayer,
    SameGroup,
    SameLayerAndGroup,
    #[default]
    All,
}

/// One play/fade-in request. Negative sentinel values mean "use the clip default".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub pause_fade_out: bool,
    pub fade_out_mode: FadeOutMode,
    /// Seconds; < 0 uses the fade-in time.
    pub fade_out_time: f64,

    pub action_enabled: bool,
    pub additive: bool,
    pub display_control: bool,
    pub pause_fade_in: bool,
    pub reset_to_pose: bool,
    /// < 0 uses the clip default, 0 loops forever.
    pub play_times: i32,
    pub layer: i32,
    /// Start position in seconds.
    pub position: f64,
    /// Playable window in seconds; < 0 plays to the clip end, 0 freezes at `position`.
    pub duration: f64,
    /// <= -100 uses `1 / clip.scale`.
    pub time_scale: f64,
    pub weight: f64,
    /// Seconds; < 0 uses the clip default.
    pub fade_in_time: f64,
    /// Seconds; < 0 disables auto fade-out on completion.
    pub auto_fade_out_time: f64,

    /// State name; empty uses `animation`.
    pub name: String,
    pub animation: String,
    pub group: String,
    pub bone_mask: Vec<String>,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            pause_fade_out: true,
            fade_out_mode: FadeOutMode::All,
            fade_out_time: -1.0,
            action_enabled: true,
            additive: false,
            display_control: true,
            pause_fade_in: true,
            reset_to_pose: true,
            play_times: -1,
            layer: 0,
            position: 0.0,
            duration: -1.0,
            time_scale: -100.0,
            weight: 1.0,
            fade_in_time: -1.0,
            auto_fade_out_time: -1.0,
            name: String::new(),
            animation: String::new(),
            group: String::new(),
            bone_mask: Vec::new(),
        }
    }
}

impl AnimationConfig {
    pub fn new(animation: impl Into<String>) -> Self {
        Self {
            animation: animation.into(),
            ..Self::default()
        }
    }

    /// Resets every field while keeping the bone-mask allocation.
    pub fn clear(&mut self) {
        let mut mask = std::mem::take(&mut self.bone_mask);
        mask.clear();
        *self = Self {
            bone_mask: mask,
            ..Self::default()
        };
    }

    /// State name this request resolves to.
    pub fn state_name(&self) -> &str {
        if self.name.is_empty() {
            &self.animation
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_sentinels() {
        let cfg = AnimationConfig::new("walk");
        assert_eq!(cfg.fade_out_mode, FadeOutMode::All);
        assert_eq!(cfg.play_times, -1);
        assert!(cfg.time_scale <= -100.0);
        assert_eq!(cfg.state_name(), "walk");
    }

    #[test]
    fn deserializes_partial_json() {
        let cfg: AnimationConfig =
            serde_json::from_str(r#"{"animation":"run","layer":2,"fade_out_mode":"SameLayer"}"#)
                .unwrap();
        assert_eq!(cfg.layer, 2);
        assert_eq!(cfg.fade_out_mode, FadeOutMode::SameLayer);
        assert!(cfg.reset_to_pose);
    }

    #[test]
    fn clear_restores_defaults() {
        let mut cfg = AnimationConfig::new("x");
        cfg.bone_mask.push("arm".into());
        cfg.layer = 3;
        cfg.clear();
        assert_eq!(cfg, AnimationConfig::default());
    }
}
