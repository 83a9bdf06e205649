mod common;

use armature_animation_core::{AnimationConfig, Armature, ClipSpec, FadeOutMode};
use common::{approx, biped, biped_data, load_biped_data};
use serde_json::json;

#[test]
fn loop_then_fade_out_and_recycle() {
    let mut armature = biped();
    let walk = armature.animation_mut().play(Some("walk"), -1).unwrap();

    armature.advance_time(1.5);
    {
        let state = armature.animation().state(walk).unwrap();
        assert_eq!(state.current_play_times(), 1);
        approx(state.current_time(), 0.5, 1e-9);
    }

    assert!(armature.animation_mut().fade_out(walk, 0.2, true));
    armature.advance_time(0.1);
    approx(
        armature.animation().state(walk).unwrap().fade_progress(),
        0.5,
        1e-9,
    );

    armature.advance_time(0.2);
    assert!(armature.animation().get_state("walk", -1).is_none());
    assert!(armature.animation().states().is_empty());
}

#[test]
fn rotation_keys_across_the_seam_take_the_short_way() {
    let mut data = biped_data();
    let spin: ClipSpec = serde_json::from_value(json!({
        "name": "spin",
        "frame_count": 10,
        "play_times": 1,
        "bones": {
            "arm": {
                "rotate": {
                    "keys": [
                        { "duration": 5, "value": [179.0, 0.0] },
                        { "duration": 5, "value": [-179.0, 0.0] }
                    ]
                }
            }
        }
    }))
    .unwrap();
    data.add_clips(&[spin]).unwrap();

    let mut armature = Armature::new(data).unwrap();
    armature.animation_mut().play(Some("spin"), -1);
    armature.advance_time(0.2);
    approx(
        armature.bone("arm").unwrap().animation_pose.rotation,
        179.8f64.to_radians(),
        1e-4,
    );
}

#[test]
fn unkeyed_bones_return_to_pose_after_crossfade() {
    let mut armature = biped();
    armature.animation_mut().play(Some("walk"), -1);
    armature.advance_time(0.1);
    approx(
        armature.bone("leg").unwrap().animation_pose.rotation,
        30f64.to_radians(),
        1e-5,
    );

    armature
        .animation_mut()
        .fade_in("idle", 0.2, -1, 0, None, FadeOutMode::All)
        .unwrap();
    armature.advance_time(0.1);
    let halfway = armature.bone("leg").unwrap().animation_pose.rotation;
    assert!(halfway > 0.0 && halfway < 30f64.to_radians());

    armature.advance_time(0.2);
    approx(armature.bone("leg").unwrap().animation_pose.rotation, 0.0, 1e-9);
    approx(armature.bone("root").unwrap().animation_pose.x, 0.0, 1e-9);
}

#[test]
fn play_without_name_uses_default_then_resumes() {
    let mut armature = biped();
    let idle = armature.animation_mut().play(None, -1).unwrap();
    assert_eq!(armature.animation().state(idle).unwrap().name(), "idle");
    armature.advance_time(0.1);

    armature.animation_mut().stop(None);
    armature.advance_time(0.1);
    approx(armature.animation().state(idle).unwrap().current_time(), 0.1, 1e-9);

    assert_eq!(armature.animation_mut().play(None, -1), Some(idle));
    armature.advance_time(0.1);
    approx(armature.animation().state(idle).unwrap().current_time(), 0.2, 1e-9);
}

#[test]
fn clip_scale_only_sets_the_default_time_scale() -> anyhow::Result<()> {
    let mut data = load_biped_data()?;
    let slow: ClipSpec = serde_json::from_value(json!({
        "name": "slow",
        "frame_count": 10,
        "play_times": 0,
        "scale": 2.0
    }))?;
    data.add_clips(&[slow])?;
    let mut armature = Armature::new(data)?;

    let default = armature.animation_mut().try_play_config(&AnimationConfig::new("slow"))?;
    approx(armature.animation().state(default).unwrap().time_scale, 0.5, 1e-12);
    armature.advance_time(0.25);
    approx(armature.animation().state(default).unwrap().current_time(), 0.125, 1e-9);

    let explicit = AnimationConfig {
        time_scale: 1.0,
        fade_in_time: 0.0,
        ..AnimationConfig::new("slow")
    };
    let id = armature.animation_mut().try_play_config(&explicit)?;
    armature.advance_time(0.25);
    let state = armature.animation().state(id).unwrap();
    approx(state.time_scale, 1.0, 1e-12);
    approx(state.current_time(), 0.25, 1e-9);
    Ok(())
}

#[test]
fn looping_transform_track_wraps_back_the_short_way() -> anyhow::Result<()> {
    let mut data = load_biped_data()?;
    let sway: ClipSpec = serde_json::from_value(json!({
        "name": "sway",
        "frame_count": 10,
        "play_times": 0,
        "bones": {
            "arm": {
                "all": {
                    "keys": [
                        { "duration": 5, "value": { "rotation": 179.0 } },
                        { "duration": 5, "value": { "rotation": -179.0 } }
                    ]
                }
            }
        }
    }))?;
    data.add_clips(&[sway])?;
    let mut armature = Armature::new(data)?;
    armature.animation_mut().play(Some("sway"), -1);

    // Last key (181 deg after unwrapping) heads back to 179 deg.
    armature.advance_time(0.7);
    let rotation = armature.bone("arm").unwrap().animation_pose.rotation;
    let expected = 180.2f64.to_radians();
    approx(rotation.sin(), expected.sin(), 1e-4);
    approx(rotation.cos(), expected.cos(), 1e-4);
    Ok(())
}
