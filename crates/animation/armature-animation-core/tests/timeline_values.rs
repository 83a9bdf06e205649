mod common;

use armature_animation_core::{AnimationConfig, AnimationError, BlendChannel};
use common::{approx, biped};

#[test]
fn looping_clip_tweens_last_key_back_to_first() {
    let mut armature = biped();
    armature.animation_mut().play(Some("idle"), -1);

    armature.advance_time(0.25);
    approx(armature.bone("root").unwrap().animation_pose.y, 5.0, 1e-6);

    // Past the last key (frame 5, y = 10) the tween heads back to y = 0.
    armature.advance_time(0.5);
    approx(armature.bone("root").unwrap().animation_pose.y, 5.0, 1e-6);

    // Second loop.
    armature.advance_time(0.5);
    approx(armature.bone("root").unwrap().animation_pose.y, 5.0, 1e-6);
    let state = armature
        .animation()
        .get_state("idle", -1)
        .and_then(|id| armature.animation().state(id))
        .unwrap();
    assert_eq!(state.current_play_times(), 1);
    approx(state.current_time(), 0.25, 1e-9);
}

#[test]
fn finite_clip_steps_on_last_key() {
    let mut armature = biped();
    armature.animation_mut().play(Some("wave"), -1);

    armature.advance_time(0.25);
    approx(armature.bone("arm").unwrap().alpha, 0.5, 1e-6);

    armature.advance_time(0.5);
    approx(armature.bone("arm").unwrap().alpha, 1.0, 1e-6);

    armature.advance_time(1.0);
    let animation = armature.animation();
    let wave = animation.state(animation.states()[0]).unwrap();
    assert!(wave.is_completed());
    assert!(!wave.is_playing());
    assert!(animation.is_completed());
    approx(armature.bone("arm").unwrap().alpha, 1.0, 1e-6);
}

#[test]
fn slot_and_constraint_tracks_reach_their_targets() {
    let mut armature = biped();
    armature.animation_mut().play(Some("fx"), -1);
    armature.advance_time(0.6);

    let body = armature.slot("body").unwrap();
    assert_eq!(body.display_index, 1);
    assert_eq!(body.current_geometry(), Some(7));
    approx(body.color_transform.alpha_multiplier, 0.5, 1e-6);
    approx(body.color_transform.red_multiplier, 1.0, 1e-6);
    approx(body.alpha, 0.5, 1e-6);
    assert_eq!(body.z_index, 3);

    let mesh = &body.displays[1].deform_vertices;
    assert_eq!(mesh.len(), 8);
    for (i, v) in mesh.iter().enumerate() {
        approx(*v, (i + 1) as f64, 1e-6);
    }

    let cape = &armature.bone("cape").unwrap().deform_vertices;
    assert_eq!(cape.len(), 8);
    for (i, v) in cape.iter().enumerate() {
        approx(*v, 0.5 * (i + 1) as f64, 1e-6);
    }

    let aim = armature.constraint("aim").unwrap();
    assert!(!aim.bend_positive);
    approx(aim.weight, 0.25, 1e-9);

    // z_index 3 sends body to the back of the draw order.
    assert_eq!(armature.draw_order(), [1, 2, 0]);

    let animation = armature.animation_mut();
    assert!(animation.get_blend_state(BlendChannel::SlotDeform, "body").is_some());
    assert!(animation.get_blend_state(BlendChannel::Surface, "cape").is_some());
}

#[test]
fn z_order_track_reorders_slots() {
    let mut armature = biped();
    armature.animation_mut().play(Some("shuffle"), -1);
    armature.advance_time(0.1);
    assert_eq!(armature.draw_order(), [2, 0, 1]);
    assert_eq!(armature.slot("boot").unwrap().z_order, 0);
}

#[test]
fn goto_and_stop_holds_the_pose() {
    let mut armature = biped();
    let id = armature
        .animation_mut()
        .goto_and_stop_by_progress("idle", 0.25)
        .unwrap();
    armature.advance_time(0.0);
    approx(armature.bone("root").unwrap().animation_pose.y, 5.0, 1e-6);

    armature.advance_time(0.2);
    let state = armature.animation().state(id).unwrap();
    assert!(!state.is_playing());
    approx(state.current_time(), 0.25, 1e-9);
    approx(armature.bone("root").unwrap().animation_pose.y, 5.0, 1e-6);
}

#[test]
fn scrubbing_re_evaluates_bone_timelines() {
    let mut armature = biped();
    let id = armature.animation_mut().play(Some("idle"), -1).unwrap();
    armature.advance_time(0.1);
    approx(armature.bone("root").unwrap().animation_pose.y, 2.0, 1e-6);

    let mut animation = armature.animation_mut();
    let state = animation.state_mut(id).unwrap();
    state.stop();
    state.set_current_time(0.5);
    armature.advance_time(0.0);
    approx(armature.bone("root").unwrap().animation_pose.y, 10.0, 1e-6);
    assert_eq!(
        armature.animation().state(id).map(|s| s.is_playing()),
        Some(false)
    );
}

#[test]
fn unknown_clip_is_an_error_not_a_state() {
    let mut armature = biped();
    let mut animation = armature.animation_mut();
    assert!(animation.play(Some("missing"), -1).is_none());
    let err = animation
        .try_play_config(&AnimationConfig::new("missing"))
        .unwrap_err();
    assert!(matches!(
        err,
        AnimationError::AnimationNotFound { ref name } if name == "missing"
    ));
    assert!(animation.states().is_empty());
}
