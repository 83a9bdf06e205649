mod common;

use armature_animation_core::{AnimationConfig, AnimationError};
use common::{approx, biped};

#[test]
fn recursive_add_and_remove_follow_the_hierarchy() {
    let mut armature = biped();
    let mut animation = armature.animation_mut();
    let id = animation.play(Some("walk"), -1).unwrap();

    animation.add_bone_mask(id, "torso", true).unwrap();
    let mask = animation.state(id).unwrap().bone_mask().to_vec();
    assert_eq!(mask, ["torso", "arm", "cape"]);

    animation.remove_bone_mask(id, "arm", false).unwrap();
    assert_eq!(animation.state(id).unwrap().bone_mask(), ["torso", "cape"]);

    animation.remove_bone_mask(id, "torso", true).unwrap();
    assert!(animation.state(id).unwrap().bone_mask().is_empty());

    // Removing from an empty mask (everything) keeps every bone outside the subtree.
    animation.remove_bone_mask(id, "torso", true).unwrap();
    assert_eq!(animation.state(id).unwrap().bone_mask(), ["root", "hip", "leg"]);

    animation.remove_all_bone_mask(id);
    let state = animation.state(id).unwrap();
    assert!(state.bone_mask().is_empty());
    assert!(state.contains_bone_mask("cape"));
}

#[test]
fn unknown_bones_are_rejected() {
    let mut armature = biped();
    let mut animation = armature.animation_mut();
    let id = animation.play(Some("walk"), -1).unwrap();
    let err = animation.add_bone_mask(id, "tail", true).unwrap_err();
    assert!(matches!(err, AnimationError::BoneNotFound { ref name } if name == "tail"));
    assert!(animation.state(id).unwrap().bone_mask().is_empty());
}

#[test]
fn masked_state_only_drives_masked_bones() {
    let mut armature = biped();
    let mut animation = armature.animation_mut();
    let id = animation.play(Some("walk"), -1).unwrap();
    animation.add_bone_mask(id, "hip", true).unwrap();
    armature.advance_time(0.1);

    approx(armature.bone("root").unwrap().animation_pose.x, 0.0, 1e-9);
    approx(
        armature.bone("leg").unwrap().animation_pose.rotation,
        30f64.to_radians(),
        1e-5,
    );
    // Pose fallbacks are dropped once the fade-in completes; leg rotate remains.
    assert_eq!(armature.animation().state(id).unwrap().timeline_count(), 1);
}

#[test]
fn mask_set_before_first_tick_still_resolves_constraints() {
    let mut armature = biped();
    let mut animation = armature.animation_mut();
    let id = animation.play(Some("fx"), -1).unwrap();
    animation.add_bone_mask(id, "cape", false).unwrap();
    armature.advance_time(0.1);

    let aim = armature.constraint("aim").unwrap();
    assert!(!aim.bend_positive);
    approx(aim.weight, 0.25, 1e-9);
    // body hangs off torso, which is masked out.
    assert_eq!(armature.slot("body").unwrap().display_index, 0);
}

#[test]
fn mask_change_after_start_resolves_again() {
    let mut armature = biped();
    let id = armature.animation_mut().play(Some("walk"), -1).unwrap();
    armature.advance_time(0.1);
    approx(armature.bone("root").unwrap().animation_pose.x, 10.0, 1e-6);
    let full = armature.animation().state(id).unwrap().timeline_count();

    assert_eq!(full, 2);

    // hip has no keys of its own: only a pose fallback is built for it.
    armature.animation_mut().add_bone_mask(id, "hip", false).unwrap();
    armature.advance_time(0.1);
    let masked = armature.animation().state(id).unwrap().timeline_count();
    assert_eq!(masked, 1);
    approx(armature.bone("hip").unwrap().animation_pose.x, 0.0, 1e-9);
}

#[test]
fn request_mask_splits_bones_between_layers() {
    let mut armature = biped();
    let mut animation = armature.animation_mut();
    animation.play(Some("idle"), -1);
    let config = AnimationConfig {
        layer: 1,
        fade_in_time: 0.0,
        fade_out_mode: armature_animation_core::FadeOutMode::SameLayer,
        bone_mask: vec!["leg".into()],
        ..AnimationConfig::new("walk")
    };
    animation.try_play_config(&config).unwrap();
    armature.advance_time(0.25);

    // Root is left to idle, leg to walk.
    let root = armature.bone("root").unwrap().animation_pose;
    approx(root.x, 0.0, 1e-9);
    approx(root.y, 5.0, 1e-6);
    approx(
        armature.bone("leg").unwrap().animation_pose.rotation,
        30f64.to_radians(),
        1e-5,
    );
}
