mod common;

use armature_animation_core::{BlendChannel, FadeOutMode};
use common::{approx, biped};

#[test]
fn upper_layer_claims_weight_and_lower_layer_adds_the_rest() {
    let mut armature = biped();
    let mut animation = armature.animation_mut();
    animation.play(Some("idle"), -1).expect("idle state");
    let walk = animation
        .fade_in("walk", 0.0, -1, 1, None, FadeOutMode::SameLayer)
        .expect("walk state");
    animation.state_mut(walk).unwrap().set_weight(0.5);
    assert_eq!(animation.states().len(), 2);

    armature.advance_time(0.25);

    // walk (layer 1): 10 * 0.5; idle (layer 0) gets the remaining half of its tween value 5.
    let root = armature.bone("root").unwrap().animation_pose;
    approx(root.x, 5.0, 1e-6);
    approx(root.y, 2.5, 1e-6);

    // Leg is only keyed by walk; idle's pose fallback adds nothing.
    let leg = armature.bone("leg").unwrap().animation_pose;
    approx(leg.rotation, 15f64.to_radians(), 1e-5);
    approx(leg.scale_x, 1.0, 1e-9);

    let animation = armature.animation_mut();
    let blend = animation
        .get_blend_state(BlendChannel::BoneTransform, "root")
        .expect("root accumulator");
    assert_eq!(blend.dirty, 2);
    assert_eq!(blend.layer, 0);
    approx(blend.blend_weight, 0.5, 1e-9);
}

#[test]
fn states_are_ordered_by_descending_layer() {
    let mut armature = biped();
    let mut animation = armature.animation_mut();
    for (name, layer) in [("idle", 0), ("fx", 3), ("walk", 1), ("wave", 2)] {
        animation.fade_in(name, 0.0, -1, layer, None, FadeOutMode::Single);
    }
    let names: Vec<String> = animation
        .states()
        .iter()
        .map(|id| animation.state(*id).unwrap().name().to_owned())
        .collect();
    assert_eq!(names, ["fx", "wave", "walk", "idle"]);
}

#[test]
fn single_mode_reuses_live_state_on_same_layer() {
    let mut armature = biped();
    let mut animation = armature.animation_mut();
    let first = animation
        .fade_in("walk", 0.0, -1, 0, None, FadeOutMode::Single)
        .unwrap();
    let again = animation
        .fade_in("walk", 0.0, -1, 0, None, FadeOutMode::Single)
        .unwrap();
    assert_eq!(first, again);
    let other_layer = animation
        .fade_in("walk", 0.0, -1, 1, None, FadeOutMode::Single)
        .unwrap();
    assert_ne!(first, other_layer);
    assert_eq!(animation.states().len(), 2);
}

#[test]
fn second_state_on_same_layer_adds_its_full_weight() {
    let mut armature = biped();
    let mut animation = armature.animation_mut();
    let walk = animation.play(Some("walk"), -1).unwrap();
    let again = animation
        .fade_in("walk", 0.0, -1, 0, Some("extra"), FadeOutMode::SameGroup)
        .unwrap();
    assert_ne!(walk, again);
    animation.state_mut(walk).unwrap().set_weight(0.25);
    animation.state_mut(again).unwrap().set_weight(0.25);

    armature.advance_time(0.1);

    // Same layer: both contribute with their full weight.
    let root = armature.bone("root").unwrap().animation_pose;
    approx(root.x, 5.0, 1e-6);
}
