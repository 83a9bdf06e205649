mod common;

use armature_animation_core::FadeOutMode;
use common::{approx, biped};

#[test]
fn single_state_marks_its_frame_bucket() {
    let mut armature = biped();
    armature.set_cache_frame_rate(10.0);
    armature.animation_mut().play(Some("idle"), -1);
    armature.advance_time(0.25);

    assert_eq!(armature.rig().cache_frame_index, 2);
    let cache = armature.animation().frame_cache("idle").expect("idle cache");
    assert_eq!(cache.cache_frame_rate, 10.0);
    assert!(cache.cached_frames[2]);
    assert!(!cache.cached_frames[3]);
    approx(armature.bone("root").unwrap().animation_pose.y, 5.0, 1e-6);
}

#[test]
fn second_active_state_disables_caching() {
    let mut armature = biped();
    armature.set_cache_frame_rate(10.0);
    armature.animation_mut().play(Some("idle"), -1);
    armature.advance_time(0.1);
    assert_eq!(armature.rig().cache_frame_index, 1);

    armature
        .animation_mut()
        .fade_in("walk", 0.2, -1, 1, None, FadeOutMode::Single)
        .unwrap();
    armature.advance_time(0.1);
    assert_eq!(armature.rig().cache_frame_index, -1);
}

#[test]
fn zero_rate_drops_caches() {
    let mut armature = biped();
    armature.set_cache_frame_rate(10.0);
    assert!(armature.animation().frame_cache("walk").is_some());
    armature.set_cache_frame_rate(0.0);
    assert!(armature.animation().frame_cache("walk").is_none());

    armature.animation_mut().play(Some("idle"), -1);
    armature.advance_time(0.25);
    assert_eq!(armature.rig().cache_frame_index, -1);
}
