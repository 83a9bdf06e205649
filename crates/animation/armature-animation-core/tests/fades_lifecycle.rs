mod common;

use armature_animation_core::{EventKind, FadeOutMode, FadeState};
use common::{approx, biped, drain, kinds};

#[test]
fn crossfade_runs_both_fades_and_recycles_the_old_state() {
    let mut armature = biped();
    let idle = armature.animation_mut().play(Some("idle"), -1).unwrap();
    armature.advance_time(0.1);

    for kind in [
        EventKind::FadeIn,
        EventKind::FadeInComplete,
        EventKind::FadeOut,
        EventKind::FadeOutComplete,
    ] {
        armature.events_mut().add_listener(kind);
    }

    let walk = armature
        .animation_mut()
        .fade_in("walk", 0.5, -1, 0, None, FadeOutMode::All)
        .unwrap();
    assert!(armature.animation().state(idle).unwrap().is_fade_out());

    armature.advance_time(0.25);
    {
        let animation = armature.animation();
        approx(animation.state(idle).unwrap().fade_progress(), 0.5, 1e-9);
        approx(animation.state(walk).unwrap().fade_progress(), 0.5, 1e-9);
        // Playhead is held until the fade-in completes.
        approx(animation.state(walk).unwrap().current_time(), 0.0, 1e-9);
    }
    let events = drain(&mut armature);
    assert_eq!(kinds(&events), [EventKind::FadeOut, EventKind::FadeIn]);
    assert_eq!(events[0].state, Some(idle));
    assert_eq!(&*events[1].animation, "walk");

    armature.advance_time(0.3);
    let animation = armature.animation();
    assert!(animation.state(idle).is_none(), "faded-out state is recycled");
    assert_eq!(animation.states(), [walk]);
    let walk_state = animation.state(walk).unwrap();
    assert_eq!(walk_state.fade_state(), FadeState::Complete);
    approx(walk_state.fade_progress(), 1.0, 1e-12);
    approx(walk_state.current_time(), 0.3, 1e-9);
    assert_eq!(animation.last_animation_name(), Some("walk"));

    let events = drain(&mut armature);
    assert_eq!(
        kinds(&events),
        [EventKind::FadeOutComplete, EventKind::FadeInComplete]
    );

    // Only walk contributed with full weight on the final tick.
    approx(armature.bone("root").unwrap().animation_pose.x, 10.0, 1e-6);
}

#[test]
fn zero_fade_out_states_are_compacted_in_order() {
    let mut armature = biped();
    let mut animation = armature.animation_mut();
    let idle = animation.fade_in("idle", 0.0, -1, 0, None, FadeOutMode::Single).unwrap();
    let walk = animation.fade_in("walk", 0.0, -1, 1, None, FadeOutMode::Single).unwrap();
    let wave = animation.fade_in("wave", 0.0, -1, 2, None, FadeOutMode::Single).unwrap();
    let fx = animation.fade_in("fx", 0.0, -1, 3, None, FadeOutMode::Single).unwrap();
    assert_eq!(animation.states(), [fx, wave, walk, idle]);

    assert!(animation.fade_out(wave, 0.0, true));
    assert!(animation.fade_out(idle, 0.0, true));
    armature.advance_time(0.1);

    let animation = armature.animation();
    assert_eq!(animation.states(), [fx, walk]);
    assert!(animation.state(wave).is_none());
    assert!(animation.state(idle).is_none());
}

#[test]
fn fade_out_scales_with_current_progress() {
    let mut armature = biped();
    let idle = armature.animation_mut().play(Some("idle"), -1).unwrap();
    let walk = armature
        .animation_mut()
        .fade_in("walk", 0.4, -1, 1, None, FadeOutMode::Single)
        .unwrap();
    armature.advance_time(0.1);

    // Walk is a quarter of the way in; fading out over 0.2 keeps the rate.
    let mut animation = armature.animation_mut();
    approx(animation.state(walk).unwrap().fade_progress(), 0.25, 1e-9);
    assert!(animation.fade_out(walk, 0.2, true));
    let state = animation.state(walk).unwrap();
    approx(state.fade_total_time, 0.8, 1e-9);
    assert!(state.is_fade_out());

    armature.advance_time(0.1);
    approx(
        armature.animation().state(walk).unwrap().fade_progress(),
        0.125,
        1e-9,
    );
    armature.advance_time(0.15);
    assert!(armature.animation().state(walk).is_none());
    assert_eq!(armature.animation().states(), [idle]);
}

#[test]
fn stale_ids_are_rejected_after_recycling() {
    let mut armature = biped();
    let idle = armature.animation_mut().play(Some("idle"), -1).unwrap();
    armature.animation_mut().play(Some("walk"), -1).unwrap();
    armature.advance_time(0.1);

    let mut animation = armature.animation_mut();
    assert!(animation.state(idle).is_none());
    assert!(!animation.fade_out(idle, 0.1, true));
    let err = animation.add_bone_mask(idle, "root", false).unwrap_err();
    assert!(matches!(err, armature_animation_core::AnimationError::StaleState));

    // The slot is reused by the next request under a new generation.
    let wave = animation.play(Some("wave"), -1).unwrap();
    assert_ne!(wave, idle);
}

#[test]
fn reset_recycles_everything() {
    let mut armature = biped();
    let mut animation = armature.animation_mut();
    animation.play(Some("idle"), -1);
    animation.fade_in("walk", 0.2, -1, 1, None, FadeOutMode::Single);
    animation.reset();
    assert!(animation.states().is_empty());
    assert!(animation.last_state().is_none());
    armature.advance_time(0.1);
    assert_eq!(armature.rig().cache_frame_index, -1);
}
