mod common;

use armature_animation_core::{AnimationConfig, EventKind};
use common::{approx, biped, drain, kinds};

fn listen(armature: &mut armature_animation_core::Armature, list: &[EventKind]) {
    for kind in list {
        armature.events_mut().add_listener(*kind);
    }
}

#[test]
fn forward_walk_fires_each_keyframe_once() {
    let mut armature = biped();
    listen(
        &mut armature,
        &[
            EventKind::Start,
            EventKind::FrameEvent,
            EventKind::LoopComplete,
            EventKind::Complete,
        ],
    );
    let wave = armature.animation_mut().play(Some("wave"), -1).unwrap();

    armature.advance_time(0.3);
    let events = drain(&mut armature);
    assert_eq!(kinds(&events), [EventKind::Start, EventKind::SoundEvent]);
    assert_eq!(events[1].name(), Some("whoosh"));
    assert_eq!(events[1].state, Some(wave));

    armature.advance_time(0.3);
    let events = drain(&mut armature);
    assert_eq!(kinds(&events), [EventKind::FrameEvent]);
    assert_eq!(events[0].name(), Some("hit"));
    approx(events[0].time, 0.5, 1e-9);
    let data = events[0].action.as_ref().and_then(|a| a.data.as_ref()).unwrap();
    assert_eq!(data["damage"], 3);

    armature.advance_time(0.5);
    let events = drain(&mut armature);
    assert_eq!(kinds(&events), [EventKind::LoopComplete, EventKind::Complete]);

    // Nothing more once completed.
    armature.advance_time(0.5);
    assert!(drain(&mut armature).is_empty());
}

#[test]
fn frame_events_need_a_listener_but_sounds_do_not() {
    let mut armature = biped();
    armature.animation_mut().play(Some("wave"), -1);
    armature.advance_time(0.6);
    let events = drain(&mut armature);
    assert_eq!(kinds(&events), [EventKind::SoundEvent]);
}

#[test]
fn reverse_walk_visits_keys_backwards() {
    let mut armature = biped();
    listen(&mut armature, &[EventKind::FrameEvent, EventKind::Complete]);
    let config = AnimationConfig {
        time_scale: -1.0,
        play_times: 1,
        ..AnimationConfig::new("wave")
    };
    let id = armature.animation_mut().try_play_config(&config).unwrap();
    approx(
        armature.animation().state(id).unwrap().current_time(),
        1.000001,
        1e-12,
    );

    armature.advance_time(0.3);
    assert!(drain(&mut armature).is_empty());
    approx(
        armature.animation().state(id).unwrap().current_time(),
        0.699999,
        1e-9,
    );

    armature.advance_time(0.3);
    let events = drain(&mut armature);
    assert_eq!(kinds(&events), [EventKind::FrameEvent]);
    assert_eq!(events[0].name(), Some("hit"));

    armature.advance_time(0.5);
    let events = drain(&mut armature);
    assert_eq!(kinds(&events), [EventKind::Complete]);
}

#[test]
fn play_action_starts_the_named_clip() {
    let mut armature = biped();
    let shoot = armature.animation_mut().play(Some("shoot"), -1).unwrap();

    armature.advance_time(0.1);
    assert!(armature.animation().get_state("wave", -1).is_none());

    armature.advance_time(0.2);
    let wave = armature
        .animation()
        .get_state("wave", -1)
        .expect("play action fades in wave");
    assert_eq!(armature.animation().last_state(), Some(wave));
    assert!(armature.animation().state(shoot).unwrap().is_fade_out());

    armature.advance_time(0.1);
    assert_eq!(armature.animation().states(), [wave]);
}

#[test]
fn disabled_actions_stay_silent() {
    let mut armature = biped();
    listen(&mut armature, &[EventKind::Start, EventKind::FrameEvent]);
    let config = AnimationConfig {
        action_enabled: false,
        ..AnimationConfig::new("wave")
    };
    armature.animation_mut().try_play_config(&config).unwrap();
    armature.advance_time(0.3);
    armature.advance_time(0.3);
    assert!(drain(&mut armature).is_empty());
}
