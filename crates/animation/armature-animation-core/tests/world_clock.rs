mod common;

use armature_animation_core::{Armature, WorldClock};
use common::{approx, biped};

#[test]
fn clock_steps_registered_armatures() {
    let mut clock = WorldClock::new(0.0);
    let id = clock.add(Box::new(biped()));
    clock
        .get_mut::<Armature>(id)
        .expect("armature entry")
        .animation_mut()
        .play(Some("idle"), -1);

    clock.advance_time(0.25);
    let armature = clock.get::<Armature>(id).unwrap();
    approx(armature.bone("root").unwrap().animation_pose.y, 5.0, 1e-6);
    approx(clock.time, 0.25, 1e-12);
}

#[test]
fn nested_clock_scales_compound() {
    let mut inner = WorldClock::new(0.0);
    inner.time_scale = 2.0;
    let armature = inner.add(Box::new(biped()));
    inner
        .get_mut::<Armature>(armature)
        .unwrap()
        .animation_mut()
        .play(Some("idle"), -1);

    let mut outer = WorldClock::new(0.0);
    outer.time_scale = 0.5;
    let inner_id = outer.add(Box::new(inner));
    outer.advance_time(0.25);

    let inner = outer.get::<WorldClock>(inner_id).unwrap();
    let armature = inner.get::<Armature>(armature).unwrap();
    let idle = armature.animation().last_state().unwrap();
    approx(armature.animation().state(idle).unwrap().current_time(), 0.25, 1e-9);
}

#[test]
fn removed_armature_is_no_longer_stepped() {
    let mut clock = WorldClock::default();
    let keep = clock.add(Box::new(biped()));
    let gone = clock.add(Box::new(biped()));
    for id in [keep, gone] {
        clock.get_mut::<Armature>(id).unwrap().animation_mut().play(Some("idle"), -1);
    }

    let mut removed = clock.remove(gone).expect("registered");
    clock.advance_time(0.25);
    assert_eq!(clock.len(), 1);
    assert!(clock.get::<Armature>(gone).is_none());

    let removed = removed
        .as_any_mut()
        .downcast_mut::<Armature>()
        .expect("armature");
    approx(removed.bone("root").unwrap().animation_pose.y, 0.0, 1e-9);
    let kept = clock.get::<Armature>(keep).unwrap();
    approx(kept.bone("root").unwrap().animation_pose.y, 5.0, 1e-6);
}
