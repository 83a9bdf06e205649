#![allow(dead_code)]

use anyhow::Context;
use armature_animation_core::{Armature, ArmatureData, ClipSpec, EventKind, EventObject};

/// Biped fixture armature with every biped clip encoded.
pub fn load_biped_data() -> anyhow::Result<ArmatureData> {
    let mut data: ArmatureData = armature_test_fixtures::armatures::load("biped")?;
    let clips: Vec<ClipSpec> = armature_test_fixtures::clips::load("biped")?;
    data.add_clips(&clips).context("encode biped clips")?;
    Ok(data)
}

pub fn biped_data() -> ArmatureData {
    load_biped_data().expect("load biped fixture")
}

pub fn biped() -> Armature {
    Armature::new(biped_data()).expect("build biped armature")
}

pub fn approx(a: f64, b: f64, eps: f64) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

pub fn drain(armature: &mut Armature) -> Vec<EventObject> {
    armature.events_mut().drain().collect()
}

pub fn kinds(events: &[EventObject]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}
