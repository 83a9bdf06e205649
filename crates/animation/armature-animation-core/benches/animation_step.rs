use armature_animation_core::{Armature, ArmatureData, ClipSpec, FadeOutMode};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn load_biped() -> Armature {
    let mut data: ArmatureData =
        armature_test_fixtures::armatures::load("biped").expect("biped armature fixture");
    let clips: Vec<ClipSpec> =
        armature_test_fixtures::clips::load("biped").expect("biped clip fixture");
    data.add_clips(&clips).expect("encode clips");
    Armature::new(data).expect("armature")
}

fn bench_single_state(c: &mut Criterion) {
    let mut armature = load_biped();
    armature.animation_mut().play(Some("walk"), -1);
    armature.advance_time(0.0);

    c.bench_function("advance_time single state", |b| {
        b.iter(|| armature.advance_time(black_box(1.0 / 60.0)))
    });
}

fn bench_cached_single_state(c: &mut Criterion) {
    let mut armature = load_biped();
    armature.set_cache_frame_rate(24.0);
    armature.animation_mut().play(Some("walk"), -1);
    armature.advance_time(0.0);

    c.bench_function("advance_time cached single state", |b| {
        b.iter(|| armature.advance_time(black_box(1.0 / 60.0)))
    });
}

fn bench_layers_and_blend_tree(c: &mut Criterion) {
    let mut armature = load_biped();
    let mut animation = armature.animation_mut();
    if let Some(parent) = animation.play(Some("locomotion"), -1) {
        if let Some(state) = animation.state_mut(parent) {
            state.parameter_x = 0.5;
        }
    }
    animation.fade_in("wave", 0.2, 0, 1, None, FadeOutMode::SameLayer);
    armature.advance_time(0.0);

    c.bench_function("advance_time layered blend tree", |b| {
        b.iter(|| armature.advance_time(black_box(1.0 / 60.0)))
    });
}

criterion_group!(
    benches,
    bench_single_state,
    bench_cached_single_state,
    bench_layers_and_blend_tree
);
criterion_main!(benches);
