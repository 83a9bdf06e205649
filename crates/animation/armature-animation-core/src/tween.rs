//! Easing and curve-sample evaluation for keyframe tweens.

use std::f64::consts::PI;

use crate::data::TweenType;

/// Wraps an angle into (-PI, PI].
#[inline]
pub fn normalize_radian(value: f64) -> f64 {
    let mut value = (value + PI) % (PI * 2.0);
    value += if value > 0.0 { -PI } else { PI };
    value
}

/// Closed-form easing. `easing` blends between linear (0) and the full curve (1).
pub fn easing_value(tween: TweenType, progress: f64, easing: f64) -> f64 {
    let value = match tween {
        TweenType::QuadIn => progress * progress,
        TweenType::QuadOut => 1.0 - (1.0 - progress) * (1.0 - progress),
        TweenType::QuadInOut => 0.5 * (1.0 - (progress * PI).cos()),
        _ => progress,
    };
    (value - progress) * easing + progress
}

/// Piecewise-linear evaluation of `count` quantized samples (0..=10000) stored
/// in `samples[offset..offset + count]`. The curve is anchored at 0 and 10000.
pub fn curve_value(progress: f64, samples: &[i16], offset: usize, count: usize) -> f64 {
    if progress <= 0.0 {
        return 0.0;
    }
    if progress >= 1.0 {
        return 1.0;
    }

    let segments = count + 1;
    let value_index = (progress * segments as f64).floor() as usize;
    let sample = |i: usize| samples.get(offset + i).copied().unwrap_or(0) as f64;
    let from = if value_index == 0 {
        0.0
    } else {
        sample(value_index - 1)
    };
    let to = if value_index == segments - 1 {
        10000.0
    } else {
        sample(value_index)
    };

    (from + (to - from) * (progress * segments as f64 - value_index as f64)) * 0.0001
}
