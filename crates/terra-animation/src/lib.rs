//! Easing curves, time-based tweens, and frame-rate independent smoothing.
//!
//! Animation tunables throughout Terra are expressed "per 60 Hz tick". The
//! helpers here convert those into per-frame factors for arbitrary frame times.

mod easing;
mod tween;

pub use easing::Easing;
pub use tween::Tween;

/// Reference tick rate the per-tick tunables were authored against.
pub const REFERENCE_HZ: f32 = 60.0;

/// Number of reference ticks covered by `dt` seconds.
pub fn tick_scale(dt: f32) -> f32 {
    dt * REFERENCE_HZ
}

/// Frame-rate independent blend factor for a per-tick lerp `rate`:
/// `1 - (1 - rate)^(dt * 60)`.
pub fn damp_factor(rate: f32, dt: f32) -> f32 {
    let rate = rate.clamp(0.0, 1.0);
    1.0 - (1.0 - rate).powf(tick_scale(dt).max(0.0))
}

/// Linear interpolation.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Move `current` toward `target` by a per-tick `rate`, scaled by `dt`.
pub fn damp(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    lerp(current, target, damp_factor(rate, dt))
}

/// Vector form of [`damp`].
pub fn damp_vec3(current: glam::Vec3, target: glam::Vec3, rate: f32, dt: f32) -> glam::Vec3 {
    current.lerp(target, damp_factor(rate, dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damp_factor_matches_rate_at_60hz() {
        let f = damp_factor(0.06, 1.0 / 60.0);
        assert!((f - 0.06).abs() < 1e-5, "one reference tick should equal the raw rate, got {f}");
    }

    #[test]
    fn test_damp_factor_compounds_for_long_frames() {
        // Two ticks at 30 fps must equal two successive 60 Hz steps.
        let two_ticks = damp_factor(0.1, 2.0 / 60.0);
        let expected = 1.0 - 0.9_f32 * 0.9;
        assert!((two_ticks - expected).abs() < 1e-5);
    }

    #[test]
    fn test_damp_factor_zero_dt_is_zero() {
        assert_eq!(damp_factor(0.5, 0.0), 0.0);
    }

    #[test]
    fn test_damp_converges() {
        let mut v = 0.0;
        for _ in 0..600 {
            v = damp(v, 1.0, 0.06, 1.0 / 60.0);
        }
        assert!((v - 1.0).abs() < 1e-4);
    }
}
