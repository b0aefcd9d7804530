//! Standard easing curves over `t ∈ [0, 1]`.

/// An easing curve. Inputs are clamped to `[0, 1]`, so outputs are too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    /// Cubic ease-out, used for card entrances and the star shader.
    OutCubic,
    /// Cubic ease-in-out, used for the star morph.
    InOutCubic,
    /// Quartic ease-out, used for the orbit swing factor.
    OutQuart,
    /// Quartic ease-in-out, used for camera flights.
    InOutQuart,
}

impl Easing {
    /// Evaluate the curve at `t`.
    pub fn apply(self, t: f32) -> f32 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            Self::Linear => t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Self::OutQuart => 1.0 - (1.0 - t).powi(4),
            Self::InOutQuart => {
                if t < 0.5 {
                    8.0 * t * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(4) / 2.0
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 5] = [
        Easing::Linear,
        Easing::OutCubic,
        Easing::InOutCubic,
        Easing::OutQuart,
        Easing::InOutQuart,
    ];

    #[test]
    fn test_endpoints() {
        for e in ALL {
            assert!(e.apply(0.0).abs() < 1e-6, "{e:?} at 0");
            assert!((e.apply(1.0) - 1.0).abs() < 1e-6, "{e:?} at 1");
        }
    }

    #[test]
    fn test_overshoot_is_clamped() {
        for e in ALL {
            for t in [-1e-6, -0.5, 1.000_001, 1.5, f32::NAN] {
                let v = e.apply(t);
                assert!((0.0..=1.0).contains(&v), "{e:?}({t}) = {v}");
            }
        }
    }

    #[test]
    fn test_monotonic() {
        for e in ALL {
            let mut prev = 0.0;
            for i in 1..=100 {
                let v = e.apply(i as f32 / 100.0);
                assert!(v >= prev - 1e-6, "{e:?} not monotonic at step {i}");
                prev = v;
            }
        }
    }

    #[test]
    fn test_in_out_symmetric_midpoint() {
        assert!((Easing::InOutCubic.apply(0.5) - 0.5).abs() < 1e-6);
        assert!((Easing::InOutQuart.apply(0.5) - 0.5).abs() < 1e-6);
    }
}
