//! CPU-side star attributes.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;
use terra_animation::Easing;
use terra_render::{StarAttributes, hsl_to_rgb};

const SHELL_INNER: f32 = 100.0;
const SHELL_DEPTH: f32 = 200.0;
const HUE_BASE: f32 = 0.5;
const HUE_BAND: f32 = 0.1;
const SIZE_MIN: f32 = 0.5;
const SIZE_BAND: f32 = 1.5;

/// Parallel per-star arrays. Origins, targets, colors and sizes always have
/// the same length.
#[derive(Debug, Clone)]
pub struct StarBuffer {
    origins: Vec<Vec3>,
    targets: Vec<Vec3>,
    colors: Vec<Vec3>,
    sizes: Vec<f32>,
    /// Stable per-star offsets in `[-0.5, 0.5)`, scaled by the spread when
    /// targets are assigned.
    offsets: Vec<Vec3>,
}

impl StarBuffer {
    /// Scatter `count` stars over a spherical shell. Targets start at the
    /// origins.
    pub fn generate(count: usize, rng: &mut impl Rng) -> Self {
        let mut origins = Vec::with_capacity(count);
        let mut colors = Vec::with_capacity(count);
        let mut sizes = Vec::with_capacity(count);
        let mut offsets = Vec::with_capacity(count);

        for _ in 0..count {
            let radius = SHELL_INNER + rng.random::<f32>() * SHELL_DEPTH;
            let theta = rng.random::<f32>() * TAU;
            let phi = (2.0 * rng.random::<f32>() - 1.0).clamp(-1.0, 1.0).acos();
            origins.push(Vec3::new(
                radius * phi.sin() * theta.cos(),
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
            ));

            offsets.push(Vec3::new(
                rng.random::<f32>() - 0.5,
                rng.random::<f32>() - 0.5,
                rng.random::<f32>() - 0.5,
            ));

            let hue = HUE_BASE + rng.random::<f32>() * HUE_BAND;
            let lightness = 0.8 + rng.random::<f32>() * 0.2;
            colors.push(hsl_to_rgb(hue, 0.8, lightness));

            sizes.push(SIZE_MIN + rng.random::<f32>() * SIZE_BAND);
        }

        Self {
            targets: origins.clone(),
            origins,
            colors,
            sizes,
            offsets,
        }
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    pub fn origins(&self) -> &[Vec3] {
        &self.origins
    }

    pub fn targets(&self) -> &[Vec3] {
        &self.targets
    }

    pub fn colors(&self) -> &[Vec3] {
        &self.colors
    }

    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    pub fn attributes(&self) -> StarAttributes<'_> {
        StarAttributes {
            origins: &self.origins,
            targets: &self.targets,
            colors: &self.colors,
            sizes: &self.sizes,
        }
    }

    /// Distribute `points` round-robin over all stars, displacing each star by
    /// its stable offset times the spread. Stars whose point is not finite
    /// keep their previous target. Returns how many stars were retargeted.
    pub fn assign_targets(&mut self, points: &[Vec3], spread_xy: f32, spread_z: f32) -> usize {
        if points.is_empty() {
            return 0;
        }
        let spread_xy = if spread_xy.is_finite() && spread_xy >= 0.0 {
            spread_xy
        } else {
            tracing::warn!("Invalid star spread_xy {spread_xy}, using 0");
            0.0
        };
        let spread_z = if spread_z.is_finite() && spread_z >= 0.0 {
            spread_z
        } else {
            tracing::warn!("Invalid star spread_z {spread_z}, using 0");
            0.0
        };
        let spread = Vec3::new(spread_xy, spread_xy, spread_z);

        let mut assigned = 0;
        let mut skipped = false;
        for (i, (target, offset)) in self.targets.iter_mut().zip(&self.offsets).enumerate() {
            let point = points[i % points.len()];
            if !point.is_finite() {
                skipped = true;
                continue;
            }
            *target = point + *offset * spread;
            assigned += 1;
        }
        if skipped {
            tracing::warn!("Skipped non-finite star targets");
        }
        assigned
    }

    /// Where star `index` is drawn at `transition`, mirroring the shader's
    /// cubic ease-out blend.
    pub fn rendered_position(&self, index: usize, transition: f32) -> Option<Vec3> {
        let origin = *self.origins.get(index)?;
        let target = *self.targets.get(index)?;
        Some(origin.lerp(target, Easing::OutCubic.apply(transition)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn buffer(count: usize) -> StarBuffer {
        StarBuffer::generate(count, &mut ChaCha8Rng::seed_from_u64(7))
    }

    #[test]
    fn test_arrays_equal_length() {
        for count in [0, 1, 1500, 3000] {
            let b = buffer(count);
            assert_eq!(b.len(), count);
            assert_eq!(b.targets().len(), count);
            assert_eq!(b.colors().len(), count);
            assert_eq!(b.sizes().len(), count);
            assert!(b.attributes().validate().is_ok());
        }
    }

    #[test]
    fn test_stars_on_shell() {
        let b = buffer(2000);
        for p in b.origins() {
            let r = p.length();
            assert!((99.9..=300.1).contains(&r), "radius {r} outside shell");
        }
        for s in b.sizes() {
            assert!((0.5..=2.0).contains(s));
        }
        assert_eq!(b.origins(), b.targets(), "targets start at the origins");
    }

    #[test]
    fn test_colors_in_cyan_band() {
        let b = buffer(500);
        for c in b.colors() {
            assert!(c.z + 1e-5 >= c.x && c.y + 1e-5 >= c.x, "hue 0.5..0.6 is cyan-blue, got {c}");
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(buffer(64).origins(), buffer(64).origins());
    }

    #[test]
    fn test_round_robin_assignment() {
        let mut b = buffer(10);
        let points = [Vec3::new(1.0, 0.0, -2.0), Vec3::new(2.0, 0.0, -2.0), Vec3::new(3.0, 0.0, -2.0)];
        assert_eq!(b.assign_targets(&points, 0.02, 0.01), 10);
        for (i, t) in b.targets().iter().enumerate() {
            let p = points[i % 3];
            assert!((t.x - p.x).abs() <= 0.01 + 1e-6);
            assert!((t.z - p.z).abs() <= 0.005 + 1e-6);
        }
    }

    #[test]
    fn test_non_finite_points_keep_old_target() {
        let mut b = buffer(4);
        let before = b.targets().to_vec();
        let points = [Vec3::new(f32::NAN, 0.0, 0.0), Vec3::ONE];
        assert_eq!(b.assign_targets(&points, 0.0, 0.0), 2);
        assert_eq!(b.targets()[0], before[0]);
        assert_eq!(b.targets()[1], Vec3::ONE);
        assert_eq!(b.targets()[2], before[2]);
        assert_eq!(b.assign_targets(&[], 0.0, 0.0), 0);
    }

    #[test]
    fn test_rendered_position_endpoints() {
        let mut b = buffer(3);
        b.assign_targets(&[Vec3::ZERO], 0.0, 0.0);
        assert_eq!(b.rendered_position(1, 0.0), Some(b.origins()[1]));
        assert_eq!(b.rendered_position(1, 1.0), Some(Vec3::ZERO));
        assert_eq!(b.rendered_position(3, 0.5), None);
    }
}
