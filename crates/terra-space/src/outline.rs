//! Screen rectangle outlines unprojected into world space.

use glam::{Vec2, Vec3};
use rand::Rng;
use terra_config::StarAnimationConfig;
use terra_render::{Camera, ScreenRect, Viewport};

/// Sampling parameters for [`project_screen_rect_to_world_outline`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineParams {
    /// Perimeter length, in pixels, covered by one sample.
    pub spacing_px: f32,
    /// Upper bound of samples for one rectangle.
    pub max_points: usize,
    /// Uniform screen jitter amplitude in pixels.
    pub screen_jitter_px: f32,
    /// Uniform depth jitter amplitude in world units.
    pub depth_jitter: f32,
}

impl OutlineParams {
    pub const DEFAULT_SPACING_PX: f32 = 6.0;

    pub fn from_config(config: &StarAnimationConfig) -> Self {
        Self {
            spacing_px: Self::DEFAULT_SPACING_PX,
            max_points: config.max_points_per_element as usize,
            screen_jitter_px: config.screen_jitter_px,
            depth_jitter: config.depth_jitter,
        }
    }

    /// Number of samples for a rectangle: proportional to its perimeter and
    /// capped, at least one per corner.
    pub fn sample_count(&self, rect: &ScreenRect) -> usize {
        if rect.is_empty() || self.max_points == 0 {
            return 0;
        }
        let spacing = if self.spacing_px > 0.0 { self.spacing_px } else { 1.0 };
        let wanted = (rect.perimeter() / spacing).ceil() as usize;
        wanted.clamp(4.min(self.max_points), self.max_points)
    }
}

/// Sample the perimeter of `rect` evenly, jitter each sample on screen, and
/// unproject it through `camera` onto the plane `z = depth`.
///
/// Samples whose ray misses the plane are dropped. Empty rectangles yield no
/// points. The only state touched is `rng`.
pub fn project_screen_rect_to_world_outline(
    rect: &ScreenRect,
    viewport: Viewport,
    camera: &Camera,
    depth: f32,
    params: &OutlineParams,
    rng: &mut impl Rng,
) -> Vec<Vec3> {
    let count = params.sample_count(rect);
    let mut points = Vec::with_capacity(count);
    let perimeter = rect.perimeter();

    for i in 0..count {
        let along = (i as f32 + 0.5) / count as f32 * perimeter;
        let mut screen = perimeter_point(rect, along);
        if params.screen_jitter_px > 0.0 {
            screen += Vec2::new(
                symmetric(rng) * params.screen_jitter_px,
                symmetric(rng) * params.screen_jitter_px,
            );
        }

        let ray = camera.ray_from_ndc(viewport.to_ndc(screen));
        let Some(mut world) = ray.intersect_plane_z(depth) else {
            continue;
        };
        if params.depth_jitter > 0.0 {
            world.z += symmetric(rng) * params.depth_jitter;
        }
        points.push(world);
    }
    points
}

/// Point `distance` pixels clockwise along the rectangle's edge, starting at
/// the top-left corner.
fn perimeter_point(rect: &ScreenRect, distance: f32) -> Vec2 {
    let (w, h) = (rect.width, rect.height);
    let d = distance.rem_euclid(rect.perimeter().max(f32::EPSILON));
    if d < w {
        Vec2::new(rect.left + d, rect.top)
    } else if d < w + h {
        Vec2::new(rect.right(), rect.top + (d - w))
    } else if d < 2.0 * w + h {
        Vec2::new(rect.right() - (d - w - h), rect.bottom())
    } else {
        Vec2::new(rect.left, rect.bottom() - (d - 2.0 * w - h))
    }
}

fn symmetric(rng: &mut impl Rng) -> f32 {
    rng.random::<f32>() * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn camera(aspect: f32) -> Camera {
        let mut camera = Camera::perspective(45.0, aspect, 0.1, 1000.0);
        camera.position = Vec3::new(7.0, 5.5, 7.5);
        camera.look_at(Vec3::new(0.0, 0.5, 0.0));
        camera
    }

    fn exact() -> OutlineParams {
        OutlineParams {
            spacing_px: 10.0,
            max_points: 1000,
            screen_jitter_px: 0.0,
            depth_jitter: 0.0,
        }
    }

    #[test]
    fn test_points_lie_on_depth_plane_and_rect_outline() {
        let viewport = Viewport::new(1600.0, 900.0);
        let cam = camera(viewport.aspect());
        let rect = ScreenRect::new(600.0, 300.0, 400.0, 300.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let points =
            project_screen_rect_to_world_outline(&rect, viewport, &cam, -2.0, &exact(), &mut rng);
        assert_eq!(points.len(), 140);

        for p in &points {
            assert!((p.z + 2.0).abs() < 1e-3, "point {p} off the depth plane");
            let ndc = cam.project(*p);
            let px = viewport.from_ndc(ndc.truncate());
            let on_vertical = (px.x - rect.left).abs() < 0.5 || (px.x - rect.right()).abs() < 0.5;
            let on_horizontal = (px.y - rect.top).abs() < 0.5 || (px.y - rect.bottom()).abs() < 0.5;
            assert!(on_vertical || on_horizontal, "{px} is not on the outline");
            assert!(px.x > rect.left - 0.5 && px.x < rect.right() + 0.5);
            assert!(px.y > rect.top - 0.5 && px.y < rect.bottom() + 0.5);
        }
    }

    #[test]
    fn test_density_follows_perimeter_and_caps() {
        let params = OutlineParams {
            max_points: 100,
            ..exact()
        };
        let small = ScreenRect::new(0.0, 0.0, 50.0, 50.0);
        let large = ScreenRect::new(0.0, 0.0, 800.0, 600.0);
        assert_eq!(params.sample_count(&small), 20);
        assert_eq!(params.sample_count(&large), 100);
        assert_eq!(params.sample_count(&ScreenRect::new(0.0, 0.0, 1.0, 1.0)), 4);
    }

    #[test]
    fn test_empty_rect_yields_nothing() {
        let viewport = Viewport::new(800.0, 600.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let empty = ScreenRect::new(100.0, 100.0, 0.0, 80.0);
        let points = project_screen_rect_to_world_outline(
            &empty,
            viewport,
            &camera(viewport.aspect()),
            -2.0,
            &exact(),
            &mut rng,
        );
        assert!(points.is_empty());
    }

    #[test]
    fn test_jitter_bounded_and_seeded() {
        let viewport = Viewport::new(1600.0, 900.0);
        let cam = camera(viewport.aspect());
        let rect = ScreenRect::new(600.0, 300.0, 400.0, 300.0);
        let params = OutlineParams {
            screen_jitter_px: 2.0,
            depth_jitter: 0.05,
            ..exact()
        };
        let run = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            project_screen_rect_to_world_outline(&rect, viewport, &cam, -2.0, &params, &mut rng)
        };
        let a = run(3);
        assert_eq!(a, run(3));
        for p in &a {
            assert!((p.z + 2.0).abs() <= 0.05 + 1e-3);
        }
    }

    #[test]
    fn test_perimeter_walk_corners() {
        let rect = ScreenRect::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(perimeter_point(&rect, 0.0), Vec2::new(10.0, 20.0));
        assert_eq!(perimeter_point(&rect, 100.0), Vec2::new(110.0, 20.0));
        assert_eq!(perimeter_point(&rect, 150.0), Vec2::new(110.0, 70.0));
        assert_eq!(perimeter_point(&rect, 250.0), Vec2::new(10.0, 70.0));
        assert_eq!(perimeter_point(&rect, 275.0), Vec2::new(10.0, 45.0));
    }
}
