//! Perspective camera, picking rays, and NDC conversions.

use glam::{Mat3, Mat4, Quat, Vec2, Vec3};

/// A camera that generates view and projection matrices for rendering.
#[derive(Debug, Clone)]
pub struct Camera {
    /// World-space position.
    pub position: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    /// Projection parameters.
    pub projection: Projection,
    /// Near clip plane distance (always positive).
    pub near: f32,
    /// Far clip plane distance (always positive, > near).
    pub far: f32,
}

/// Projection type for the camera.
#[derive(Debug, Clone)]
pub enum Projection {
    /// Perspective projection.
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f32,
        /// Width / height.
        aspect_ratio: f32,
    },
    /// Orthographic projection.
    Orthographic {
        /// Half-width of the view volume in world units.
        half_width: f32,
        /// Half-height of the view volume in world units.
        half_height: f32,
    },
}

impl Camera {
    /// Perspective camera looking down -Z from the origin.
    pub fn perspective(fov_degrees: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            projection: Projection::Perspective {
                fov_y: fov_degrees.to_radians(),
                aspect_ratio,
            },
            near,
            far,
        }
    }

    /// Compute the view matrix (inverse of camera transform).
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position).inverse()
    }

    /// Compute the projection matrix with reverse-Z.
    pub fn projection_matrix(&self) -> Mat4 {
        match &self.projection {
            Projection::Perspective {
                fov_y,
                aspect_ratio,
            } => {
                // Reverse-Z: near plane maps to z=1, far plane maps to z=0.
                Mat4::perspective_rh(*fov_y, *aspect_ratio, self.far, self.near)
            }
            Projection::Orthographic {
                half_width,
                half_height,
            } => Mat4::orthographic_rh(
                -*half_width,
                *half_width,
                -*half_height,
                *half_height,
                self.far,
                self.near,
            ),
        }
    }

    /// Compute the combined view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// The forward direction vector (-Z in camera space).
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// The up direction vector (+Y in camera space).
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// The right direction vector (+X in camera space).
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Update the aspect ratio for perspective projection.
    pub fn set_aspect_ratio(&mut self, width: f32, height: f32) {
        if height <= 0.0 {
            return;
        }
        if let Projection::Perspective { aspect_ratio, .. } = &mut self.projection {
            *aspect_ratio = width / height;
        }
    }

    /// Vertical field of view in degrees, if perspective.
    pub fn fov_degrees(&self) -> Option<f32> {
        match self.projection {
            Projection::Perspective { fov_y, .. } => Some(fov_y.to_degrees()),
            Projection::Orthographic { .. } => None,
        }
    }

    pub fn set_fov_degrees(&mut self, degrees: f32) {
        if let Projection::Perspective { fov_y, .. } = &mut self.projection {
            *fov_y = degrees.to_radians();
        }
    }

    /// Orient the camera toward `target` with +Y up. No-op when `target`
    /// coincides with the camera position.
    pub fn look_at(&mut self, target: Vec3) {
        let Some(forward) = (target - self.position).try_normalize() else {
            return;
        };
        let right = forward
            .cross(Vec3::Y)
            .try_normalize()
            .unwrap_or_else(|| forward.cross(Vec3::Z).normalize());
        let up = right.cross(forward);
        self.rotation = Quat::from_mat3(&Mat3::from_cols(right, up, -forward)).normalize();
    }

    /// World point to normalized device coordinates.
    pub fn project(&self, world: Vec3) -> Vec3 {
        self.view_projection_matrix().project_point3(world)
    }

    /// Normalized device coordinates to a world point.
    pub fn unproject(&self, ndc: Vec3) -> Vec3 {
        self.view_projection_matrix().inverse().project_point3(ndc)
    }

    /// The picking ray through `ndc`.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        match self.projection {
            Projection::Perspective { .. } => {
                let through = self.unproject(ndc.extend(0.5));
                Ray {
                    origin: self.position,
                    direction: (through - self.position).normalize_or(self.forward()),
                }
            }
            Projection::Orthographic { .. } => Ray {
                origin: self.unproject(ndc.extend(1.0)),
                direction: self.forward(),
            },
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(45.0, 16.0 / 9.0, 0.1, 1000.0)
    }
}

/// A half-line used for picking and unprojection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Intersection with the plane `z = depth`, if in front of the origin.
    pub fn intersect_plane_z(&self, depth: f32) -> Option<Vec3> {
        if self.direction.z.abs() < 1e-6 {
            return None;
        }
        let t = (depth - self.origin.z) / self.direction.z;
        (t >= 0.0 && t.is_finite()).then(|| self.at(t))
    }

    /// Distance along the ray to a `width` x `height` quad centered on the
    /// local XY plane of `world`.
    pub fn intersect_quad(&self, world: Mat4, width: f32, height: f32) -> Option<f32> {
        let inverse = world.inverse();
        let origin = inverse.transform_point3(self.origin);
        let direction = inverse.transform_vector3(self.direction);
        if direction.z.abs() < 1e-6 {
            return None;
        }
        let t = -origin.z / direction.z;
        if t < 0.0 {
            return None;
        }
        let local = origin + direction * t;
        if local.x.abs() > width * 0.5 || local.y.abs() > height * 0.5 {
            return None;
        }
        Some((world.transform_point3(local) - self.origin).length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn test_default_camera_looks_down_neg_z() {
        let cam = Camera::default();
        assert!(approx(cam.forward(), Vec3::NEG_Z));
        assert!(approx(cam.up(), Vec3::Y));
    }

    #[test]
    fn test_reverse_z_depth_ordering() {
        let cam = Camera::default();
        let near = cam.project(Vec3::new(0.0, 0.0, -1.0));
        let far = cam.project(Vec3::new(0.0, 0.0, -500.0));
        assert!(near.z > far.z, "closer points must have larger depth");
    }

    #[test]
    fn test_look_at_faces_target() {
        let mut cam = Camera::default();
        cam.position = Vec3::new(-6.5, 4.8, 10.5);
        let target = Vec3::new(0.0, -0.5, 0.0);
        cam.look_at(target);
        assert!(approx(cam.forward(), (target - cam.position).normalize()));
        assert!(cam.up().y > 0.0);
        let ndc = cam.project(target);
        assert!(ndc.x.abs() < 1e-3 && ndc.y.abs() < 1e-3);
    }

    #[test]
    fn test_look_at_straight_down_is_finite() {
        let mut cam = Camera::default();
        cam.position = Vec3::new(0.0, 10.0, 0.0);
        cam.look_at(Vec3::ZERO);
        assert!(cam.rotation.is_finite());
        assert!(approx(cam.forward(), Vec3::NEG_Y));
    }

    #[test]
    fn test_ray_plane_roundtrip() {
        let mut cam = Camera::default();
        cam.position = Vec3::new(0.0, 0.0, 10.0);
        let world = Vec3::new(1.5, -0.75, -2.0);
        let ndc = cam.project(world);
        let hit = cam.ray_from_ndc(ndc.truncate()).intersect_plane_z(-2.0).unwrap();
        assert!(approx(hit, world), "{hit:?}");
    }

    #[test]
    fn test_ray_parallel_to_plane_misses() {
        let ray = Ray {
            origin: Vec3::ZERO,
            direction: Vec3::X,
        };
        assert!(ray.intersect_plane_z(-2.0).is_none());
    }

    #[test]
    fn test_ray_hits_rotated_quad() {
        let world = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::from_rotation_y(FRAC_PI_4 * 0.5),
            Vec3::new(0.0, 0.0, -5.0),
        );
        let ray = Ray {
            origin: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        };
        let t = ray.intersect_quad(world, 1.0, 1.0).unwrap();
        assert!((t - 5.0).abs() < 1e-3);
        let miss = Ray {
            origin: Vec3::new(3.0, 0.0, 0.0),
            direction: Vec3::NEG_Z,
        };
        assert!(miss.intersect_quad(world, 1.0, 1.0).is_none());
    }

    #[test]
    fn test_set_aspect_ratio_ignores_zero_height() {
        let mut cam = Camera::default();
        cam.set_aspect_ratio(800.0, 0.0);
        let Projection::Perspective { aspect_ratio, .. } = cam.projection else {
            panic!("expected perspective");
        };
        assert!((aspect_ratio - 16.0 / 9.0).abs() < 1e-6);
    }
}
