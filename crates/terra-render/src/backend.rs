//! The seam between scene state and a GPU (or GPU-less) renderer.

use glam::Vec3;

use crate::camera::Camera;
use crate::error::RenderError;
use crate::geometry::MeshData;
use crate::scene::{MaterialId, Scene};
use crate::texture::{TextureImage, TextureOptions};

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

resource_id!(
    /// Handle to an uploaded texture.
    TextureId
);
resource_id!(
    /// Handle to uploaded vertex data (a mesh or a star field).
    GeometryId
);

/// Per-star attribute arrays. All four must have the same length.
#[derive(Debug, Clone, Copy)]
pub struct StarAttributes<'a> {
    pub origins: &'a [Vec3],
    pub targets: &'a [Vec3],
    pub colors: &'a [Vec3],
    pub sizes: &'a [f32],
}

impl StarAttributes<'_> {
    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        let n = self.origins.len();
        if self.targets.len() != n || self.colors.len() != n || self.sizes.len() != n {
            return Err(RenderError::AttributeLength {
                origins: n,
                targets: self.targets.len(),
                colors: self.colors.len(),
                sizes: self.sizes.len(),
            });
        }
        Ok(())
    }
}

/// Static facts about a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendInfo {
    pub name: String,
    /// Largest anisotropic filtering clamp the device supports.
    pub max_anisotropy: u16,
}

/// Counters for one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub instances: u32,
}

/// Live GPU-side resources, for leak checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub textures: usize,
    pub geometries: usize,
    pub materials: usize,
}

impl ResourceCounts {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A renderer that owns GPU resources and draws a [`Scene`].
pub trait RenderBackend {
    fn info(&self) -> BackendInfo;

    fn upload_texture(
        &mut self,
        label: &str,
        image: &TextureImage,
        options: &TextureOptions,
    ) -> Result<TextureId, RenderError>;

    fn upload_mesh(&mut self, label: &str, mesh: &MeshData) -> Result<GeometryId, RenderError>;

    fn upload_stars(
        &mut self,
        label: &str,
        stars: StarAttributes<'_>,
    ) -> Result<GeometryId, RenderError>;

    /// Replace the target positions of a star geometry. The count must match.
    fn write_star_targets(
        &mut self,
        geometry: GeometryId,
        targets: &[Vec3],
    ) -> Result<(), RenderError>;

    fn release_texture(&mut self, id: TextureId);
    fn release_geometry(&mut self, id: GeometryId);
    /// Drop cached GPU state for a material removed from its scene.
    fn release_material(&mut self, id: MaterialId);

    /// Resize the drawing surface in logical pixels.
    fn resize(&mut self, width: f32, height: f32);
    /// Physical pixels per logical pixel used for rendering.
    fn set_pixel_ratio(&mut self, ratio: f32);
    fn pixel_ratio(&self) -> f32;

    fn render(&mut self, scene: &Scene, camera: &Camera) -> Result<FrameStats, RenderError>;

    fn live_resources(&self) -> ResourceCounts;

    /// Release every resource. Later calls fail with [`RenderError::Disposed`].
    fn dispose(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_attribute_lengths_checked() {
        let v = [Vec3::ZERO; 3];
        let ok = StarAttributes {
            origins: &v,
            targets: &v,
            colors: &v,
            sizes: &[1.0; 3],
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.len(), 3);

        let bad = StarAttributes {
            sizes: &[1.0; 2],
            ..ok
        };
        assert!(matches!(
            bad.validate(),
            Err(RenderError::AttributeLength { sizes: 2, .. })
        ));
    }
}
