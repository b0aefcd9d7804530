//! A GPU-less backend that tracks resources and records draw lists.

use glam::Vec3;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::backend::{
    BackendInfo, FrameStats, GeometryId, RenderBackend, ResourceCounts, StarAttributes, TextureId,
};
use crate::camera::Camera;
use crate::error::RenderError;
use crate::geometry::MeshData;
use crate::scene::{DrawKind, MaterialId, NodeId, Scene};
use crate::texture::{TextureImage, TextureOptions};

#[derive(Debug, Clone)]
enum HeadlessGeometry {
    Mesh { triangles: usize },
    Stars { targets: Vec<Vec3> },
}

/// Records what a real backend would hold. Used by tests and by hosts that
/// run the animation without presenting frames.
#[derive(Debug)]
pub struct HeadlessBackend {
    next_id: u64,
    textures: FxHashMap<TextureId, (u32, u32, TextureOptions)>,
    geometries: FxHashMap<GeometryId, HeadlessGeometry>,
    materials: FxHashSet<MaterialId>,
    width: f32,
    height: f32,
    pixel_ratio: f32,
    max_anisotropy: u16,
    frames: u64,
    last_draws: Vec<NodeId>,
    disposed: bool,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(16)
    }
}

impl HeadlessBackend {
    pub fn new(max_anisotropy: u16) -> Self {
        Self {
            next_id: 1,
            textures: FxHashMap::default(),
            geometries: FxHashMap::default(),
            materials: FxHashSet::default(),
            width: 0.0,
            height: 0.0,
            pixel_ratio: 1.0,
            max_anisotropy,
            frames: 0,
            last_draws: Vec::new(),
            disposed: false,
        }
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check(&self) -> Result<(), RenderError> {
        if self.disposed {
            Err(RenderError::Disposed)
        } else {
            Ok(())
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Nodes drawn by the most recent frame, in draw order.
    pub fn last_draws(&self) -> &[NodeId] {
        &self.last_draws
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Options a texture was uploaded with.
    pub fn texture_options(&self, id: TextureId) -> Option<TextureOptions> {
        self.textures.get(&id).map(|(_, _, o)| *o)
    }

    pub fn texture_size(&self, id: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&id).map(|(w, h, _)| (*w, *h))
    }

    /// Current star targets of a star geometry.
    pub fn star_targets(&self, id: GeometryId) -> Option<&[Vec3]> {
        match self.geometries.get(&id)? {
            HeadlessGeometry::Stars { targets } => Some(targets),
            HeadlessGeometry::Mesh { .. } => None,
        }
    }

    pub fn mesh_triangles(&self, id: GeometryId) -> Option<usize> {
        match self.geometries.get(&id)? {
            HeadlessGeometry::Mesh { triangles } => Some(*triangles),
            HeadlessGeometry::Stars { .. } => None,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl RenderBackend for HeadlessBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: "headless".to_string(),
            max_anisotropy: self.max_anisotropy,
        }
    }

    fn upload_texture(
        &mut self,
        _label: &str,
        image: &TextureImage,
        options: &TextureOptions,
    ) -> Result<TextureId, RenderError> {
        self.check()?;
        image.validate()?;
        let id = TextureId::from_raw(self.next());
        self.textures.insert(id, (image.width, image.height, *options));
        Ok(id)
    }

    fn upload_mesh(&mut self, _label: &str, mesh: &MeshData) -> Result<GeometryId, RenderError> {
        self.check()?;
        let id = GeometryId::from_raw(self.next());
        self.geometries.insert(
            id,
            HeadlessGeometry::Mesh {
                triangles: mesh.triangle_count(),
            },
        );
        Ok(id)
    }

    fn upload_stars(
        &mut self,
        _label: &str,
        stars: StarAttributes<'_>,
    ) -> Result<GeometryId, RenderError> {
        self.check()?;
        stars.validate()?;
        let id = GeometryId::from_raw(self.next());
        self.geometries.insert(
            id,
            HeadlessGeometry::Stars {
                targets: stars.targets.to_vec(),
            },
        );
        Ok(id)
    }

    fn write_star_targets(
        &mut self,
        geometry: GeometryId,
        targets: &[Vec3],
    ) -> Result<(), RenderError> {
        self.check()?;
        match self.geometries.get_mut(&geometry) {
            Some(HeadlessGeometry::Stars { targets: current }) => {
                if current.len() != targets.len() {
                    return Err(RenderError::AttributeLength {
                        origins: current.len(),
                        targets: targets.len(),
                        colors: current.len(),
                        sizes: current.len(),
                    });
                }
                current.copy_from_slice(targets);
                Ok(())
            }
            _ => Err(RenderError::UnknownGeometry(geometry)),
        }
    }

    fn release_texture(&mut self, id: TextureId) {
        self.textures.remove(&id);
    }

    fn release_geometry(&mut self, id: GeometryId) {
        self.geometries.remove(&id);
    }

    fn release_material(&mut self, id: MaterialId) {
        self.materials.remove(&id);
    }

    fn resize(&mut self, width: f32, height: f32) {
        self.width = width.max(1.0);
        self.height = height.max(1.0);
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio.max(0.1);
    }

    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) -> Result<FrameStats, RenderError> {
        self.check()?;
        let draws = scene.draw_list(camera);
        let mut stats = FrameStats::default();
        self.last_draws.clear();
        for item in &draws {
            if !self.geometries.contains_key(&item.geometry) {
                continue;
            }
            self.materials.insert(item.material);
            stats.draw_calls += 1;
            stats.instances += match item.kind {
                DrawKind::Mesh => 1,
                DrawKind::Stars { count } => count,
            };
            self.last_draws.push(item.node);
        }
        self.frames += 1;
        Ok(stats)
    }

    fn live_resources(&self) -> ResourceCounts {
        ResourceCounts {
            textures: self.textures.len(),
            geometries: self.geometries.len(),
            materials: self.materials.len(),
        }
    }

    fn dispose(&mut self) {
        self.textures.clear();
        self.geometries.clear();
        self.materials.clear();
        self.last_draws.clear();
        self.disposed = true;
    }
}
