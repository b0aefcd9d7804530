//! Scene construction: camera, lighting rig, renderer sizing, atmosphere.

use glam::Vec3;
use terra_config::{EarthConfig, LightingPreset, PerformanceConfig};

use crate::backend::RenderBackend;
use crate::camera::Camera;
use crate::color::rgb_from_hex;
use crate::error::RenderError;
use crate::geometry::uv_sphere;
use crate::material::{AtmosphereMaterial, Material};
use crate::scene::{Node, NodeId, Scene};

/// Exposure of the filmic tone mapping curve.
pub const TONE_MAPPING_EXPOSURE: f32 = 0.8;

/// The host element the renderer attaches to.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerInfo {
    pub id: String,
    /// Logical width of the container box.
    pub width: f32,
    /// Logical height of the container box.
    pub height: f32,
    pub device_pixel_ratio: f32,
}

impl ContainerInfo {
    pub fn new(id: impl Into<String>, width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            device_pixel_ratio,
        }
    }

    /// Container size with degenerate dimensions replaced by 1.
    pub fn size(&self) -> (f32, f32) {
        let sane = |v: f32| if v.is_finite() && v >= 1.0 { v } else { 1.0 };
        (sane(self.width), sane(self.height))
    }
}

/// Rendering pixel ratio for a container: wide viewports may use the full
/// configured cap, narrow ones are held at the narrow ratio. Never above the
/// device's own ratio.
pub fn renderer_pixel_ratio(container: &ContainerInfo, performance: &PerformanceConfig) -> f32 {
    let cap = if container.width > performance.wide_viewport_width {
        performance.pixel_ratio_cap
    } else {
        performance.narrow_pixel_ratio.min(performance.pixel_ratio_cap)
    };
    let dpr = if container.device_pixel_ratio.is_finite() && container.device_pixel_ratio > 0.0 {
        container.device_pixel_ratio
    } else {
        1.0
    };
    dpr.min(cap).max(0.25)
}

/// Everything [`setup_scene`] produces besides the renderer itself.
#[derive(Debug)]
pub struct SceneBootstrap {
    pub scene: Scene,
    pub camera: Camera,
    pub pixel_ratio: f32,
}

/// Configure `backend` for `container` and build an empty lit scene.
///
/// `on_attached` runs once the renderer is sized, mirroring the
/// `three-attached` notification.
pub fn setup_scene<B, F>(
    backend: &mut B,
    container: &ContainerInfo,
    config: &EarthConfig,
    on_attached: F,
) -> Result<SceneBootstrap, RenderError>
where
    B: RenderBackend + ?Sized,
    F: FnOnce(&ContainerInfo),
{
    let (width, height) = container.size();
    let fov = if width < config.camera.mobile_breakpoint {
        config.camera.fov_mobile
    } else {
        config.camera.fov
    };
    let camera = Camera::perspective(fov, width / height, config.camera.near, config.camera.far);

    let pixel_ratio = renderer_pixel_ratio(container, &config.performance);
    backend.resize(width, height);
    backend.set_pixel_ratio(pixel_ratio);

    let mut scene = Scene::new();
    scene.exposure = TONE_MAPPING_EXPOSURE;
    scene.sun.position = Vec3::new(config.sun.radius, config.sun.height, 0.0);
    scene.sun.color = Vec3::ONE;
    apply_lighting(&mut scene, &config.lighting.day);

    log::info!(
        "Renderer attached to #{} at {width}x{height} (pixel ratio {pixel_ratio}, fov {fov})",
        container.id
    );
    on_attached(container);

    Ok(SceneBootstrap {
        scene,
        camera,
        pixel_ratio,
    })
}

/// Apply a day/night lighting preset to the ambient and sun lights.
pub fn apply_lighting(scene: &mut Scene, preset: &LightingPreset) {
    scene.ambient.color = rgb_from_hex(preset.ambient_color);
    scene.ambient.intensity = preset.ambient_intensity;
    scene.sun.intensity = preset.sun_intensity;
}

/// Build the fresnel atmosphere shell as a child of `parent`.
pub fn create_atmosphere<B>(
    scene: &mut Scene,
    backend: &mut B,
    parent: NodeId,
    config: &EarthConfig,
    segments: u32,
) -> Result<NodeId, RenderError>
where
    B: RenderBackend + ?Sized,
{
    let atmosphere = &config.atmosphere;
    let mesh = uv_sphere(config.earth.radius * atmosphere.scale, segments);
    let geometry = backend.upload_mesh("atmosphere", &mesh)?;
    let material = scene.add_material(Material::Atmosphere(AtmosphereMaterial {
        rayleigh_color: rgb_from_hex(atmosphere.rayleigh_color),
        mie_color: rgb_from_hex(atmosphere.mie_color),
        fresnel_power: atmosphere.fresnel_power,
        rayleigh_intensity: atmosphere.rayleigh_intensity,
        mie_intensity: atmosphere.mie_intensity,
        scattering_strength: atmosphere.scattering_strength,
    }));
    let mut node = Node::mesh("atmosphere", geometry, material);
    node.render_order = 1;
    Ok(scene.add(parent, node))
}
