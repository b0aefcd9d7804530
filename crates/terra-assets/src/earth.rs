//! The planet body: day and night materials over one sphere.

use std::time::Duration;

use glam::Vec3;
use terra_config::EarthConfig;
use terra_render::{
    ColorSpace, Material, MaterialId, Node, NodeId, RenderBackend, Scene, StandardMaterial,
    TextureImage, Transform, rgb_from_hex, uv_sphere,
};

use crate::error::AssetError;
use crate::source::TextureSource;
use crate::{LoadOptions, texture_path, upload_textures};

/// Decoded planet textures.
#[derive(Debug, Clone)]
pub struct EarthTextures {
    pub day: TextureImage,
    pub night: TextureImage,
    pub normal: TextureImage,
    pub bump: TextureImage,
}

/// Handles to the planet mesh and its two alternate materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarthSystem {
    pub node: NodeId,
    pub day_material: MaterialId,
    pub night_material: MaterialId,
}

/// Load the four planet textures in parallel, racing them against
/// `init.asset_timeout_ms`.
pub async fn load_earth_textures<S: TextureSource>(
    source: &S,
    config: &EarthConfig,
) -> Result<EarthTextures, AssetError> {
    let timeout = Duration::from_millis(u64::from(config.init.asset_timeout_ms));
    let paths = &config.paths;
    let day = texture_path(paths, &paths.earth_day);
    let night = texture_path(paths, &paths.earth_night);
    let normal = texture_path(paths, &paths.earth_normal);
    let bump = texture_path(paths, &paths.earth_bump);

    let all = async {
        tokio::try_join!(
            source.load(&day),
            source.load(&night),
            source.load(&normal),
            source.load(&bump),
        )
    };

    match tokio::time::timeout(timeout, all).await {
        Ok(Ok((day, night, normal, bump))) => Ok(EarthTextures {
            day,
            night,
            normal,
            bump,
        }),
        Ok(Err(e)) => {
            tracing::error!("Planet texture loading failed: {e}");
            Err(e)
        }
        Err(_) => {
            tracing::error!("Planet textures did not load within {timeout:?}");
            Err(AssetError::Timeout(timeout))
        }
    }
}

/// Upload `textures` and add the planet mesh under `parent` in day mode.
pub fn build_earth_system(
    scene: &mut Scene,
    backend: &mut dyn RenderBackend,
    parent: NodeId,
    textures: &EarthTextures,
    config: &EarthConfig,
    options: &LoadOptions,
) -> Result<EarthSystem, AssetError> {
    let color = options.texture_options(ColorSpace::Srgb);
    let data = options.texture_options(ColorSpace::Linear);
    let ids = upload_textures(
        backend,
        &[
            ("earth-day", &textures.day, color),
            ("earth-night", &textures.night, color),
            ("earth-normal", &textures.normal, data),
            ("earth-bump", &textures.bump, data),
        ],
    )?;
    let [day, night, normal, bump] = [ids[0], ids[1], ids[2], ids[3]];

    let body = &config.earth;
    let segments = config.earth_segments(options.mobile_geometry);
    let geometry = match backend.upload_mesh("earth", &uv_sphere(body.radius, segments)) {
        Ok(g) => g,
        Err(e) => {
            for id in ids {
                backend.release_texture(id);
            }
            return Err(e.into());
        }
    };

    let day_surface = StandardMaterial {
        map: Some(day),
        normal_map: Some(normal),
        bump_map: Some(bump),
        bump_scale: body.bump_scale,
        roughness: 0.7,
        metalness: 0.0,
        ..Default::default()
    };
    let night_surface = StandardMaterial {
        emissive: rgb_from_hex(body.night_emissive_color),
        emissive_map: Some(night),
        emissive_intensity: body.emissive_intensity * body.night_emissive_multiplier,
        ..day_surface.clone()
    };
    let day_material = scene.add_material(Material::Standard(day_surface));
    let night_material = scene.add_material(Material::Standard(night_surface));

    let transform = Transform {
        position: Vec3::from(body.initial_position),
        scale: Vec3::splat(body.initial_scale),
        ..Default::default()
    };
    let node = scene.add(
        parent,
        Node::mesh("earth", geometry, day_material).with_transform(transform),
    );
    tracing::info!("Planet built with {segments} segments");

    Ok(EarthSystem {
        node,
        day_material,
        night_material,
    })
}

/// Load and build the planet.
pub async fn create_earth_system<S: TextureSource>(
    scene: &mut Scene,
    backend: &mut dyn RenderBackend,
    parent: NodeId,
    source: &S,
    config: &EarthConfig,
    options: &LoadOptions,
) -> Result<EarthSystem, AssetError> {
    let textures = load_earth_textures(source, config).await?;
    build_earth_system(scene, backend, parent, &textures, config, options)
}

impl EarthSystem {
    /// Remove the planet, everything attached to it, and both materials.
    pub fn dispose(self, scene: &mut Scene, backend: &mut dyn RenderBackend) {
        scene.dispose_subtree(self.node, backend);
        scene.dispose_material(self.day_material, backend);
        scene.dispose_material(self.night_material, backend);
    }
}
