//! The moon: one material over discrete distance-switched detail levels.

use std::time::Duration;

use glam::Vec3;
use terra_config::{EarthConfig, MoonLodLevel};
use terra_render::{
    ColorSpace, Material, MaterialId, Node, NodeId, NodeKind, RenderBackend, Scene,
    StandardMaterial, TextureImage, Transform, rgb_from_hex, uv_sphere,
};

use crate::error::AssetError;
use crate::source::TextureSource;
use crate::{LoadOptions, texture_path};

/// Tint used when the moon texture is unavailable.
const UNTEXTURED_MOON: u32 = 0xaaaaaa;

/// Handles to the moon's LOD node and its shared material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoonSystem {
    pub node: NodeId,
    pub material: MaterialId,
    /// Level meshes, nearest first.
    pub levels: Vec<NodeId>,
    pub textured: bool,
}

async fn load_optional<S: TextureSource>(
    source: &S,
    path: &str,
    timeout: Duration,
) -> Option<TextureImage> {
    match tokio::time::timeout(timeout, source.load(path)).await {
        Ok(Ok(image)) => Some(image),
        Ok(Err(e)) => {
            tracing::warn!("Moon texture {path} unavailable: {e}");
            None
        }
        Err(_) => {
            tracing::warn!("Moon texture {path} timed out");
            None
        }
    }
}

fn upload_optional(
    backend: &mut dyn RenderBackend,
    label: &str,
    image: Option<&TextureImage>,
    options: &LoadOptions,
    color_space: ColorSpace,
) -> Option<terra_render::TextureId> {
    let image = image?;
    backend
        .upload_texture(label, image, &options.texture_options(color_space))
        .inspect_err(|e| tracing::warn!("Moon texture {label} upload failed: {e}"))
        .ok()
}

/// Load the moon textures and add the moon under `parent`.
///
/// Missing textures fall back to a flat grey surface; only mesh uploads can
/// fail.
pub async fn create_moon_system<S: TextureSource>(
    scene: &mut Scene,
    backend: &mut dyn RenderBackend,
    parent: NodeId,
    source: &S,
    config: &EarthConfig,
    options: &LoadOptions,
) -> Result<MoonSystem, AssetError> {
    let timeout = Duration::from_millis(u64::from(config.init.asset_timeout_ms));
    let paths = &config.paths;
    let moon_path = texture_path(paths, &paths.moon);
    let bump_path = texture_path(paths, &paths.moon_bump);
    let (map, bump) = tokio::join!(
        load_optional(source, &moon_path, timeout),
        load_optional(source, &bump_path, timeout),
    );

    let map = upload_optional(backend, "moon", map.as_ref(), options, ColorSpace::Srgb);
    let bump = upload_optional(backend, "moon-bump", bump.as_ref(), options, ColorSpace::Linear);

    let moon = &config.moon;
    let levels: Vec<MoonLodLevel> = if moon.lod_levels.is_empty() {
        vec![MoonLodLevel {
            segments: moon.segments,
            distance: 0.0,
        }]
    } else {
        moon.lod_levels.clone()
    };

    let mut geometries = Vec::with_capacity(levels.len());
    for (i, level) in levels.iter().enumerate() {
        match backend.upload_mesh(&format!("moon-lod{i}"), &uv_sphere(moon.radius, level.segments)) {
            Ok(g) => geometries.push(g),
            Err(e) => {
                geometries.into_iter().for_each(|g| backend.release_geometry(g));
                map.into_iter().chain(bump).for_each(|t| backend.release_texture(t));
                return Err(e.into());
            }
        }
    }

    let material = scene.add_material(Material::Standard(StandardMaterial {
        color: if map.is_some() {
            Vec3::ONE
        } else {
            rgb_from_hex(UNTEXTURED_MOON)
        },
        map,
        bump_map: bump,
        bump_scale: moon.bump_scale,
        roughness: 0.9,
        metalness: 0.0,
        ..Default::default()
    }));

    let level_nodes: Vec<(Node, f32)> = geometries
        .into_iter()
        .zip(&levels)
        .enumerate()
        .map(|(i, (geometry, level))| {
            (
                Node::mesh(format!("moon-lod{i}"), geometry, material),
                level.distance,
            )
        })
        .collect();
    let node = scene.add_lod(
        parent,
        Node::new("moon", NodeKind::Group)
            .with_transform(Transform::from_position(Vec3::from(moon.start_position))),
        level_nodes,
    );
    let levels = scene
        .node(node)
        .map(|n| n.children().to_vec())
        .unwrap_or_default();

    tracing::info!(
        "Moon built with {} detail levels ({})",
        levels.len(),
        if map.is_some() { "textured" } else { "untextured" }
    );
    Ok(MoonSystem {
        node,
        material,
        levels,
        textured: map.is_some(),
    })
}
