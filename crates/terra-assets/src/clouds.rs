//! The transparent cloud shell.

use terra_config::EarthConfig;
use terra_render::{
    ColorSpace, Material, MaterialId, Node, NodeId, RenderBackend, Scene, Side,
    StandardMaterial, uv_sphere,
};

use crate::source::TextureSource;
use crate::{LoadOptions, texture_path};

/// The cloud node, or an invisible placeholder group when loading failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudLayer {
    pub node: NodeId,
    pub material: Option<MaterialId>,
}

impl CloudLayer {
    /// An invisible stand-in group under `parent`.
    pub fn placeholder(scene: &mut Scene, parent: NodeId) -> Self {
        let mut node = Node::group("clouds");
        node.visible = false;
        Self {
            node: scene.add(parent, node),
            material: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.material.is_none()
    }
}

/// Load the cloud texture and add the shell under `parent`. Never fails:
/// any error yields an invisible placeholder.
pub async fn create_cloud_layer<S: TextureSource>(
    scene: &mut Scene,
    backend: &mut dyn RenderBackend,
    parent: NodeId,
    source: &S,
    config: &EarthConfig,
    options: &LoadOptions,
) -> CloudLayer {
    let path = texture_path(&config.paths, &config.paths.clouds);
    let image = match source.load(&path).await {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!("Cloud texture failed to load: {e}");
            return CloudLayer::placeholder(scene, parent);
        }
    };

    let texture_options = options
        .texture_options(ColorSpace::Srgb)
        .with_anisotropy(backend.info().max_anisotropy);
    let texture = match backend.upload_texture("clouds", &image, &texture_options) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!("Cloud texture upload failed: {e}");
            return CloudLayer::placeholder(scene, parent);
        }
    };

    let radius = config.earth.radius + config.clouds.altitude;
    let segments = config.earth_segments(options.mobile_geometry);
    let geometry = match backend.upload_mesh("clouds", &uv_sphere(radius, segments)) {
        Ok(g) => g,
        Err(e) => {
            tracing::warn!("Cloud mesh upload failed: {e}");
            backend.release_texture(texture);
            return CloudLayer::placeholder(scene, parent);
        }
    };

    let material = scene.add_material(Material::Standard(StandardMaterial {
        map: Some(texture),
        transparent: true,
        opacity: config.clouds.opacity,
        depth_write: false,
        side: Side::Double,
        ..Default::default()
    }));
    let mut node = Node::mesh("clouds", geometry, material);
    node.render_order = 1;
    CloudLayer {
        node: scene.add(parent, node),
        material: Some(material),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryTextureSource;
    use terra_render::{HeadlessBackend, TextureImage};

    fn options() -> LoadOptions {
        LoadOptions {
            mobile_geometry: true,
            is_mobile: true,
            max_anisotropy: 8,
        }
    }

    #[tokio::test]
    async fn test_cloud_shell_is_transparent() {
        let config = EarthConfig::default();
        let mut scene = Scene::new();
        let mut backend = HeadlessBackend::new(8);
        let root = scene.root();
        let source = MemoryTextureSource::new().with_fallback(TextureImage::solid([255; 4]));

        let clouds = create_cloud_layer(&mut scene, &mut backend, root, &source, &config, &options()).await;
        assert!(!clouds.is_placeholder());
        let material = scene
            .material(clouds.material.unwrap())
            .and_then(Material::as_standard)
            .unwrap();
        assert!(material.transparent);
        assert!(!material.depth_write);
        assert_eq!(material.opacity, 0.3);
        assert_eq!(material.side, Side::Double);
        let texture = material.map.unwrap();
        assert_eq!(backend.texture_options(texture).map(|o| o.anisotropy), Some(8));
    }

    #[tokio::test]
    async fn test_failure_yields_invisible_placeholder() {
        let config = EarthConfig::default();
        let mut scene = Scene::new();
        let mut backend = HeadlessBackend::default();
        let root = scene.root();

        let clouds = create_cloud_layer(
            &mut scene,
            &mut backend,
            root,
            &MemoryTextureSource::new(),
            &config,
            &options(),
        )
        .await;
        assert!(clouds.is_placeholder());
        assert!(!scene.node(clouds.node).unwrap().visible);
        assert!(backend.live_resources().is_empty());
    }
}
