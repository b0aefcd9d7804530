//! Texture loading and construction of the planet, moon and cloud meshes.
//!
//! Loads run concurrently on the current task. The planet's texture set is
//! raced against a timeout and fails with a value instead of hanging; the moon
//! and cloud layer degrade to untextured or invisible stand-ins.

mod clouds;
mod earth;
mod error;
mod moon;
mod source;

pub use clouds::{CloudLayer, create_cloud_layer};
pub use earth::{
    EarthSystem, EarthTextures, build_earth_system, create_earth_system, load_earth_textures,
};
pub use error::AssetError;
pub use moon::{MoonSystem, create_moon_system};
pub use source::{FileTextureSource, MemoryTextureSource, TextureSource, decode_texture};

use terra_config::TexturePaths;
use terra_render::{ColorSpace, RenderBackend, TextureId, TextureImage, TextureOptions};

/// Device-dependent choices made once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    /// Use the reduced sphere tessellation.
    pub mobile_geometry: bool,
    /// Lowers the anisotropy ceiling.
    pub is_mobile: bool,
    /// Highest anisotropy the backend supports.
    pub max_anisotropy: u16,
}

impl LoadOptions {
    /// `min(max, 4)` on mobile, `min(max, 16)` elsewhere.
    pub fn anisotropy(&self) -> u16 {
        let ceiling = if self.is_mobile { 4 } else { 16 };
        self.max_anisotropy.min(ceiling).max(1)
    }

    /// Upload options for a body texture: no vertical flip, no premultiplied
    /// alpha, mipmapped.
    pub fn texture_options(&self, color_space: ColorSpace) -> TextureOptions {
        TextureOptions {
            color_space,
            flip_y: false,
            premultiply_alpha: false,
            anisotropy: self.anisotropy(),
            generate_mipmaps: true,
        }
    }
}

/// Resolve a texture file name against the configured root.
pub fn texture_path(paths: &TexturePaths, file: &str) -> String {
    let root = paths.root.trim_end_matches('/');
    if root.is_empty() {
        file.to_string()
    } else {
        format!("{root}/{file}")
    }
}

/// Upload several textures; if one fails, the ones already uploaded are
/// released before the error is returned.
pub(crate) fn upload_textures(
    backend: &mut dyn RenderBackend,
    items: &[(&str, &TextureImage, TextureOptions)],
) -> Result<Vec<TextureId>, AssetError> {
    let mut uploaded = Vec::with_capacity(items.len());
    for (label, image, options) in items {
        match backend.upload_texture(label, image, options) {
            Ok(id) => uploaded.push(id),
            Err(e) => {
                for id in uploaded {
                    backend.release_texture(id);
                }
                return Err(e.into());
            }
        }
    }
    Ok(uploaded)
}
