use std::time::Duration;

use terra_render::RenderError;

/// Errors produced while loading textures or building meshes.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// The texture file could not be read.
    #[error("failed to read texture {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The texture bytes are not a supported image.
    #[error("failed to decode texture {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    /// The source has no texture under this path.
    #[error("texture {0} is unavailable")]
    Missing(String),

    /// The combined load did not finish in time.
    #[error("texture loading timed out after {0:?}")]
    Timeout(Duration),

    /// The backend rejected an upload.
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl AssetError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
