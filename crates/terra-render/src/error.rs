//! Renderer error type.

use crate::backend::GeometryId;
use crate::gpu::RenderContextError;

/// Errors raised by render backends.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// GPU initialization failed.
    #[error("render context: {0}")]
    Context(#[from] RenderContextError),

    /// The swap chain could not be recovered.
    #[error("surface lost")]
    SurfaceLost,

    /// GPU ran out of memory.
    #[error("out of GPU memory")]
    OutOfMemory,

    /// Pixel data does not match the declared dimensions.
    #[error("texture {width}x{height} expects {expected} bytes, got {actual}")]
    TextureSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Star attribute arrays must have equal lengths.
    #[error("star attributes differ in length (origins {origins}, targets {targets}, colors {colors}, sizes {sizes})")]
    AttributeLength {
        origins: usize,
        targets: usize,
        colors: usize,
        sizes: usize,
    },

    /// The geometry handle is not (or no longer) known to the backend.
    #[error("unknown geometry {0:?}")]
    UnknownGeometry(GeometryId),

    /// The backend was disposed.
    #[error("render backend disposed")]
    Disposed,
}
