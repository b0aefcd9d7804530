//! Scene graph, camera, and GPU rendering for the Terra planet view.
//!
//! Scene state lives in a CPU-side [`Scene`] arena. A [`RenderBackend`] owns
//! GPU resources and draws a scene through a [`Camera`]. [`WgpuBackend`] is
//! the real renderer; [`HeadlessBackend`] tracks resources without a GPU.

pub mod backend;
pub mod bootstrap;
pub mod camera;
pub mod color;
pub mod depth;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod headless;
pub mod material;
pub mod scene;
pub mod screen;
pub mod texture;
pub mod wgpu_backend;

pub use backend::{
    BackendInfo, FrameStats, GeometryId, RenderBackend, ResourceCounts, StarAttributes, TextureId,
};
pub use bootstrap::{
    ContainerInfo, SceneBootstrap, apply_lighting, create_atmosphere, renderer_pixel_ratio,
    setup_scene,
};
pub use camera::{Camera, Projection, Ray};
pub use color::{hsl_to_rgb, parse_css_hex, rgb_from_hex, srgb_to_linear};
pub use depth::DepthBuffer;
pub use error::RenderError;
pub use geometry::{MeshData, MeshVertex, plane, uv_sphere};
pub use gpu::{AcquireError, RenderContext, RenderContextError, surface_config_for};
pub use headless::HeadlessBackend;
pub use material::{
    AtmosphereMaterial, BasicMaterial, Blending, Material, Side, StandardMaterial, StarMaterial,
};
pub use scene::{
    AmbientLight, DirectionalLight, DrawItem, DrawKind, LodLevel, MaterialId, Node, NodeId,
    NodeKind, Scene, SceneResources, Transform,
};
pub use screen::{ScreenRect, Viewport};
pub use texture::{ColorSpace, TextureImage, TextureOptions};
pub use wgpu_backend::WgpuBackend;
