//! wgpu implementation of [`RenderBackend`].
//!
//! The scene renders into an HDR target sized `logical * pixel_ratio`, which
//! is tone mapped onto the window surface. Changing the pixel ratio therefore
//! changes the shading cost without touching the surface.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use rustc_hash::{FxHashMap, FxHashSet};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::backend::{
    BackendInfo, FrameStats, GeometryId, RenderBackend, ResourceCounts, StarAttributes, TextureId,
};
use crate::camera::Camera;
use crate::color::linear;
use crate::depth::DepthBuffer;
use crate::error::RenderError;
use crate::geometry::{MeshData, MeshVertex};
use crate::gpu::{AcquireError, RenderContext};
use crate::material::{Blending, Material, Side};
use crate::scene::{DrawKind, MaterialId, NodeId, Scene};
use crate::texture::{ColorSpace, TextureImage, TextureOptions, mip_level_count, prepare_pixels};

const MESH_SHADER_SOURCE: &str = include_str!("shaders/mesh.wgsl");
const STAR_SHADER_SOURCE: &str = include_str!("shaders/stars.wgsl");
const COMPOSITE_SHADER_SOURCE: &str = include_str!("shaders/composite.wgsl");
const BLIT_SHADER_SOURCE: &str = include_str!("shaders/blit.wgsl");

const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct FrameUniform {
    view_proj: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    sun_dir: [f32; 4],
    sun_color: [f32; 4],
    ambient: [f32; 4],
    viewport: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct MaterialUniform {
    color: [f32; 4],
    emissive: [f32; 4],
    surface: [f32; 4],
    maps: [f32; 4],
    rayleigh: [f32; 4],
    mie: [f32; 4],
    scatter: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct StarUniform {
    transition: f32,
    time: f32,
    twinkle_speed: f32,
    size_attenuation: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct ObjectUniform {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct CompositeUniform {
    exposure: f32,
    _pad: [f32; 3],
}

/// Static per-star instance data. Targets live in a separate buffer so they
/// can be rewritten without touching the rest.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct StarVertex {
    origin: [f32; 3],
    size: f32,
    color: [f32; 3],
    _pad: f32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<FrameUniform>() % 16, 0);
static_assertions::const_assert_eq!(std::mem::size_of::<MaterialUniform>() % 16, 0);
static_assertions::const_assert_eq!(std::mem::size_of::<StarUniform>(), 16);
static_assertions::const_assert_eq!(std::mem::size_of::<StarVertex>(), 32);

const STAR_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32, 2 => Float32x3];
const TARGET_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![3 => Float32x3];

fn star_buffer_layouts() -> [wgpu::VertexBufferLayout<'static>; 2] {
    [
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<StarVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &STAR_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: 12,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &TARGET_ATTRIBUTES,
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ShaderKind {
    Standard,
    Basic,
    Atmosphere,
    Stars,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    shader: ShaderKind,
    blending: Blending,
    transparent: bool,
    side: Side,
    depth_write: bool,
}

impl PipelineKey {
    fn for_material(material: &Material) -> Self {
        let shader = match material {
            Material::Standard(_) => ShaderKind::Standard,
            Material::Basic(_) => ShaderKind::Basic,
            Material::Atmosphere(_) => ShaderKind::Atmosphere,
            Material::Stars(_) => ShaderKind::Stars,
        };
        Self {
            shader,
            blending: material.blending(),
            transparent: material.is_transparent(),
            side: material.side(),
            depth_write: material.depth_write(),
        }
    }

    fn blend(&self) -> Option<wgpu::BlendState> {
        match (self.blending, self.transparent) {
            (Blending::Additive, _) => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
            (Blending::Normal, true) => Some(wgpu::BlendState::ALPHA_BLENDING),
            (Blending::Normal, false) => None,
        }
    }

    fn cull_mode(&self) -> Option<wgpu::Face> {
        match self.side {
            Side::Front => Some(wgpu::Face::Back),
            Side::Back => Some(wgpu::Face::Front),
            Side::Double => None,
        }
    }
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

enum GpuGeometry {
    Mesh {
        vertices: wgpu::Buffer,
        indices: wgpu::Buffer,
        index_count: u32,
    },
    Stars {
        instances: wgpu::Buffer,
        targets: wgpu::Buffer,
        count: u32,
    },
}

struct GpuMaterial {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    kind: ShaderKind,
    bound: [Option<TextureId>; 4],
}

struct GpuObject {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Scaled HDR color target, its depth buffer, and the composite bind group
/// that samples it.
struct SceneTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    depth: DepthBuffer,
    composite_bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// Generates mip chains by repeated fullscreen blits.
struct MipGenerator {
    shader: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    pipelines: FxHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl MipGenerator {
    fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("terra-blit-shader"),
            source: wgpu::ShaderSource::Wgsl(BLIT_SHADER_SOURCE.into()),
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("terra-blit-bgl"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("terra-blit-layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("terra-blit-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self {
            shader,
            layout,
            bind_group_layout,
            sampler,
            pipelines: FxHashMap::default(),
        }
    }

    fn generate(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texture: &wgpu::Texture,
        format: wgpu::TextureFormat,
        mip_count: u32,
    ) {
        let pipeline = self.pipelines.entry(format).or_insert_with(|| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("terra-mipmap-pipeline"),
                layout: Some(&self.layout),
                vertex: wgpu::VertexState {
                    module: &self.shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &self.shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview_mask: None,
                cache: None,
            })
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("terra-mipmap-encoder"),
        });
        for level in 1..mip_count {
            let src_view = texture.create_view(&wgpu::TextureViewDescriptor {
                base_mip_level: level - 1,
                mip_level_count: Some(1),
                ..Default::default()
            });
            let dst_view = texture.create_view(&wgpu::TextureViewDescriptor {
                base_mip_level: level,
                mip_level_count: Some(1),
                ..Default::default()
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("terra-mipmap-bg"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&src_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("terra-mipmap-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &dst_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        queue.submit(std::iter::once(encoder.finish()));
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn vec4(v: Vec3, w: f32) -> [f32; 4] {
    [v.x, v.y, v.z, w]
}

fn flag(present: bool) -> f32 {
    if present { 1.0 } else { 0.0 }
}

fn material_uniform(material: &Material, bound: &[Option<TextureId>; 4]) -> MaterialUniform {
    let [map, normal, emissive, bump] = bound.map(|t| flag(t.is_some()));
    match material {
        Material::Standard(m) => MaterialUniform {
            color: vec4(linear(m.color), m.opacity),
            emissive: vec4(linear(m.emissive), m.emissive_intensity),
            surface: [m.roughness, m.metalness, m.bump_scale, m.normal_scale],
            maps: [map, normal, emissive, bump],
            ..Default::default()
        },
        Material::Basic(m) => MaterialUniform {
            color: vec4(linear(m.color), m.opacity),
            maps: [map, 0.0, 0.0, 0.0],
            ..Default::default()
        },
        Material::Atmosphere(m) => MaterialUniform {
            rayleigh: vec4(linear(m.rayleigh_color), m.rayleigh_intensity),
            mie: vec4(linear(m.mie_color), m.mie_intensity),
            scatter: [m.fresnel_power, m.scattering_strength, 0.0, 0.0],
            ..Default::default()
        },
        Material::Stars(_) => MaterialUniform::default(),
    }
}

/// Texture slots in binding order: color, normal, emissive, bump.
fn material_slots(material: &Material) -> [Option<TextureId>; 4] {
    match material {
        Material::Standard(m) => [m.map, m.normal_map, m.emissive_map, m.bump_map],
        Material::Basic(m) => [m.map, None, None, None],
        Material::Atmosphere(_) | Material::Stars(_) => [None; 4],
    }
}

fn normal_matrix(world: Mat4) -> Mat4 {
    if world.determinant().abs() < 1e-12 {
        world
    } else {
        world.inverse().transpose()
    }
}

/// GPU renderer drawing into a window surface.
pub struct WgpuBackend {
    ctx: RenderContext,
    window: Arc<Window>,
    logical: (f32, f32),
    pixel_ratio: f32,

    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    material_layout: wgpu::BindGroupLayout,
    star_layout: wgpu::BindGroupLayout,
    object_layout: wgpu::BindGroupLayout,
    composite_layout: wgpu::BindGroupLayout,
    mesh_pipeline_layout: wgpu::PipelineLayout,
    star_pipeline_layout: wgpu::PipelineLayout,
    mesh_shader: wgpu::ShaderModule,
    star_shader: wgpu::ShaderModule,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,

    composite_pipeline: wgpu::RenderPipeline,
    composite_buffer: wgpu::Buffer,
    target_sampler: wgpu::Sampler,
    target: SceneTarget,

    fallback: GpuTexture,
    mipmaps: MipGenerator,
    textures: FxHashMap<TextureId, GpuTexture>,
    geometries: FxHashMap<GeometryId, GpuGeometry>,
    materials: FxHashMap<MaterialId, GpuMaterial>,
    objects: FxHashMap<NodeId, GpuObject>,
    next_id: u64,
    disposed: bool,
}

impl WgpuBackend {
    /// Create a backend for `window`, drawing at `logical` size.
    pub fn new(window: Arc<Window>, logical: (f32, f32), pixel_ratio: f32) -> Result<Self, RenderError> {
        let ctx = pollster::block_on(RenderContext::new(window.clone()))?;
        let device = &ctx.device;

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("terra-frame-bgl"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("terra-material-bgl"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                sampler_entry(1),
                texture_entry(2),
                texture_entry(3),
                texture_entry(4),
                texture_entry(5),
            ],
        });
        let star_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("terra-star-bgl"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("terra-object-bgl"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        });
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("terra-composite-bgl"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                texture_entry(1),
                sampler_entry(2),
            ],
        });

        let mesh_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("terra-mesh-layout"),
            bind_group_layouts: &[&frame_layout, &material_layout, &object_layout],
            immediate_size: 0,
        });
        let star_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("terra-star-layout"),
            bind_group_layouts: &[&frame_layout, &star_layout, &object_layout],
            immediate_size: 0,
        });
        let composite_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("terra-composite-layout"),
                bind_group_layouts: &[&composite_layout],
                immediate_size: 0,
            });

        let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("terra-mesh-shader"),
            source: wgpu::ShaderSource::Wgsl(MESH_SHADER_SOURCE.into()),
        });
        let star_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("terra-star-shader"),
            source: wgpu::ShaderSource::Wgsl(STAR_SHADER_SOURCE.into()),
        });
        let composite_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("terra-composite-shader"),
            source: wgpu::ShaderSource::Wgsl(COMPOSITE_SHADER_SOURCE.into()),
        });

        let composite_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("terra-composite-pipeline"),
            layout: Some(&composite_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &composite_shader,
                entry_point: Some("vs_fullscreen"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &composite_shader,
                entry_point: Some("fs_composite"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.format(),
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview_mask: None,
            cache: None,
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("terra-frame-uniform"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("terra-frame-bg"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });
        let composite_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("terra-composite-uniform"),
            size: std::mem::size_of::<CompositeUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let target_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("terra-target-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let pixel_ratio = pixel_ratio.clamp(0.25, 4.0);
        let (width, height) = scaled_size(logical, pixel_ratio, device.limits().max_texture_dimension_2d);
        let target = create_scene_target(
            device,
            &composite_layout,
            &composite_buffer,
            &target_sampler,
            width,
            height,
        );
        let fallback = upload_gpu_texture(
            device,
            &ctx.queue,
            None,
            "terra-fallback-white",
            &TextureImage::solid([255; 4]),
            &TextureOptions {
                generate_mipmaps: false,
                ..TextureOptions::linear()
            },
        );
        let mipmaps = MipGenerator::new(device);

        log::info!("Scene target {width}x{height} (pixel ratio {pixel_ratio})");

        Ok(Self {
            ctx,
            window,
            logical,
            pixel_ratio,
            frame_buffer,
            frame_bind_group,
            material_layout,
            star_layout,
            object_layout,
            composite_layout,
            mesh_pipeline_layout,
            star_pipeline_layout,
            mesh_shader,
            star_shader,
            pipelines: FxHashMap::default(),
            composite_pipeline,
            composite_buffer,
            target_sampler,
            target,
            fallback,
            mipmaps,
            textures: FxHashMap::default(),
            geometries: FxHashMap::default(),
            materials: FxHashMap::default(),
            objects: FxHashMap::default(),
            next_id: 1,
            disposed: false,
        })
    }

    fn check(&self) -> Result<(), RenderError> {
        if self.disposed {
            Err(RenderError::Disposed)
        } else {
            Ok(())
        }
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn rebuild_target(&mut self) {
        let max = self.ctx.device.limits().max_texture_dimension_2d;
        let (width, height) = scaled_size(self.logical, self.pixel_ratio, max);
        if width == self.target.width && height == self.target.height {
            return;
        }
        self.target = create_scene_target(
            &self.ctx.device,
            &self.composite_layout,
            &self.composite_buffer,
            &self.target_sampler,
            width,
            height,
        );
        log::debug!("Scene target resized to {width}x{height}");
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        let mesh_buffers = [MeshVertex::layout()];
        let star_buffers = star_buffer_layouts();
        let (module, layout, vs, fs, buffers): (_, _, _, _, &[wgpu::VertexBufferLayout]) =
            match key.shader {
                ShaderKind::Standard => (&self.mesh_shader, &self.mesh_pipeline_layout, "vs_mesh", "fs_standard", &mesh_buffers),
                ShaderKind::Basic => (&self.mesh_shader, &self.mesh_pipeline_layout, "vs_mesh", "fs_basic", &mesh_buffers),
                ShaderKind::Atmosphere => (&self.mesh_shader, &self.mesh_pipeline_layout, "vs_mesh", "fs_atmosphere", &mesh_buffers),
                ShaderKind::Stars => (&self.star_shader, &self.star_pipeline_layout, "vs_stars", "fs_stars", &star_buffers),
            };
        log::debug!("Creating pipeline {key:?}");
        let pipeline = self
            .ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("terra-scene-pipeline"),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some(vs),
                    buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: key.cull_mode(),
                    ..Default::default()
                },
                depth_stencil: Some(DepthBuffer::state(key.depth_write)),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(fs),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: HDR_FORMAT,
                        blend: key.blend(),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview_mask: None,
                cache: None,
            });
        self.pipelines.insert(key, pipeline);
    }

    fn prepare_material(&mut self, id: MaterialId, material: &Material) {
        let kind = PipelineKey::for_material(material).shader;
        let bound = material_slots(material).map(|slot| slot.filter(|t| self.textures.contains_key(t)));
        let stale = self
            .materials
            .get(&id)
            .is_none_or(|g| g.kind != kind || g.bound != bound);

        if stale {
            let device = &self.ctx.device;
            let gpu = if let Material::Stars(_) = material {
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("terra-star-uniform"),
                    size: std::mem::size_of::<StarUniform>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("terra-star-bg"),
                    layout: &self.star_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });
                GpuMaterial {
                    buffer,
                    bind_group,
                    kind,
                    bound,
                }
            } else {
                let views: [&GpuTexture; 4] =
                    bound.map(|slot| slot.and_then(|t| self.textures.get(&t)).unwrap_or(&self.fallback));
                let sampler = bound
                    .iter()
                    .flatten()
                    .find_map(|t| self.textures.get(t))
                    .map_or(&self.fallback.sampler, |t| &t.sampler);
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("terra-material-uniform"),
                    size: std::mem::size_of::<MaterialUniform>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("terra-material-bg"),
                    layout: &self.material_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: buffer.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(&views[0].view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::TextureView(&views[1].view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 4,
                            resource: wgpu::BindingResource::TextureView(&views[2].view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 5,
                            resource: wgpu::BindingResource::TextureView(&views[3].view),
                        },
                    ],
                });
                GpuMaterial {
                    buffer,
                    bind_group,
                    kind,
                    bound,
                }
            };
            self.materials.insert(id, gpu);
        }

        if let Some(gpu) = self.materials.get(&id) {
            match material {
                Material::Stars(m) => {
                    let uniform = StarUniform {
                        transition: m.transition.clamp(0.0, 1.0),
                        time: m.time,
                        twinkle_speed: m.twinkle_speed,
                        size_attenuation: m.size_attenuation,
                    };
                    self.ctx
                        .queue
                        .write_buffer(&gpu.buffer, 0, bytemuck::bytes_of(&uniform));
                }
                _ => {
                    let uniform = material_uniform(material, &gpu.bound);
                    self.ctx
                        .queue
                        .write_buffer(&gpu.buffer, 0, bytemuck::bytes_of(&uniform));
                }
            }
        }
    }

    fn prepare_object(&mut self, node: NodeId, world: Mat4) {
        let uniform = ObjectUniform {
            model: world.to_cols_array_2d(),
            normal_matrix: normal_matrix(world).to_cols_array_2d(),
        };
        if let Some(object) = self.objects.get(&node) {
            self.ctx
                .queue
                .write_buffer(&object.buffer, 0, bytemuck::bytes_of(&uniform));
            return;
        }
        let buffer = self
            .ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("terra-object-uniform"),
                contents: bytemuck::bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("terra-object-bg"),
            layout: &self.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        self.objects.insert(node, GpuObject { buffer, bind_group });
    }

    fn write_frame(&self, scene: &Scene, camera: &Camera) {
        let ambient = linear(scene.ambient.color) * scene.ambient.intensity;
        let uniform = FrameUniform {
            view_proj: camera.view_projection_matrix().to_cols_array_2d(),
            view: camera.view_matrix().to_cols_array_2d(),
            camera_pos: vec4(camera.position, 1.0),
            sun_dir: vec4(scene.sun.direction(), scene.sun.intensity),
            sun_color: vec4(linear(scene.sun.color), 1.0),
            ambient: vec4(ambient, 1.0),
            viewport: [self.target.width as f32, self.target.height as f32, 0.0, 0.0],
        };
        self.ctx
            .queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&uniform));
        let composite = CompositeUniform {
            exposure: scene.exposure,
            _pad: [0.0; 3],
        };
        self.ctx
            .queue
            .write_buffer(&self.composite_buffer, 0, bytemuck::bytes_of(&composite));
    }
}

fn scaled_size(logical: (f32, f32), pixel_ratio: f32, max: u32) -> (u32, u32) {
    let scale = |v: f32| ((v.max(1.0) * pixel_ratio).round() as u32).clamp(1, max.max(1));
    (scale(logical.0), scale(logical.1))
}

fn create_scene_target(
    device: &wgpu::Device,
    composite_layout: &wgpu::BindGroupLayout,
    composite_buffer: &wgpu::Buffer,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
) -> SceneTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("terra-scene-hdr"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: HDR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let composite_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("terra-composite-bg"),
        layout: composite_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: composite_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    SceneTarget {
        _texture: texture,
        view,
        depth: DepthBuffer::new(device, width, height),
        composite_bind_group,
        width,
        height,
    }
}

fn upload_gpu_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    mipmaps: Option<&mut MipGenerator>,
    label: &str,
    image: &TextureImage,
    options: &TextureOptions,
) -> GpuTexture {
    let format = match options.color_space {
        ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
    };
    let mip_levels = if options.generate_mipmaps && mipmaps.is_some() {
        mip_level_count(image.width, image.height)
    } else {
        1
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: mip_levels,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &prepare_pixels(image, options),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(image.width * 4),
            rows_per_image: None,
        },
        wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        },
    );
    if let Some(generator) = mipmaps
        && mip_levels > 1
    {
        generator.generate(device, queue, &texture, format, mip_levels);
    }

    let anisotropy = if mip_levels > 1 {
        options.anisotropy.clamp(1, 16)
    } else {
        1
    };
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Linear,
        anisotropy_clamp: anisotropy,
        ..Default::default()
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        _texture: texture,
        view,
        sampler,
    }
}

impl RenderBackend for WgpuBackend {
    fn info(&self) -> BackendInfo {
        let info = self.ctx.adapter.get_info();
        BackendInfo {
            name: format!("{} ({:?})", info.name, info.backend),
            max_anisotropy: 16,
        }
    }

    fn upload_texture(
        &mut self,
        label: &str,
        image: &TextureImage,
        options: &TextureOptions,
    ) -> Result<TextureId, RenderError> {
        self.check()?;
        image.validate()?;
        let gpu = upload_gpu_texture(
            &self.ctx.device,
            &self.ctx.queue,
            Some(&mut self.mipmaps),
            label,
            image,
            options,
        );
        let id = TextureId::from_raw(self.next());
        self.textures.insert(id, gpu);
        log::debug!("Uploaded texture '{label}' ({}x{})", image.width, image.height);
        Ok(id)
    }

    fn upload_mesh(&mut self, label: &str, mesh: &MeshData) -> Result<GeometryId, RenderError> {
        self.check()?;
        let device = &self.ctx.device;
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let id = GeometryId::from_raw(self.next());
        self.geometries.insert(
            id,
            GpuGeometry::Mesh {
                vertices,
                indices,
                index_count: mesh.indices.len() as u32,
            },
        );
        Ok(id)
    }

    fn upload_stars(
        &mut self,
        label: &str,
        stars: StarAttributes<'_>,
    ) -> Result<GeometryId, RenderError> {
        self.check()?;
        stars.validate()?;
        let instances: Vec<StarVertex> = (0..stars.len())
            .map(|i| StarVertex {
                origin: stars.origins[i].to_array(),
                size: stars.sizes[i],
                color: linear(stars.colors[i]).to_array(),
                _pad: 0.0,
            })
            .collect();
        let targets: Vec<[f32; 3]> = stars.targets.iter().map(|t| t.to_array()).collect();
        let device = &self.ctx.device;
        let instances = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&instances),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let target_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&targets),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let id = GeometryId::from_raw(self.next());
        self.geometries.insert(
            id,
            GpuGeometry::Stars {
                instances,
                targets: target_buffer,
                count: stars.len() as u32,
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
        match self.geometries.get(&geometry) {
            Some(GpuGeometry::Stars {
                targets: buffer,
                count,
                ..
            }) => {
                if targets.len() != *count as usize {
                    let n = *count as usize;
                    return Err(RenderError::AttributeLength {
                        origins: n,
                        targets: targets.len(),
                        colors: n,
                        sizes: n,
                    });
                }
                let data: Vec<[f32; 3]> = targets.iter().map(|t| t.to_array()).collect();
                self.ctx
                    .queue
                    .write_buffer(buffer, 0, bytemuck::cast_slice(&data));
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
        if self.disposed {
            return;
        }
        self.logical = (width.max(1.0), height.max(1.0));
        let physical = self.window.inner_size();
        self.ctx.resize(physical.width, physical.height);
        self.rebuild_target();
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio.clamp(0.25, 4.0);
        if !self.disposed {
            self.rebuild_target();
        }
    }

    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) -> Result<FrameStats, RenderError> {
        self.check()?;
        let frame = match self.ctx.acquire() {
            Ok(frame) => frame,
            Err(AcquireError::Skip) => {
                log::debug!("Surface timeout, skipping frame");
                return Ok(FrameStats::default());
            }
            Err(AcquireError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(AcquireError::Lost) => return Err(RenderError::SurfaceLost),
        };

        let draws = scene.draw_list(camera);
        self.write_frame(scene, camera);

        let mut live_objects = FxHashSet::default();
        let mut keys = Vec::with_capacity(draws.len());
        for item in &draws {
            let Some(material) = scene.material(item.material) else {
                keys.push(None);
                continue;
            };
            let key = PipelineKey::for_material(material);
            self.ensure_pipeline(key);
            self.prepare_material(item.material, material);
            self.prepare_object(item.node, item.world);
            live_objects.insert(item.node);
            keys.push(Some(key));
        }
        self.objects.retain(|id, _| live_objects.contains(id));

        let surface_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("terra-frame-encoder"),
            });

        let mut stats = FrameStats::default();
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("terra-scene-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.target.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(DepthBuffer::CLEAR_VALUE),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_bind_group(0, &self.frame_bind_group, &[]);

            for (item, key) in draws.iter().zip(&keys) {
                let (Some(key), Some(geometry), Some(material), Some(object)) = (
                    key,
                    self.geometries.get(&item.geometry),
                    self.materials.get(&item.material),
                    self.objects.get(&item.node),
                ) else {
                    continue;
                };
                let Some(pipeline) = self.pipelines.get(key) else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(1, &material.bind_group, &[]);
                pass.set_bind_group(2, &object.bind_group, &[]);
                match (geometry, item.kind) {
                    (
                        GpuGeometry::Mesh {
                            vertices,
                            indices,
                            index_count,
                        },
                        DrawKind::Mesh,
                    ) => {
                        pass.set_vertex_buffer(0, vertices.slice(..));
                        pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                        pass.draw_indexed(0..*index_count, 0, 0..1);
                        stats.instances += 1;
                    }
                    (
                        GpuGeometry::Stars {
                            instances,
                            targets,
                            count,
                        },
                        DrawKind::Stars { .. },
                    ) => {
                        pass.set_vertex_buffer(0, instances.slice(..));
                        pass.set_vertex_buffer(1, targets.slice(..));
                        pass.draw(0..6, 0..*count);
                        stats.instances += count;
                    }
                    _ => {
                        log::warn!("Geometry/material kind mismatch on {:?}", item.node);
                        continue;
                    }
                }
                stats.draw_calls += 1;
            }
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("terra-composite-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&self.composite_pipeline);
            pass.set_bind_group(0, &self.target.composite_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        frame.present();
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
        if self.disposed {
            return;
        }
        self.objects.clear();
        self.materials.clear();
        self.geometries.clear();
        self.textures.clear();
        self.pipelines.clear();
        self.disposed = true;
        log::info!("Render backend disposed");
    }
}
