//! CPU mesh generation: UV spheres and planes.

use std::f32::consts::{PI, TAU};

use bytemuck::{Pod, Zeroable};

/// Vertex layout shared by every mesh pipeline: position, normal, uv.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

static_assertions::const_assert_eq!(std::mem::size_of::<MeshVertex>(), 32);

impl MeshVertex {
    /// Vertex buffer layout for the mesh shaders.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Indexed triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Latitude/longitude sphere. `segments` is used for both directions and is
/// clamped to at least 3 around and 2 from pole to pole. UV `v` is 0 at the
/// north pole so equirectangular images sample upright without flipping.
pub fn uv_sphere(radius: f32, segments: u32) -> MeshData {
    let width_segments = segments.max(3);
    let height_segments = segments.max(2);
    let mut vertices = Vec::with_capacity(((width_segments + 1) * (height_segments + 1)) as usize);

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        // Center the pole texel so the seam at the poles does not twist.
        let u_offset = if iy == 0 {
            0.5 / width_segments as f32
        } else if iy == height_segments {
            -0.5 / width_segments as f32
        } else {
            0.0
        };
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let (sin_v, cos_v) = (v * PI).sin_cos();
            let (sin_u, cos_u) = (u * TAU).sin_cos();
            let normal = [-cos_u * sin_v, cos_v, sin_u * sin_v];
            vertices.push(MeshVertex {
                position: [normal[0] * radius, normal[1] * radius, normal[2] * radius],
                normal,
                uv: [u + u_offset, v],
            });
        }
    }

    let row = width_segments + 1;
    let mut indices = Vec::with_capacity((6 * width_segments * (height_segments - 1)) as usize);
    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = iy * row + ix + 1;
            let b = iy * row + ix;
            let c = (iy + 1) * row + ix;
            let d = (iy + 1) * row + ix + 1;
            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    MeshData { vertices, indices }
}

/// Single-quad plane on the XY plane facing +Z. UV origin is top-left.
pub fn plane(width: f32, height: f32) -> MeshData {
    let (hw, hh) = (width * 0.5, height * 0.5);
    let normal = [0.0, 0.0, 1.0];
    let vertices = vec![
        MeshVertex {
            position: [-hw, hh, 0.0],
            normal,
            uv: [0.0, 0.0],
        },
        MeshVertex {
            position: [hw, hh, 0.0],
            normal,
            uv: [1.0, 0.0],
        },
        MeshVertex {
            position: [-hw, -hh, 0.0],
            normal,
            uv: [0.0, 1.0],
        },
        MeshVertex {
            position: [hw, -hh, 0.0],
            normal,
            uv: [1.0, 1.0],
        },
    ];
    MeshData {
        vertices,
        indices: vec![0, 2, 1, 2, 3, 1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_sphere_counts() {
        let mesh = uv_sphere(3.5, 64);
        assert_eq!(mesh.vertices.len(), 65 * 65);
        assert_eq!(mesh.triangle_count(), 64 * (2 * 64 - 2));
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn test_sphere_vertices_on_radius() {
        let mesh = uv_sphere(2.0, 16);
        for v in &mesh.vertices {
            let len = Vec3::from(v.position).length();
            assert!((len - 2.0).abs() < 1e-4, "vertex off sphere: {len}");
        }
    }

    #[test]
    fn test_sphere_winding_faces_outward() {
        let mesh = uv_sphere(1.0, 12);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(mesh.vertices[i as usize].position));
            let face = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(face.dot(centroid) > 0.0, "inward-facing triangle");
        }
    }

    #[test]
    fn test_sphere_north_pole_at_top_of_texture() {
        let mesh = uv_sphere(1.0, 8);
        let top = mesh
            .vertices
            .iter()
            .max_by(|a, b| a.position[1].total_cmp(&b.position[1]))
            .unwrap();
        assert_eq!(top.uv[1], 0.0);
    }

    #[test]
    fn test_degenerate_segments_clamped() {
        let mesh = uv_sphere(1.0, 0);
        assert_eq!(mesh.vertices.len(), 4 * 3);
        assert!(mesh.triangle_count() > 0);
    }

    #[test]
    fn test_plane_faces_positive_z() {
        let mesh = plane(3.5, 4.5);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(mesh.vertices[i as usize].position));
            assert!((b - a).cross(c - a).z > 0.0);
        }
        let xs: Vec<f32> = mesh.vertices.iter().map(|v| v.position[0]).collect();
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 1.75);
    }
}
