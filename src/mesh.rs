use anyhow::{anyhow, Context, Result};
use glam::{Mat3, Mat4, Vec3};
use gltf::mesh::Mode;

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
}

impl ModelVertex {
    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
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
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// World-space axis-aligned bounding box of the decoded geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl ModelBounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self { min: Vec3::ZERO, max: Vec3::ZERO }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn max_extent(&self) -> f32 {
        let size = self.max - self.min;
        size.x.max(size.y).max(size.z)
    }
}

/// A glTF/GLB model flattened for a single draw: node world transforms are
/// baked into the vertices, per-primitive base colors baked into the vertex
/// color channel.
#[derive(Debug, Clone)]
pub struct DecodedModel {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub triangle_count: i64,
    pub bounds: ModelBounds,
}

impl DecodedModel {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Decodes a GLB or glTF byte buffer. External buffer/image references
/// cannot be resolved from a byte slice, so models that need them fail here
/// with the underlying importer error.
pub fn decode_model(bytes: &[u8]) -> Result<DecodedModel> {
    let (document, buffers, _images) =
        gltf::import_slice(bytes).context("Failed to parse glTF/GLB data")?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| anyhow!("Model contains no scenes"))?;

    let mut vertices: Vec<ModelVertex> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut triangles = 0.0f64;

    for node in scene.nodes() {
        bake_node(&node, Mat4::IDENTITY, &buffers, &mut vertices, &mut indices, &mut triangles);
    }

    let bounds = if vertices.is_empty() {
        ModelBounds::empty()
    } else {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for vertex in &vertices {
            let pos = Vec3::from_array(vertex.position);
            min = min.min(pos);
            max = max.max(pos);
        }
        ModelBounds::new(min, max)
    };

    Ok(DecodedModel { vertices, indices, triangle_count: triangles.round() as i64, bounds })
}

fn bake_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    vertices: &mut Vec<ModelVertex>,
    indices: &mut Vec<u32>,
    triangles: &mut f64,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
        for primitive in mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                continue;
            }
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let positions: Vec<Vec3> = match reader.read_positions() {
                Some(it) => it.map(Vec3::from_array).collect(),
                None => continue,
            };
            if positions.is_empty() {
                continue;
            }

            let read_indices: Option<Vec<u32>> =
                reader.read_indices().map(|read| read.into_u32().collect());
            let indexed = read_indices.is_some();
            let local_indices: Vec<u32> =
                read_indices.unwrap_or_else(|| (0..positions.len() as u32).collect());

            let mut normals: Vec<Vec3> = reader
                .read_normals()
                .map(|it| it.map(Vec3::from_array).collect())
                .unwrap_or_default();
            if normals.len() != positions.len()
                || normals.iter().all(|n| n.length_squared() == 0.0)
            {
                normals = compute_normals(&positions, &local_indices);
            }

            let color = primitive.material().pbr_metallic_roughness().base_color_factor();

            // Indexed primitives count index/3 triangles, unindexed count
            // vertex/3; the mesh-level total is rounded once at the end.
            if indexed {
                *triangles += local_indices.len() as f64 / 3.0;
            } else {
                *triangles += positions.len() as f64 / 3.0;
            }

            let base_vertex = vertices.len() as u32;
            vertices.extend(positions.iter().zip(normals.iter()).map(|(pos, norm)| {
                let world_pos = world.transform_point3(*pos);
                let world_norm = (normal_matrix * *norm).normalize_or_zero();
                ModelVertex {
                    position: world_pos.to_array(),
                    normal: world_norm.to_array(),
                    color,
                }
            }));
            indices.extend(local_indices.iter().map(|idx| idx + base_vertex));
        }
    }

    for child in node.children() {
        bake_node(&child, world, buffers, vertices, indices, triangles);
    }
}

fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks(3) {
        if tri.len() < 3 {
            continue;
        }
        let i0 = tri[0] as usize;
        let i1 = tri[1] as usize;
        let i2 = tri[2] as usize;
        if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
            continue;
        }
        let a = positions[i0];
        let b = positions[i1];
        let c = positions[i2];
        let normal = (b - a).cross(c - a);
        if normal.length_squared() > 0.0 {
            normals[i0] += normal;
            normals[i1] += normal;
            normals[i2] += normal;
        }
    }
    for normal in &mut normals {
        if normal.length_squared() > 0.0 {
            *normal = normal.normalize();
        } else {
            *normal = Vec3::Y;
        }
    }
    normals
}
