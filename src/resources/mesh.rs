//! Mesh data structures, procedural generators and GPU upload

use std::ops::Range;

use glam::{Vec2, Vec3};

use crate::backend::{
    BackendResult, BufferDescriptor, BufferHandle, BufferUsage, GraphicsBackend, IndexFormat,
    PrimitiveTopology, Vertex,
};

/// Fraction of the lane ribbon taken by the shaft; the head fills the rest.
const LANE_SHAFT_END: f32 = 0.8;
const LANE_SHAFT_HALF_WIDTH: f32 = 0.35;
const LANE_HEAD_HALF_WIDTH: f32 = 0.8;

/// A contiguous index range drawn with one topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submesh {
    pub topology: PrimitiveTopology,
    pub index_range: Range<u32>,
}

/// A mesh with vertex and index data
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<Submesh>,
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vertices: Vec::new(),
            indices: Vec::new(),
            submeshes: Vec::new(),
        }
    }

    /// A mesh with nothing to draw
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty() || self.submeshes.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Get vertex data as bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Get index data as bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Append indices as a new submesh.
    pub fn push_submesh(&mut self, topology: PrimitiveTopology, indices: &[u32]) {
        let start = self.indices.len() as u32;
        self.indices.extend_from_slice(indices);
        self.submeshes.push(Submesh {
            topology,
            index_range: start..self.indices.len() as u32,
        });
    }

    /// Flat lane arrow lying in the XZ plane, facing +Y.
    ///
    /// The path coordinate runs along X from 0 to 1 and Z is the lateral
    /// offset in meters; the arrow vertex stage maps X onto the curve
    /// parameter. `segments` controls how finely the shaft bends.
    pub fn lane(segments: u32) -> Self {
        let segments = segments.max(1);
        let mut mesh = Mesh::new("lane");
        let mut indices = Vec::new();

        for i in 0..=segments {
            let x = LANE_SHAFT_END * i as f32 / segments as f32;
            mesh.vertices.push(Vertex::new(
                Vec3::new(x, 0.0, -LANE_SHAFT_HALF_WIDTH),
                Vec3::Y,
                Vec2::new(x, 0.0),
            ));
            mesh.vertices.push(Vertex::new(
                Vec3::new(x, 0.0, LANE_SHAFT_HALF_WIDTH),
                Vec3::Y,
                Vec2::new(x, 1.0),
            ));
        }

        for i in 0..segments {
            let a0 = 2 * i;
            let b0 = a0 + 1;
            let a1 = a0 + 2;
            let b1 = a0 + 3;
            indices.extend_from_slice(&[a0, b0, a1, b0, b1, a1]);
        }

        let head = mesh.vertices.len() as u32;
        mesh.vertices.push(Vertex::new(
            Vec3::new(LANE_SHAFT_END, 0.0, -LANE_HEAD_HALF_WIDTH),
            Vec3::Y,
            Vec2::new(LANE_SHAFT_END, 0.0),
        ));
        mesh.vertices.push(Vertex::new(
            Vec3::new(LANE_SHAFT_END, 0.0, LANE_HEAD_HALF_WIDTH),
            Vec3::Y,
            Vec2::new(LANE_SHAFT_END, 1.0),
        ));
        mesh.vertices.push(Vertex::new(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::Y,
            Vec2::new(1.0, 0.5),
        ));
        indices.extend_from_slice(&[head, head + 1, head + 2]);

        mesh.push_submesh(PrimitiveTopology::TriangleList, &indices);
        mesh
    }

    /// Square ground grid of `2 * half_cells` cells per side, `spacing` meters apart.
    pub fn grid(half_cells: u32, spacing: f32) -> Self {
        let mut mesh = Mesh::new("grid");
        let mut indices = Vec::new();
        let extent = half_cells as f32 * spacing;
        let n = half_cells as i32;

        for i in -n..=n {
            let offset = i as f32 * spacing;
            for (from, to) in [
                (Vec3::new(offset, 0.0, -extent), Vec3::new(offset, 0.0, extent)),
                (Vec3::new(-extent, 0.0, offset), Vec3::new(extent, 0.0, offset)),
            ] {
                let base = mesh.vertices.len() as u32;
                mesh.vertices.push(Vertex::new(from, Vec3::Y, Vec2::ZERO));
                mesh.vertices.push(Vertex::new(to, Vec3::Y, Vec2::ONE));
                indices.extend_from_slice(&[base, base + 1]);
            }
        }

        mesh.push_submesh(PrimitiveTopology::LineList, &indices);
        mesh
    }

    /// Upload vertex and index data to the GPU
    pub fn upload<B: GraphicsBackend + ?Sized>(&self, backend: &mut B) -> BackendResult<GpuMesh> {
        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} vertices", self.name)),
                size: self.vertex_bytes().len() as u64,
                usage: BufferUsage::VERTEX,
            },
            self.vertex_bytes(),
        )?;
        let index_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} indices", self.name)),
                size: self.index_bytes().len() as u64,
                usage: BufferUsage::INDEX,
            },
            self.index_bytes(),
        )?;

        Ok(GpuMesh {
            name: self.name.clone(),
            vertex_buffer,
            index_buffer,
            index_format: IndexFormat::Uint32,
            submeshes: self.submeshes.clone(),
        })
    }
}

/// GPU-resident mesh buffers
#[derive(Debug, Clone)]
pub struct GpuMesh {
    pub name: String,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_format: IndexFormat,
    pub submeshes: Vec<Submesh>,
}

impl GpuMesh {
    pub fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        backend.destroy_buffer(self.vertex_buffer);
        backend.destroy_buffer(self.index_buffer);
    }
}

/// Resolves mesh assets by name
pub trait MeshSource {
    fn load(&self, name: &str) -> Option<Mesh>;
}

/// Procedural meshes shipped with the renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinMeshes;

impl BuiltinMeshes {
    pub const LANE: &'static str = "lane";
    pub const GRID: &'static str = "grid";
}

impl MeshSource for BuiltinMeshes {
    fn load(&self, name: &str) -> Option<Mesh> {
        match name {
            Self::LANE => Some(Mesh::lane(32)),
            Self::GRID => Some(Mesh::grid(20, 1.0)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;

    #[test]
    fn lane_triangles_face_up() {
        let mesh = Mesh::lane(8);
        assert!(!mesh.is_empty());
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize].position);
            let normal = (b - a).cross(c - a);
            assert!(normal.y > 0.0, "triangle {:?} winds clockwise from above", tri);
        }
    }

    #[test]
    fn lane_spans_unit_path() {
        let mesh = Mesh::lane(4);
        let xs: Vec<f32> = mesh.vertices.iter().map(|v| v.position.x).collect();
        assert_eq!(xs.iter().cloned().fold(f32::INFINITY, f32::min), 0.0);
        assert_eq!(xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max), 1.0);
        assert_eq!(mesh.submeshes.len(), 1);
        assert_eq!(mesh.submeshes[0].index_range, 0..mesh.index_count() as u32);
    }

    #[test]
    fn grid_is_a_line_list() {
        let mesh = Mesh::grid(2, 1.0);
        assert_eq!(mesh.submeshes[0].topology, PrimitiveTopology::LineList);
        // 5 lines along each axis, two vertices each
        assert_eq!(mesh.vertex_count(), 20);
        assert_eq!(mesh.index_count() % 2, 0);
    }

    #[test]
    fn builtin_source_knows_its_meshes() {
        assert!(BuiltinMeshes.load("lane").is_some());
        assert!(BuiltinMeshes.load("grid").is_some());
        assert!(BuiltinMeshes.load("teapot").is_none());
    }

    #[test]
    fn upload_creates_two_buffers() {
        let mut backend = DummyBackend::default();
        let gpu = Mesh::lane(2).upload(&mut backend).unwrap();
        assert_eq!(backend.live_buffer_count(), 2);
        assert_ne!(gpu.vertex_buffer, gpu.index_buffer);
        gpu.destroy(&mut backend);
        assert_eq!(backend.live_buffer_count(), 0);
    }
}
