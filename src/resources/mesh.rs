//! Mesh data structures and GPU lifecycle
//!
//! [`MeshData`] is plain CPU geometry. [`Mesh`] owns that data and is either
//! unrealized (CPU only) or realized (CPU data plus a [`GpuMesh`]); `generate`
//! is the only transition into the realized state and `destroy` the only way
//! back.

use crate::backend::*;
use crate::error::{RenderError, RenderResult};
use glam::{Vec2, Vec3, Vec4};
use std::borrow::Cow;

/// How a mesh's indices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawType {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl DrawType {
    /// Topology the mesh is uploaded with. Line loops are uploaded as closed
    /// line strips and triangle fans as triangle lists.
    pub fn topology(self) -> PrimitiveTopology {
        match self {
            DrawType::Points => PrimitiveTopology::PointList,
            DrawType::Lines => PrimitiveTopology::LineList,
            DrawType::LineStrip | DrawType::LineLoop => PrimitiveTopology::LineStrip,
            DrawType::Triangles | DrawType::TriangleFan => PrimitiveTopology::TriangleList,
            DrawType::TriangleStrip => PrimitiveTopology::TriangleStrip,
        }
    }
}

/// CPU-side vertex and index data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub draw_type: DrawType,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(draw_type: DrawType) -> Self {
        Self {
            draw_type,
            ..Default::default()
        }
    }

    /// Calculate vertex count
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Calculate index count
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Append one triangle. Indices are not validated.
    pub fn add_face(&mut self, a: u32, b: u32, c: u32) -> &mut Self {
        self.indices.extend_from_slice(&[a, b, c]);
        self
    }

    /// Append one triangle whose indices are relative to `offset`.
    pub fn add_face_offset(&mut self, offset: u32, a: u32, b: u32, c: u32) -> &mut Self {
        self.add_face(
            offset.wrapping_add(a),
            offset.wrapping_add(b),
            offset.wrapping_add(c),
        )
    }

    /// Append another mesh's geometry, re-basing its indices past the
    /// vertices already present.
    pub fn append(&mut self, other: &MeshData) {
        if other.draw_type != self.draw_type {
            log::warn!(
                "Appending {:?} geometry to a {:?} mesh; keeping {:?}",
                other.draw_type,
                self.draw_type,
                self.draw_type
            );
        }
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| base.wrapping_add(*i)));
    }

    /// Triangles described by the indices under the current draw type.
    /// Point and line meshes have none.
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        let idx = &self.indices;
        match self.draw_type {
            DrawType::Triangles => idx.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect(),
            DrawType::TriangleStrip => idx
                .windows(3)
                .enumerate()
                .map(|(i, w)| {
                    // Every other strip triangle is wound the other way
                    if i % 2 == 0 {
                        [w[0], w[1], w[2]]
                    } else {
                        [w[1], w[0], w[2]]
                    }
                })
                .collect(),
            DrawType::TriangleFan => {
                if idx.len() < 3 {
                    return Vec::new();
                }
                (1..idx.len() - 1)
                    .map(|i| [idx[0], idx[i], idx[i + 1]])
                    .collect()
            }
            DrawType::Points | DrawType::Lines | DrawType::LineStrip | DrawType::LineLoop => {
                Vec::new()
            }
        }
    }

    /// Recompute every vertex normal from the faces that use it.
    ///
    /// Each face adds its unit normal to its three vertices; the sums are then
    /// normalized. Faces referencing missing vertices are ignored.
    pub fn generate_normals(&mut self) {
        if !self.draw_type.topology().is_triangles() {
            log::debug!("generate_normals: {:?} mesh has no faces", self.draw_type);
            return;
        }

        for vertex in &mut self.vertices {
            vertex.normal = Vec3::ZERO;
        }

        for [a, b, c] in self.triangles() {
            let (a, b, c) = (a as usize, b as usize, c as usize);
            let (Some(v0), Some(v1), Some(v2)) =
                (self.vertices.get(a), self.vertices.get(b), self.vertices.get(c))
            else {
                continue;
            };
            let normal = (v1.position - v0.position)
                .cross(v2.position - v1.position)
                .normalize_or_zero();
            self.vertices[a].normal += normal;
            self.vertices[b].normal += normal;
            self.vertices[c].normal += normal;
        }

        for vertex in &mut self.vertices {
            vertex.normal = vertex.normal.normalize_or_zero();
        }
    }

    /// Get vertex data as bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Indices as uploaded, lowered to the upload topology.
    pub fn gpu_indices(&self) -> Cow<'_, [u32]> {
        match self.draw_type {
            DrawType::LineLoop => match self.indices.first() {
                Some(&first) => {
                    let mut closed = self.indices.clone();
                    closed.push(first);
                    Cow::Owned(closed)
                }
                None => Cow::Borrowed(&self.indices),
            },
            DrawType::TriangleFan => Cow::Owned(self.triangles().concat()),
            _ => Cow::Borrowed(&self.indices),
        }
    }

    /// Unit quad in the XY plane facing +Z
    pub fn quad() -> Self {
        let mut data = MeshData::new(DrawType::Triangles);
        let corners = [
            (Vec3::new(-0.5, -0.5, 0.0), Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, -0.5, 0.0), Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, 0.5, 0.0), Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, 0.5, 0.0), Vec2::new(0.0, 0.0)),
        ];
        for (position, uv) in corners {
            data.vertices.push(Vertex {
                position,
                normal: Vec3::Z,
                uv,
                color: Vec4::ONE,
            });
        }
        data.add_face(0, 1, 2).add_face(2, 3, 0);
        data
    }

    /// Create a unit cube centered at origin
    pub fn cube() -> Self {
        let mut data = MeshData::new(DrawType::Triangles);

        let faces = [
            (Vec3::Z, Vec3::X),
            (-Vec3::Z, -Vec3::X),
            (Vec3::X, -Vec3::Z),
            (-Vec3::X, Vec3::Z),
            (Vec3::Y, Vec3::X),
            (-Vec3::Y, Vec3::X),
        ];

        for (face, (normal, right)) in faces.into_iter().enumerate() {
            let up = normal.cross(right);
            let center = normal * 0.5;
            let corners = [
                (center - right * 0.5 - up * 0.5, Vec2::new(0.0, 1.0)),
                (center + right * 0.5 - up * 0.5, Vec2::new(1.0, 1.0)),
                (center + right * 0.5 + up * 0.5, Vec2::new(1.0, 0.0)),
                (center - right * 0.5 + up * 0.5, Vec2::new(0.0, 0.0)),
            ];
            for (position, uv) in corners {
                data.vertices.push(Vertex {
                    position,
                    normal,
                    uv,
                    color: Vec4::ONE,
                });
            }
            let base = face as u32 * 4;
            data.add_face_offset(base, 0, 1, 2).add_face_offset(base, 2, 3, 0);
        }

        data
    }

    /// Create a UV sphere
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let mut data = MeshData::new(DrawType::Triangles);
        let segments = segments.max(3);
        let rings = rings.max(2);

        let segment_angle = 2.0 * std::f32::consts::PI / segments as f32;
        let ring_angle = std::f32::consts::PI / rings as f32;

        for ring in 0..=rings {
            let phi = ring as f32 * ring_angle;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for segment in 0..=segments {
                let theta = segment as f32 * segment_angle;
                let normal = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin());

                data.vertices.push(Vertex {
                    position: normal * 0.5,
                    normal: normal.normalize_or_zero(),
                    uv: Vec2::new(
                        segment as f32 / segments as f32,
                        ring as f32 / rings as f32,
                    ),
                    color: Vec4::ONE,
                });
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;
                data.add_face(current, current + 1, next)
                    .add_face(current + 1, next + 1, next);
            }
        }

        data
    }

    /// Create a plane on the XZ axis
    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        let mut data = MeshData::new(DrawType::Triangles);
        let subdivisions = subdivisions.max(1);

        let half_width = width / 2.0;
        let half_depth = depth / 2.0;
        let step_x = width / subdivisions as f32;
        let step_z = depth / subdivisions as f32;

        for z in 0..=subdivisions {
            for x in 0..=subdivisions {
                data.vertices.push(Vertex {
                    position: Vec3::new(
                        -half_width + x as f32 * step_x,
                        0.0,
                        -half_depth + z as f32 * step_z,
                    ),
                    normal: Vec3::Y,
                    uv: Vec2::new(x as f32 / subdivisions as f32, z as f32 / subdivisions as f32),
                    color: Vec4::ONE,
                });
            }
        }

        for z in 0..subdivisions {
            for x in 0..subdivisions {
                let current = z * (subdivisions + 1) + x;
                let next = current + subdivisions + 1;
                data.add_face(current, next, current + 1)
                    .add_face(current + 1, next, next + 1);
            }
        }

        data
    }
}

/// GPU buffers of a realized mesh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuMesh {
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    index_count: u32,
    topology: PrimitiveTopology,
}

impl GpuMesh {
    pub fn vertex_buffer(&self) -> BufferHandle {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> BufferHandle {
        self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    /// Bind the buffers and issue one indexed draw. The caller has bound a
    /// pipeline matching [`topology`](Self::topology). Records nothing when
    /// there are no indices.
    pub fn draw<B: GraphicsBackend + ?Sized>(&self, backend: &mut B) {
        if self.index_count == 0 {
            return;
        }
        backend.set_vertex_buffer(0, self.vertex_buffer, 0);
        backend.set_index_buffer(self.index_buffer, 0, IndexFormat::Uint32);
        backend.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

#[derive(Debug)]
enum MeshState {
    Unrealized,
    /// `None` for meshes without vertices.
    Realized(Option<GpuMesh>),
}

/// A mesh with vertex and index data
#[derive(Debug)]
pub struct Mesh {
    name: String,
    data: MeshData,
    state: MeshState,
}

impl Mesh {
    pub fn new(name: &str, data: MeshData) -> Self {
        Self {
            name: name.to_string(),
            data,
            state: MeshState::Unrealized,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &MeshData {
        &self.data
    }

    /// Mutable CPU data. Fails while realized; destroy first.
    pub fn data_mut(&mut self) -> RenderResult<&mut MeshData> {
        if self.is_realized() {
            return Err(RenderError::MeshRealized);
        }
        Ok(&mut self.data)
    }

    /// Append more geometry to an unrealized mesh.
    pub fn add_data(&mut self, data: &MeshData) -> RenderResult<()> {
        self.data_mut()?.append(data);
        Ok(())
    }

    pub fn draw_type(&self) -> DrawType {
        self.data.draw_type
    }

    pub fn is_realized(&self) -> bool {
        matches!(self.state, MeshState::Realized(_))
    }

    /// GPU buffers, when realized with geometry.
    pub fn gpu(&self) -> Option<&GpuMesh> {
        match &self.state {
            MeshState::Realized(gpu) => gpu.as_ref(),
            MeshState::Unrealized => None,
        }
    }

    /// Upload the CPU data. Does nothing if already realized.
    pub fn generate<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) -> RenderResult<()> {
        if self.is_realized() {
            return Ok(());
        }

        let indices = self.data.gpu_indices();
        if self.data.vertices.is_empty() {
            log::debug!("Mesh '{}' has no vertices, realized without buffers", self.name);
            self.state = MeshState::Realized(None);
            return Ok(());
        }

        let vertex_data = self.data.vertex_bytes();
        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} Vertex Buffer", self.name)),
                size: vertex_data.len() as u64,
                usage: BufferUsage::VERTEX,
            },
            vertex_data,
        )?;

        // Buffers can't be empty; an index-less mesh keeps one unused index
        let index_data: &[u8] = if indices.is_empty() {
            bytemuck::bytes_of(&0u32)
        } else {
            bytemuck::cast_slice(&*indices)
        };
        let index_buffer = match backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} Index Buffer", self.name)),
                size: index_data.len() as u64,
                usage: BufferUsage::INDEX,
            },
            index_data,
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                backend.destroy_buffer(vertex_buffer);
                return Err(e.into());
            }
        };

        let gpu = GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            topology: self.data.draw_type.topology(),
        };
        log::debug!(
            "Mesh '{}' realized: {} vertices, {} indices ({:?})",
            self.name,
            self.data.vertices.len(),
            gpu.index_count,
            gpu.topology
        );
        self.state = MeshState::Realized(Some(gpu));
        Ok(())
    }

    /// Realize if needed, then draw.
    pub fn draw<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) -> RenderResult<()> {
        self.generate(backend)?;
        if let Some(gpu) = self.gpu() {
            gpu.draw(backend);
        }
        Ok(())
    }

    /// Release the GPU buffers. Safe to call on an unrealized mesh.
    pub fn destroy<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        if let MeshState::Realized(Some(gpu)) =
            std::mem::replace(&mut self.state, MeshState::Unrealized)
        {
            backend.destroy_buffer(gpu.vertex_buffer);
            backend.destroy_buffer(gpu.index_buffer);
        }
    }
}

impl From<MeshData> for Mesh {
    fn from(data: MeshData) -> Self {
        Self::new("mesh", data)
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        if let MeshState::Realized(Some(gpu)) = &self.state {
            log::warn!(
                "Mesh '{}' dropped while realized; buffers {:?} and {:?} leaked",
                self.name,
                gpu.vertex_buffer,
                gpu.index_buffer
            );
        }
    }
}
