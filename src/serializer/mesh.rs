//! Versioned mesh import and export.
//!
//! The write path always emits the current format. The read path selects a
//! [`FormatVersion`] from the stream's sentinel string and dispatches on it
//! at the two points where the dialects actually differ: geometry layout
//! (unified vertex declaration vs. legacy discrete attribute chunks) and the
//! legacy texcoord V-axis convention.
//!
//! Readers at every nesting level follow the skip-back-and-recover pattern:
//! an unrecognized child chunk id causes a 6-byte backpedal and a return to
//! the caller, which either understands the chunk or backpedals again.

use std::io::{Read, Seek, Write};

use glam::{Vec3, Vec4};

use crate::errors::{RelicError, Result};
use crate::resources::buffer::{BufferManager, BufferUsage};
use crate::resources::mesh::{
    Edge, EdgeData, EdgeGroup, EdgeTriangle, LodUsage, Mesh, MeshLod, OperationType, SubMesh,
    VertexBoneAssignment,
};
use crate::resources::vertex::{
    IndexData, IndexType, VertexData, VertexElementSemantic, VertexElementType,
};
use crate::serializer::chunk::{
    ChunkHeader, ChunkReader, ChunkWriter, M_EDGE_GROUP, M_EDGE_LIST_LOD, M_EDGE_LISTS,
    M_GEOMETRY, M_GEOMETRY_COLOURS, M_GEOMETRY_NORMALS, M_GEOMETRY_TEXCOORDS,
    M_GEOMETRY_VERTEX_BUFFER, M_GEOMETRY_VERTEX_BUFFER_DATA, M_GEOMETRY_VERTEX_DECLARATION,
    M_GEOMETRY_VERTEX_ELEMENT, M_HEADER, M_MESH, M_MESH_BONE_ASSIGNMENT, M_MESH_BOUNDS,
    M_MESH_LOD, M_MESH_LOD_GENERATED, M_MESH_LOD_MANUAL, M_MESH_LOD_USAGE, M_MESH_SKELETON_LINK,
    M_SUBMESH, M_SUBMESH_BONE_ASSIGNMENT, M_SUBMESH_NAME_TABLE, M_SUBMESH_NAME_TABLE_ELEMENT,
    M_SUBMESH_OPERATION, index_payload_from_disk, index_payload_to_disk, vertex_payload_from_disk,
    vertex_payload_to_disk,
};

/// Mesh stream format revisions this serializer can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// Discrete attribute chunks, texcoord V stored flipped.
    V1_1,
    /// Discrete attribute chunks, modern texcoord convention.
    V1_2,
    /// Unified per-buffer vertex declarations. Current.
    V1_3,
}

impl FormatVersion {
    pub const LATEST: Self = Self::V1_3;

    #[must_use]
    pub fn sentinel(self) -> &'static str {
        match self {
            Self::V1_1 => "[MeshSerializer_v1.10]",
            Self::V1_2 => "[MeshSerializer_v1.20]",
            Self::V1_3 => "[MeshSerializer_v1.30]",
        }
    }

    #[must_use]
    pub fn from_sentinel(sentinel: &str) -> Option<Self> {
        match sentinel {
            "[MeshSerializer_v1.10]" => Some(Self::V1_1),
            "[MeshSerializer_v1.20]" => Some(Self::V1_2),
            "[MeshSerializer_v1.30]" => Some(Self::V1_3),
            _ => None,
        }
    }

    /// Whether streams of this revision carry unified vertex declarations.
    #[must_use]
    pub fn has_vertex_declarations(self) -> bool {
        matches!(self, Self::V1_3)
    }
}

/// Outcome of reading one geometry chunk.
///
/// `Empty` is the single recoverable anomaly in the format: a zero-vertex
/// geometry chunk. The mesh-level caller matches on it to skip the chunk and
/// continue; in every other position it hardens into a fatal condition.
enum GeometryError {
    Empty,
    Fatal(RelicError),
}

impl From<RelicError> for GeometryError {
    fn from(err: RelicError) -> Self {
        Self::Fatal(err)
    }
}

/// Reads and writes the chunked binary mesh format.
///
/// Stateless; one instance can serve any number of sequential calls but must
/// not be shared across threads mid-operation (the pipeline is
/// single-threaded throughout).
#[derive(Debug, Default)]
pub struct MeshSerializer;

impl MeshSerializer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Writes `mesh` in the current format.
    ///
    /// Bounds must already be computed: buffers may live in write-only
    /// device memory, so the serializer never reads them back to derive
    /// bounds itself.
    pub fn export<W: Write>(&self, mesh: &Mesh, out: &mut W) -> Result<()> {
        self.export_inner(mesh, out).map_err(|err| {
            log::error!("export of mesh '{}' failed: {err}", mesh.name());
            err
        })
    }

    /// Reads a mesh stream, dispatching to the reader dialect selected by
    /// the leading version chunk. Buffers are created through `buffers`.
    pub fn import<R: Read + Seek>(
        &self,
        name: &str,
        stream: R,
        buffers: &dyn BufferManager,
    ) -> Result<Mesh> {
        self.import_inner(name, stream, buffers).map_err(|err| {
            log::error!("import of mesh '{name}' failed: {err}");
            err
        })
    }

    fn export_inner<W: Write>(&self, mesh: &Mesh, out: &mut W) -> Result<()> {
        if mesh.bounds.is_none() {
            return Err(RelicError::InvalidParams(format!(
                "mesh '{}' has no bounds; compute bounds before export",
                mesh.name()
            )));
        }
        let mut writer = ChunkWriter::new();
        writer.begin_chunk(M_HEADER);
        writer.write_string(FormatVersion::LATEST.sentinel());
        writer.end_chunk()?;
        write_mesh(&mut writer, mesh)?;
        out.write_all(&writer.finish()?)?;
        Ok(())
    }

    fn import_inner<R: Read + Seek>(
        &self,
        name: &str,
        stream: R,
        buffers: &dyn BufferManager,
    ) -> Result<Mesh> {
        let mut chunk = ChunkReader::new(stream);
        let Some(header) = chunk.read_header()? else {
            return Err(RelicError::InvalidParams(format!(
                "mesh '{name}': stream is empty"
            )));
        };
        if header.id != M_HEADER {
            return Err(RelicError::InvalidParams(format!(
                "mesh '{name}': stream does not start with a format header chunk"
            )));
        }
        let sentinel = chunk.read_string()?;
        let Some(version) = FormatVersion::from_sentinel(&sentinel) else {
            return Err(RelicError::Unsupported(format!(
                "mesh '{name}': unsupported format version '{sentinel}'"
            )));
        };

        let Some(header) = chunk.read_header()? else {
            return Err(RelicError::ItemNotFound(format!(
                "mesh '{name}': missing mesh chunk"
            )));
        };
        if header.id != M_MESH {
            return Err(RelicError::ItemNotFound(format!(
                "mesh '{name}': expected mesh chunk, found {:#06x}",
                header.id
            )));
        }

        let mut reader = MeshReader {
            chunk,
            buffers,
            version,
        };
        let mut mesh = Mesh::new(name);
        // Legacy streams never stored edge lists; have them rebuilt.
        mesh.auto_build_edge_lists = !version.has_vertex_declarations();
        reader.read_mesh(&mut mesh)?;
        Ok(mesh)
    }
}

// ============================================================================
// Write Path
// ============================================================================

fn write_mesh(writer: &mut ChunkWriter, mesh: &Mesh) -> Result<()> {
    writer.begin_chunk(M_MESH);
    writer.write_bool(mesh.has_skeleton());

    if let Some(shared) = &mesh.shared_vertex_data {
        write_geometry(writer, shared)?;
    }
    for submesh in &mesh.submeshes {
        write_submesh(writer, mesh, submesh)?;
    }
    if let Some(skeleton) = &mesh.skeleton_name {
        writer.begin_chunk(M_MESH_SKELETON_LINK);
        writer.write_string(skeleton);
        writer.end_chunk()?;
    }
    for assignment in &mesh.bone_assignments {
        write_bone_assignment(writer, M_MESH_BONE_ASSIGNMENT, assignment)?;
    }
    if let Some(lod) = &mesh.lod {
        write_lod(writer, mesh, lod)?;
    }
    write_bounds(writer, mesh)?;
    if !mesh.submesh_names().is_empty() {
        write_submesh_name_table(writer, mesh)?;
    }
    if !mesh.edge_lists.is_empty() {
        write_edge_lists(writer, mesh)?;
    }

    writer.end_chunk()
}

fn write_geometry(writer: &mut ChunkWriter, data: &VertexData) -> Result<()> {
    writer.begin_chunk(M_GEOMETRY);
    writer.write_u32(data.vertex_count);

    writer.begin_chunk(M_GEOMETRY_VERTEX_DECLARATION);
    for element in data.declaration.elements() {
        writer.begin_chunk(M_GEOMETRY_VERTEX_ELEMENT);
        writer.write_u16(element.source);
        writer.write_u16(element.ty.to_disk());
        writer.write_u16(element.semantic.to_disk());
        writer.write_u16(element.offset);
        writer.write_u16(element.index);
        writer.end_chunk()?;
    }
    writer.end_chunk()?;

    for source in data.sources() {
        let buffer = data
            .binding(source)
            .expect("sources() yields bound sources only")
            .borrow();
        let vertex_size = buffer.vertex_size();
        let declared = data.declaration.vertex_size(source);
        if declared != vertex_size {
            return Err(RelicError::InternalError(format!(
                "vertex buffer for source {source} has stride {vertex_size} but its declaration requires {declared}"
            )));
        }
        let expected = vertex_size * data.vertex_count as usize;
        if buffer.size() != expected {
            return Err(RelicError::InternalError(format!(
                "vertex buffer for source {source} holds {} bytes, expected {expected}",
                buffer.size()
            )));
        }

        writer.begin_chunk(M_GEOMETRY_VERTEX_BUFFER);
        writer.write_u16(source);
        writer.write_u16(vertex_size as u16);
        writer.begin_chunk(M_GEOMETRY_VERTEX_BUFFER_DATA);
        let mut payload = buffer.bytes().to_vec();
        vertex_payload_to_disk(&data.declaration, source, vertex_size, &mut payload);
        writer.write_bytes(&payload);
        writer.end_chunk()?;
        writer.end_chunk()?;
    }

    writer.end_chunk()
}

fn write_submesh(writer: &mut ChunkWriter, mesh: &Mesh, submesh: &SubMesh) -> Result<()> {
    writer.begin_chunk(M_SUBMESH);
    writer.write_string(&submesh.material_name);
    writer.write_bool(submesh.use_shared_vertices);
    write_index_data(writer, &submesh.index_data)?;

    if submesh.use_shared_vertices {
        if mesh.shared_vertex_data.is_none() {
            return Err(RelicError::InvalidParams(format!(
                "submesh of mesh '{}' uses shared vertices but the mesh has no shared geometry",
                mesh.name()
            )));
        }
    } else {
        let Some(vertex_data) = &submesh.vertex_data else {
            return Err(RelicError::InvalidParams(format!(
                "submesh of mesh '{}' has neither shared nor dedicated geometry",
                mesh.name()
            )));
        };
        write_geometry(writer, vertex_data)?;
    }

    writer.begin_chunk(M_SUBMESH_OPERATION);
    writer.write_u16(submesh.operation.to_disk());
    writer.end_chunk()?;

    for assignment in &submesh.bone_assignments {
        write_bone_assignment(writer, M_SUBMESH_BONE_ASSIGNMENT, assignment)?;
    }

    writer.end_chunk()
}

fn write_index_data(writer: &mut ChunkWriter, index_data: &IndexData) -> Result<()> {
    let index_type = index_data.index_type();
    writer.write_u32(index_data.index_count);
    writer.write_bool(index_type == IndexType::U32);
    if index_data.index_count == 0 {
        return Ok(());
    }
    let Some(buffer) = &index_data.buffer else {
        return Err(RelicError::InternalError(format!(
            "index data declares {} indices but has no buffer",
            index_data.index_count
        )));
    };
    let buffer = buffer.borrow();
    let expected = index_data.index_count as usize * index_type.size();
    if buffer.size() != expected {
        return Err(RelicError::InternalError(format!(
            "index buffer holds {} bytes, expected {expected}",
            buffer.size()
        )));
    }
    let mut payload = buffer.bytes().to_vec();
    index_payload_to_disk(index_type, &mut payload);
    writer.write_bytes(&payload);
    Ok(())
}

fn write_bone_assignment(
    writer: &mut ChunkWriter,
    id: u16,
    assignment: &VertexBoneAssignment,
) -> Result<()> {
    writer.begin_chunk(id);
    writer.write_u32(assignment.vertex_index);
    writer.write_u16(assignment.bone_index);
    writer.write_f32(assignment.weight);
    writer.end_chunk()
}

fn write_lod(writer: &mut ChunkWriter, mesh: &Mesh, lod: &MeshLod) -> Result<()> {
    writer.begin_chunk(M_MESH_LOD);
    writer.write_u16(lod.level_count());
    writer.write_bool(lod.manual);

    for (level, usage) in lod.usages.iter().enumerate() {
        writer.begin_chunk(M_MESH_LOD_USAGE);
        writer.write_f32(usage.from_depth);
        if lod.manual {
            let Some(manual_name) = &usage.manual_name else {
                return Err(RelicError::InvalidParams(format!(
                    "manual LOD level {} of mesh '{}' names no alternate mesh",
                    level + 1,
                    mesh.name()
                )));
            };
            writer.begin_chunk(M_MESH_LOD_MANUAL);
            writer.write_string(manual_name);
            writer.end_chunk()?;
        } else {
            for submesh in &mesh.submeshes {
                let Some(index_data) = submesh.lod_face_lists.get(level) else {
                    return Err(RelicError::InternalError(format!(
                        "submesh of mesh '{}' has no generated index data for LOD level {}",
                        mesh.name(),
                        level + 1
                    )));
                };
                writer.begin_chunk(M_MESH_LOD_GENERATED);
                write_index_data(writer, index_data)?;
                writer.end_chunk()?;
            }
        }
        writer.end_chunk()?;
    }

    writer.end_chunk()
}

fn write_bounds(writer: &mut ChunkWriter, mesh: &Mesh) -> Result<()> {
    let bounds = mesh
        .bounds
        .as_ref()
        .expect("bounds validated before writing");
    writer.begin_chunk(M_MESH_BOUNDS);
    for component in bounds.aabb.min.to_array() {
        writer.write_f32(component);
    }
    for component in bounds.aabb.max.to_array() {
        writer.write_f32(component);
    }
    writer.write_f32(bounds.radius);
    writer.end_chunk()
}

fn write_submesh_name_table(writer: &mut ChunkWriter, mesh: &Mesh) -> Result<()> {
    let mut entries: Vec<(&String, u16)> = mesh
        .submesh_names()
        .iter()
        .map(|(name, index)| (name, *index))
        .collect();
    entries.sort_by_key(|(_, index)| *index);

    writer.begin_chunk(M_SUBMESH_NAME_TABLE);
    for (name, index) in entries {
        writer.begin_chunk(M_SUBMESH_NAME_TABLE_ELEMENT);
        writer.write_u16(index);
        writer.write_string(name);
        writer.end_chunk()?;
    }
    writer.end_chunk()
}

fn write_edge_lists(writer: &mut ChunkWriter, mesh: &Mesh) -> Result<()> {
    writer.begin_chunk(M_EDGE_LISTS);
    for (lod_index, entry) in mesh.edge_lists.iter().enumerate() {
        writer.begin_chunk(M_EDGE_LIST_LOD);
        writer.write_u16(lod_index as u16);
        writer.write_bool(entry.is_none());
        if let Some(edge_data) = entry {
            writer.write_u32(edge_data.triangles.len() as u32);
            writer.write_u32(edge_data.groups.len() as u32);
            for triangle in &edge_data.triangles {
                writer.write_u32(triangle.index_set);
                writer.write_u32(triangle.vertex_set);
                for index in triangle.vert_index {
                    writer.write_u32(index);
                }
                for index in triangle.shared_vert_index {
                    writer.write_u32(index);
                }
                for component in triangle.normal.to_array() {
                    writer.write_f32(component);
                }
            }
            for group in &edge_data.groups {
                writer.begin_chunk(M_EDGE_GROUP);
                writer.write_u32(group.vertex_set);
                writer.write_u32(group.edges.len() as u32);
                for edge in &group.edges {
                    writer.write_u32(edge.tri_index[0]);
                    writer.write_u32(edge.tri_index[1]);
                    writer.write_u32(edge.vert_index[0]);
                    writer.write_u32(edge.vert_index[1]);
                    writer.write_u32(edge.shared_vert_index[0]);
                    writer.write_u32(edge.shared_vert_index[1]);
                    writer.write_bool(edge.degenerate);
                }
                writer.end_chunk()?;
            }
        }
        writer.end_chunk()?;
    }
    writer.end_chunk()
}

// ============================================================================
// Read Path
// ============================================================================

struct MeshReader<'a, R> {
    chunk: ChunkReader<R>,
    buffers: &'a dyn BufferManager,
    version: FormatVersion,
}

impl<R: Read + Seek> MeshReader<'_, R> {
    fn read_mesh(&mut self, mesh: &mut Mesh) -> Result<()> {
        // Skeletal-animation hint; the in-memory model derives it from the
        // skeleton link instead.
        let _skeletally_animated = self.chunk.read_bool()?;

        while let Some(header) = self.chunk.read_header()? {
            match header.id {
                M_GEOMETRY => match self.read_geometry(header) {
                    Ok(data) => mesh.shared_vertex_data = Some(data),
                    Err(GeometryError::Empty) => {
                        // Known exporter anomaly; the chunk remainder has
                        // already been skipped.
                        log::warn!(
                            "mesh '{}': discarding empty shared geometry chunk",
                            mesh.name()
                        );
                    }
                    Err(GeometryError::Fatal(err)) => return Err(err),
                },
                M_SUBMESH => {
                    let submesh = self.read_submesh(mesh)?;
                    mesh.add_submesh(submesh);
                }
                M_MESH_SKELETON_LINK => {
                    mesh.skeleton_name = Some(self.chunk.read_string()?);
                }
                M_MESH_BONE_ASSIGNMENT => {
                    let assignment = self.read_bone_assignment()?;
                    mesh.bone_assignments.push(assignment);
                }
                M_MESH_LOD => self.read_lod(mesh)?,
                M_MESH_BOUNDS => self.read_bounds(mesh)?,
                M_SUBMESH_NAME_TABLE => self.read_submesh_name_table(mesh)?,
                M_EDGE_LISTS => self.read_edge_lists(mesh)?,
                _ => {
                    self.chunk.backpedal()?;
                    break;
                }
            }
        }
        Ok(())
    }

    /// Reads one geometry chunk in the dialect selected by the stream
    /// version. A zero-vertex chunk skips its own remainder and surfaces as
    /// [`GeometryError::Empty`] for the caller to judge.
    fn read_geometry(
        &mut self,
        header: ChunkHeader,
    ) -> std::result::Result<VertexData, GeometryError> {
        let vertex_count = self.chunk.read_u32()?;
        if vertex_count == 0 {
            self.chunk.skip(header.payload_len().saturating_sub(4))?;
            return Err(GeometryError::Empty);
        }
        if self.version.has_vertex_declarations() {
            Ok(self.read_geometry_current(vertex_count)?)
        } else {
            Ok(self.read_geometry_legacy(vertex_count)?)
        }
    }

    fn read_geometry_current(&mut self, vertex_count: u32) -> Result<VertexData> {
        let mut data = VertexData::new(vertex_count);
        while let Some(header) = self.chunk.read_header()? {
            match header.id {
                M_GEOMETRY_VERTEX_DECLARATION => self.read_vertex_declaration(&mut data)?,
                M_GEOMETRY_VERTEX_BUFFER => self.read_vertex_buffer(&mut data)?,
                _ => {
                    self.chunk.backpedal()?;
                    break;
                }
            }
        }
        Ok(data)
    }

    fn read_vertex_declaration(&mut self, data: &mut VertexData) -> Result<()> {
        while let Some(header) = self.chunk.read_header()? {
            if header.id != M_GEOMETRY_VERTEX_ELEMENT {
                self.chunk.backpedal()?;
                break;
            }
            let source = self.chunk.read_u16()?;
            let ty = VertexElementType::from_disk(self.chunk.read_u16()?)?;
            let semantic = VertexElementSemantic::from_disk(self.chunk.read_u16()?)?;
            let offset = self.chunk.read_u16()?;
            let index = self.chunk.read_u16()?;
            data.declaration.add_element(source, offset, ty, semantic, index);
        }
        Ok(())
    }

    fn read_vertex_buffer(&mut self, data: &mut VertexData) -> Result<()> {
        let source = self.chunk.read_u16()?;
        let vertex_size = self.chunk.read_u16()? as usize;

        let declared = data.declaration.vertex_size(source);
        if declared != vertex_size {
            return Err(RelicError::InternalError(format!(
                "vertex buffer for source {source} declares stride {vertex_size} but its declaration requires {declared}"
            )));
        }

        let Some(header) = self.chunk.read_header()? else {
            return Err(RelicError::ItemNotFound(
                "expected vertex buffer data chunk, stream ended".to_string(),
            ));
        };
        if header.id != M_GEOMETRY_VERTEX_BUFFER_DATA {
            return Err(RelicError::ItemNotFound(format!(
                "expected vertex buffer data chunk, found {:#06x}",
                header.id
            )));
        }
        let expected = data.vertex_count as usize * vertex_size;
        if header.payload_len() as usize != expected {
            return Err(RelicError::InternalError(format!(
                "vertex buffer data for source {source} holds {} bytes, expected {expected}",
                header.payload_len()
            )));
        }

        let mut payload = self.chunk.read_bytes(expected)?;
        vertex_payload_from_disk(&data.declaration, source, vertex_size, &mut payload);
        let buffer = self.buffers.create_vertex_buffer(
            vertex_size,
            data.vertex_count as usize,
            BufferUsage::STATIC_WRITE_ONLY,
        );
        buffer.borrow_mut().write(0, &payload)?;
        data.set_binding(source, buffer);
        Ok(())
    }

    /// Legacy dialect: inline positions followed by optional discrete
    /// normal/colour/texcoord chunks. Synthesizes the equivalent unified
    /// declaration with one buffer binding per attribute kind.
    fn read_geometry_legacy(&mut self, vertex_count: u32) -> Result<VertexData> {
        let mut data = VertexData::new(vertex_count);
        let positions = self.read_f32_array(vertex_count as usize * 3)?;
        self.bind_planar_buffer(
            &mut data,
            0,
            VertexElementType::Float3,
            VertexElementSemantic::Position,
            0,
            bytemuck::cast_slice(&positions),
        )?;

        let mut next_source = 1u16;
        let mut texcoord_set = 0u16;
        while let Some(header) = self.chunk.read_header()? {
            match header.id {
                M_GEOMETRY_NORMALS => {
                    let normals = self.read_f32_array(vertex_count as usize * 3)?;
                    self.bind_planar_buffer(
                        &mut data,
                        next_source,
                        VertexElementType::Float3,
                        VertexElementSemantic::Normal,
                        0,
                        bytemuck::cast_slice(&normals),
                    )?;
                    next_source += 1;
                }
                M_GEOMETRY_COLOURS => {
                    let colours = self.read_u32_array(vertex_count as usize)?;
                    self.bind_planar_buffer(
                        &mut data,
                        next_source,
                        VertexElementType::Colour,
                        VertexElementSemantic::Diffuse,
                        0,
                        bytemuck::cast_slice(&colours),
                    )?;
                    next_source += 1;
                }
                M_GEOMETRY_TEXCOORDS => {
                    let dimensions = self.chunk.read_u16()? as usize;
                    let ty = match dimensions {
                        1 => VertexElementType::Float1,
                        2 => VertexElementType::Float2,
                        3 => VertexElementType::Float3,
                        4 => VertexElementType::Float4,
                        _ => {
                            return Err(RelicError::InvalidParams(format!(
                                "texture coordinate set {texcoord_set} declares {dimensions} dimensions"
                            )));
                        }
                    };
                    let mut coords = self.read_f32_array(vertex_count as usize * dimensions)?;
                    if self.version == FormatVersion::V1_1 && dimensions >= 2 {
                        // v1.1 stored V in the inverted convention.
                        for texcoord in coords.chunks_exact_mut(dimensions) {
                            texcoord[1] = 1.0 - texcoord[1];
                        }
                    }
                    self.bind_planar_buffer(
                        &mut data,
                        next_source,
                        ty,
                        VertexElementSemantic::TexCoords,
                        texcoord_set,
                        bytemuck::cast_slice(&coords),
                    )?;
                    next_source += 1;
                    texcoord_set += 1;
                }
                _ => {
                    self.chunk.backpedal()?;
                    break;
                }
            }
        }
        Ok(data)
    }

    fn bind_planar_buffer(
        &mut self,
        data: &mut VertexData,
        source: u16,
        ty: VertexElementType,
        semantic: VertexElementSemantic,
        index: u16,
        bytes: &[u8],
    ) -> Result<()> {
        data.declaration.add_element(source, 0, ty, semantic, index);
        let buffer = self.buffers.create_vertex_buffer(
            ty.size(),
            data.vertex_count as usize,
            BufferUsage::STATIC_WRITE_ONLY,
        );
        buffer.borrow_mut().write(0, bytes)?;
        data.set_binding(source, buffer);
        Ok(())
    }

    fn read_f32_array(&mut self, count: usize) -> Result<Vec<f32>> {
        let bytes = self.chunk.read_bytes(count * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn read_u32_array(&mut self, count: usize) -> Result<Vec<u32>> {
        let bytes = self.chunk.read_bytes(count * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn read_submesh(&mut self, mesh: &Mesh) -> Result<SubMesh> {
        let mut submesh = SubMesh {
            material_name: self.chunk.read_string()?,
            use_shared_vertices: self.chunk.read_bool()?,
            ..SubMesh::default()
        };
        submesh.index_data = self.read_index_data()?;

        if !submesh.use_shared_vertices {
            let Some(header) = self.chunk.read_header()? else {
                return Err(RelicError::ItemNotFound(format!(
                    "mesh '{}': submesh geometry chunk missing, stream ended",
                    mesh.name()
                )));
            };
            if header.id != M_GEOMETRY {
                return Err(RelicError::ItemNotFound(format!(
                    "mesh '{}': expected submesh geometry chunk, found {:#06x}",
                    mesh.name(),
                    header.id
                )));
            }
            submesh.vertex_data = Some(self.read_geometry(header).map_err(|err| match err {
                // A dedicated-geometry submesh with no vertices is not the
                // documented recoverable case; treat it as corruption.
                GeometryError::Empty => RelicError::InternalError(format!(
                    "mesh '{}': submesh geometry chunk has zero vertices",
                    mesh.name()
                )),
                GeometryError::Fatal(err) => err,
            })?);
        }

        while let Some(header) = self.chunk.read_header()? {
            match header.id {
                M_SUBMESH_OPERATION => {
                    submesh.operation = OperationType::from_disk(self.chunk.read_u16()?)?;
                }
                M_SUBMESH_BONE_ASSIGNMENT => {
                    let assignment = self.read_bone_assignment()?;
                    submesh.bone_assignments.push(assignment);
                }
                _ => {
                    self.chunk.backpedal()?;
                    break;
                }
            }
        }
        Ok(submesh)
    }

    fn read_index_data(&mut self) -> Result<IndexData> {
        let index_count = self.chunk.read_u32()?;
        let wide = self.chunk.read_bool()?;
        let index_type = if wide { IndexType::U32 } else { IndexType::U16 };
        let mut index_data = IndexData {
            buffer: None,
            index_count,
        };
        if index_count > 0 {
            let mut payload = self
                .chunk
                .read_bytes(index_count as usize * index_type.size())?;
            index_payload_from_disk(index_type, &mut payload);
            let buffer = self.buffers.create_index_buffer(
                index_type,
                index_count as usize,
                BufferUsage::STATIC_WRITE_ONLY,
            );
            buffer.borrow_mut().write(0, &payload)?;
            index_data.buffer = Some(buffer);
        }
        Ok(index_data)
    }

    fn read_bone_assignment(&mut self) -> Result<VertexBoneAssignment> {
        Ok(VertexBoneAssignment {
            vertex_index: self.chunk.read_u32()?,
            bone_index: self.chunk.read_u16()?,
            weight: self.chunk.read_f32()?,
        })
    }

    fn read_lod(&mut self, mesh: &mut Mesh) -> Result<()> {
        let level_count = self.chunk.read_u16()?;
        let manual = self.chunk.read_bool()?;
        let mut lod = MeshLod {
            manual,
            usages: Vec::new(),
        };

        for level in 1..level_count {
            let Some(header) = self.chunk.read_header()? else {
                return Err(RelicError::ItemNotFound(format!(
                    "mesh '{}': LOD usage chunk for level {level} missing, stream ended",
                    mesh.name()
                )));
            };
            if header.id != M_MESH_LOD_USAGE {
                return Err(RelicError::ItemNotFound(format!(
                    "mesh '{}': expected LOD usage chunk, found {:#06x}",
                    mesh.name(),
                    header.id
                )));
            }
            let from_depth = self.chunk.read_f32()?;
            let mut manual_name = None;
            if manual {
                self.expect_chunk(M_MESH_LOD_MANUAL, "manual LOD")?;
                manual_name = Some(self.chunk.read_string()?);
            } else {
                for submesh_index in 0..mesh.submeshes.len() {
                    self.expect_chunk(M_MESH_LOD_GENERATED, "generated LOD")?;
                    let index_data = self.read_index_data()?;
                    mesh.submeshes[submesh_index].lod_face_lists.push(index_data);
                }
            }
            lod.usages.push(LodUsage {
                from_depth,
                manual_name,
            });
        }

        mesh.lod = Some(lod);
        Ok(())
    }

    fn read_bounds(&mut self, mesh: &mut Mesh) -> Result<()> {
        let min = Vec3::new(
            self.chunk.read_f32()?,
            self.chunk.read_f32()?,
            self.chunk.read_f32()?,
        );
        let max = Vec3::new(
            self.chunk.read_f32()?,
            self.chunk.read_f32()?,
            self.chunk.read_f32()?,
        );
        let radius = self.chunk.read_f32()?;
        mesh.set_bounds(min, max, radius);
        Ok(())
    }

    fn read_submesh_name_table(&mut self, mesh: &mut Mesh) -> Result<()> {
        while let Some(header) = self.chunk.read_header()? {
            if header.id != M_SUBMESH_NAME_TABLE_ELEMENT {
                self.chunk.backpedal()?;
                break;
            }
            let index = self.chunk.read_u16()?;
            let name = self.chunk.read_string()?;
            mesh.name_submesh(&name, index)?;
        }
        Ok(())
    }

    fn read_edge_lists(&mut self, mesh: &mut Mesh) -> Result<()> {
        while let Some(header) = self.chunk.read_header()? {
            if header.id != M_EDGE_LIST_LOD {
                self.chunk.backpedal()?;
                break;
            }
            let _lod_index = self.chunk.read_u16()?;
            let is_manual = self.chunk.read_bool()?;
            if is_manual {
                // Manual levels borrow another mesh's topology.
                mesh.edge_lists.push(None);
                continue;
            }

            let triangle_count = self.chunk.read_u32()?;
            let group_count = self.chunk.read_u32()?;
            let mut edge_data = EdgeData::default();
            for _ in 0..triangle_count {
                let index_set = self.chunk.read_u32()?;
                let vertex_set = self.chunk.read_u32()?;
                let vert_index = [
                    self.chunk.read_u32()?,
                    self.chunk.read_u32()?,
                    self.chunk.read_u32()?,
                ];
                let shared_vert_index = [
                    self.chunk.read_u32()?,
                    self.chunk.read_u32()?,
                    self.chunk.read_u32()?,
                ];
                let normal = Vec4::new(
                    self.chunk.read_f32()?,
                    self.chunk.read_f32()?,
                    self.chunk.read_f32()?,
                    self.chunk.read_f32()?,
                );
                edge_data.triangles.push(EdgeTriangle {
                    index_set,
                    vertex_set,
                    vert_index,
                    shared_vert_index,
                    normal,
                });
            }
            for _ in 0..group_count {
                self.expect_chunk(M_EDGE_GROUP, "edge group")?;
                let vertex_set = self.chunk.read_u32()?;
                let edge_count = self.chunk.read_u32()?;
                let mut group = EdgeGroup {
                    vertex_set,
                    edges: Vec::with_capacity(edge_count as usize),
                };
                for _ in 0..edge_count {
                    group.edges.push(Edge {
                        tri_index: [self.chunk.read_u32()?, self.chunk.read_u32()?],
                        vert_index: [self.chunk.read_u32()?, self.chunk.read_u32()?],
                        shared_vert_index: [self.chunk.read_u32()?, self.chunk.read_u32()?],
                        degenerate: self.chunk.read_bool()?,
                    });
                }
                edge_data.groups.push(group);
            }
            mesh.edge_lists.push(Some(edge_data));
        }
        Ok(())
    }

    fn expect_chunk(&mut self, id: u16, what: &str) -> Result<ChunkHeader> {
        match self.chunk.read_header()? {
            Some(header) if header.id == id => Ok(header),
            Some(header) => Err(RelicError::ItemNotFound(format!(
                "expected {what} chunk, found {:#06x}",
                header.id
            ))),
            None => Err(RelicError::ItemNotFound(format!(
                "expected {what} chunk, stream ended"
            ))),
        }
    }
}
