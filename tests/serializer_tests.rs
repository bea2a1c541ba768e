//! Mesh Serializer Tests
//!
//! Tests for:
//! - Round-trip fidelity: geometry, indices, skeleton, LOD, names, bounds,
//!   edge lists
//! - Chunk self-delimitation: declared lengths tile the stream exactly
//! - Unknown-chunk skip: trailing chunks from newer writers are ignored
//! - Version compatibility: v1.1 texcoord convention vs. the modern one
//! - Failure semantics: missing bounds, zero-vertex geometry recovery

use std::io::Cursor;

use glam::{Vec3, Vec4};

use relic::resources::mesh::{Edge, EdgeData, EdgeGroup, EdgeTriangle, LodUsage, MeshLod};
use relic::serializer::chunk::{
    CHUNK_HEADER_SIZE, ChunkWriter, M_EDGE_LISTS, M_GEOMETRY, M_GEOMETRY_TEXCOORDS, M_HEADER,
    M_MESH, M_MESH_BONE_ASSIGNMENT, M_MESH_BOUNDS, M_MESH_LOD, M_MESH_SKELETON_LINK, M_SUBMESH,
    M_SUBMESH_NAME_TABLE, M_SUBMESH_OPERATION,
};
use relic::resources::VertexBoneAssignment;
use relic::{
    BufferManager, BufferUsage, DefaultBufferManager, IndexData, IndexType, Mesh, MeshSerializer,
    OperationType, RelicError, SubMesh, VertexData, VertexElementSemantic, VertexElementType,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Interleaved position+normal geometry in source 0 plus a texcoord buffer
/// in source 1.
fn make_vertex_data(buffers: &dyn BufferManager, vertex_count: u32) -> VertexData {
    let mut data = VertexData::new(vertex_count);
    data.declaration.add_element(
        0,
        0,
        VertexElementType::Float3,
        VertexElementSemantic::Position,
        0,
    );
    data.declaration.add_element(
        0,
        12,
        VertexElementType::Float3,
        VertexElementSemantic::Normal,
        0,
    );
    data.declaration.add_element(
        1,
        0,
        VertexElementType::Float2,
        VertexElementSemantic::TexCoords,
        0,
    );

    let mut interleaved: Vec<f32> = Vec::new();
    let mut texcoords: Vec<f32> = Vec::new();
    for i in 0..vertex_count {
        let base = i as f32;
        interleaved.extend_from_slice(&[base, base + 0.25, base + 0.5, 0.0, 1.0, 0.0]);
        texcoords.extend_from_slice(&[base * 0.1, 1.0 - base * 0.1]);
    }

    let positions = buffers.create_vertex_buffer(24, vertex_count as usize, BufferUsage::STATIC);
    positions
        .borrow_mut()
        .write(0, bytemuck::cast_slice(&interleaved))
        .unwrap();
    data.set_binding(0, positions);

    let uvs = buffers.create_vertex_buffer(8, vertex_count as usize, BufferUsage::STATIC);
    uvs.borrow_mut()
        .write(0, bytemuck::cast_slice(&texcoords))
        .unwrap();
    data.set_binding(1, uvs);
    data
}

fn make_index_data_u16(buffers: &dyn BufferManager, indices: &[u16]) -> IndexData {
    let buffer = buffers.create_index_buffer(IndexType::U16, indices.len(), BufferUsage::STATIC);
    buffer
        .borrow_mut()
        .write(0, bytemuck::cast_slice(indices))
        .unwrap();
    IndexData::new(buffer, indices.len() as u32)
}

fn make_index_data_u32(buffers: &dyn BufferManager, indices: &[u32]) -> IndexData {
    let buffer = buffers.create_index_buffer(IndexType::U32, indices.len(), BufferUsage::STATIC);
    buffer
        .borrow_mut()
        .write(0, bytemuck::cast_slice(indices))
        .unwrap();
    IndexData::new(buffer, indices.len() as u32)
}

fn make_edge_data() -> EdgeData {
    EdgeData {
        triangles: vec![EdgeTriangle {
            index_set: 0,
            vertex_set: 0,
            vert_index: [0, 1, 2],
            shared_vert_index: [0, 1, 2],
            normal: Vec4::new(0.0, 1.0, 0.0, -2.5),
        }],
        groups: vec![EdgeGroup {
            vertex_set: 0,
            edges: vec![
                Edge {
                    tri_index: [0, 0],
                    vert_index: [0, 1],
                    shared_vert_index: [0, 1],
                    degenerate: true,
                },
                Edge {
                    tri_index: [0, 0],
                    vert_index: [1, 2],
                    shared_vert_index: [1, 2],
                    degenerate: false,
                },
            ],
        }],
    }
}

/// A mesh exercising every chunk kind: shared and dedicated geometry, both
/// index widths, skeleton link, bone assignments, generated LOD, name
/// table, and edge lists.
fn make_full_mesh(buffers: &dyn BufferManager) -> Mesh {
    let mut mesh = Mesh::new("fixture.mesh");
    mesh.shared_vertex_data = Some(make_vertex_data(buffers, 6));

    let hull = SubMesh {
        material_name: "Fixtures/Hull".to_string(),
        use_shared_vertices: true,
        vertex_data: None,
        index_data: make_index_data_u16(buffers, &[0, 1, 2, 3, 4, 5]),
        operation: OperationType::TriangleList,
        bone_assignments: vec![VertexBoneAssignment {
            vertex_index: 2,
            bone_index: 7,
            weight: 0.75,
        }],
        lod_face_lists: vec![
            make_index_data_u16(buffers, &[0, 1, 2]),
            make_index_data_u16(buffers, &[0, 2, 4]),
        ],
    };
    let turret = SubMesh {
        material_name: "Fixtures/Turret".to_string(),
        use_shared_vertices: false,
        vertex_data: Some(make_vertex_data(buffers, 4)),
        index_data: make_index_data_u32(buffers, &[0, 1, 2, 2, 3, 0]),
        operation: OperationType::TriangleStrip,
        bone_assignments: Vec::new(),
        lod_face_lists: vec![
            make_index_data_u32(buffers, &[0, 1, 2]),
            make_index_data_u32(buffers, &[0, 1, 3]),
        ],
    };
    mesh.add_submesh(hull);
    mesh.add_submesh(turret);
    mesh.name_submesh("hull", 0).unwrap();
    mesh.name_submesh("turret", 1).unwrap();

    mesh.skeleton_name = Some("fixture.skeleton".to_string());
    mesh.bone_assignments.push(VertexBoneAssignment {
        vertex_index: 0,
        bone_index: 1,
        weight: 1.0,
    });

    mesh.lod = Some(MeshLod {
        manual: false,
        usages: vec![
            LodUsage {
                from_depth: 100.0,
                manual_name: None,
            },
            LodUsage {
                from_depth: 400.0,
                manual_name: None,
            },
        ],
    });

    mesh.edge_lists = vec![Some(make_edge_data()), None, Some(make_edge_data())];
    mesh.set_bounds(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0), 3.75);
    mesh
}

fn export_bytes(mesh: &Mesh) -> Vec<u8> {
    let mut out = Vec::new();
    MeshSerializer::new().export(mesh, &mut out).unwrap();
    out
}

// ============================================================================
// Round-Trip
// ============================================================================

#[test]
fn full_mesh_round_trips() {
    let buffers = DefaultBufferManager::new();
    let original = make_full_mesh(&buffers);
    let bytes = export_bytes(&original);

    let imported = MeshSerializer::new()
        .import("fixture.mesh", Cursor::new(bytes), &buffers)
        .unwrap();

    // Shared geometry.
    let shared = imported.shared_vertex_data.as_ref().unwrap();
    assert_eq!(shared.vertex_count, 6);
    assert_eq!(shared.binding_count(), 2);
    assert_eq!(shared.declaration.elements().len(), 3);
    assert_eq!(shared.declaration.vertex_size(0), 24);
    assert_eq!(shared.declaration.vertex_size(1), 8);

    // Vertex payloads are byte-identical.
    let original_shared = original.shared_vertex_data.as_ref().unwrap();
    for source in [0, 1] {
        assert_eq!(
            original_shared.binding(source).unwrap().borrow().bytes(),
            shared.binding(source).unwrap().borrow().bytes(),
            "source {source} payload"
        );
    }

    // Submeshes.
    assert_eq!(imported.submeshes.len(), 2);
    let hull = &imported.submeshes[0];
    assert_eq!(hull.material_name, "Fixtures/Hull");
    assert!(hull.use_shared_vertices);
    assert_eq!(hull.index_data.index_count, 6);
    assert_eq!(hull.index_data.index_type(), IndexType::U16);
    assert_eq!(hull.operation, OperationType::TriangleList);
    assert_eq!(hull.bone_assignments.len(), 1);
    assert_eq!(hull.bone_assignments[0].bone_index, 7);
    assert_eq!(hull.bone_assignments[0].weight, 0.75);

    let turret = &imported.submeshes[1];
    assert_eq!(turret.material_name, "Fixtures/Turret");
    assert!(!turret.use_shared_vertices);
    assert_eq!(turret.vertex_data.as_ref().unwrap().vertex_count, 4);
    assert_eq!(turret.index_data.index_count, 6);
    assert_eq!(turret.index_data.index_type(), IndexType::U32);
    assert_eq!(turret.operation, OperationType::TriangleStrip);

    // Index payload fidelity.
    assert_eq!(
        turret
            .index_data
            .buffer
            .as_ref()
            .unwrap()
            .borrow()
            .bytes(),
        bytemuck::cast_slice::<u32, u8>(&[0, 1, 2, 2, 3, 0])
    );

    // Skeleton link and mesh-level bone assignments.
    assert_eq!(imported.skeleton_name.as_deref(), Some("fixture.skeleton"));
    assert_eq!(imported.bone_assignments.len(), 1);
    assert_eq!(imported.bone_assignments[0].vertex_index, 0);

    // Generated LOD.
    let lod = imported.lod.as_ref().unwrap();
    assert!(!lod.manual);
    assert_eq!(lod.level_count(), 3);
    assert_eq!(lod.usages[0].from_depth, 100.0);
    assert_eq!(lod.usages[1].from_depth, 400.0);
    assert_eq!(hull.lod_face_lists.len(), 2);
    assert_eq!(hull.lod_face_lists[0].index_count, 3);
    assert_eq!(hull.lod_face_lists[0].index_type(), IndexType::U16);
    assert_eq!(turret.lod_face_lists[1].index_type(), IndexType::U32);

    // Bounds.
    let bounds = imported.bounds.unwrap();
    assert_eq!(bounds.aabb.min, Vec3::new(-1.0, -2.0, -3.0));
    assert_eq!(bounds.aabb.max, Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(bounds.radius, 3.75);

    // Name table.
    assert_eq!(imported.submesh_index("hull"), Some(0));
    assert_eq!(imported.submesh_index("turret"), Some(1));

    // Edge lists, including the manual skip marker.
    assert_eq!(imported.edge_lists.len(), 3);
    assert_eq!(imported.edge_lists[0], Some(make_edge_data()));
    assert_eq!(imported.edge_lists[1], None);
    assert!(!imported.auto_build_edge_lists);
}

#[test]
fn manual_lod_round_trips() {
    let buffers = DefaultBufferManager::new();
    let mut mesh = Mesh::new("manual_lod.mesh");
    mesh.add_submesh(SubMesh {
        material_name: "Fixtures/Solid".to_string(),
        use_shared_vertices: false,
        vertex_data: Some(make_vertex_data(&buffers, 3)),
        index_data: make_index_data_u16(&buffers, &[0, 1, 2]),
        operation: OperationType::TriangleList,
        bone_assignments: Vec::new(),
        lod_face_lists: Vec::new(),
    });
    mesh.lod = Some(MeshLod {
        manual: true,
        usages: vec![
            LodUsage {
                from_depth: 50.0,
                manual_name: Some("manual_lod_1.mesh".to_string()),
            },
            LodUsage {
                from_depth: 200.0,
                manual_name: Some("manual_lod_2.mesh".to_string()),
            },
        ],
    });
    mesh.set_bounds(Vec3::ZERO, Vec3::ONE, 1.0);

    let bytes = export_bytes(&mesh);
    let imported = MeshSerializer::new()
        .import("manual_lod.mesh", Cursor::new(bytes), &buffers)
        .unwrap();

    let lod = imported.lod.as_ref().unwrap();
    assert!(lod.manual);
    assert_eq!(lod.usages[0].manual_name.as_deref(), Some("manual_lod_1.mesh"));
    assert_eq!(lod.usages[1].manual_name.as_deref(), Some("manual_lod_2.mesh"));
    assert!(imported.submeshes[0].lod_face_lists.is_empty());
}

// ============================================================================
// Chunk Self-Delimitation
// ============================================================================

fn chunk_at(bytes: &[u8], offset: usize) -> (u16, u32) {
    let id = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
    let length = u32::from_le_bytes([
        bytes[offset + 2],
        bytes[offset + 3],
        bytes[offset + 4],
        bytes[offset + 5],
    ]);
    (id, length)
}

#[test]
fn top_level_chunks_tile_the_stream() {
    let buffers = DefaultBufferManager::new();
    let bytes = export_bytes(&make_full_mesh(&buffers));

    let (id, header_len) = chunk_at(&bytes, 0);
    assert_eq!(id, M_HEADER);
    let (id, mesh_len) = chunk_at(&bytes, header_len as usize);
    assert_eq!(id, M_MESH);
    assert_eq!(header_len as usize + mesh_len as usize, bytes.len());
}

#[test]
fn mesh_children_tile_the_mesh_chunk() {
    let buffers = DefaultBufferManager::new();
    let bytes = export_bytes(&make_full_mesh(&buffers));

    let (_, header_len) = chunk_at(&bytes, 0);
    let mesh_start = header_len as usize;
    let (_, mesh_len) = chunk_at(&bytes, mesh_start);
    let mesh_end = mesh_start + mesh_len as usize;

    // Walk the mesh chunk's children by declared length alone; the bool
    // skeletal flag precedes the first child. Every landing point must be a
    // known child id, and the walk must end exactly at the chunk boundary.
    let known = [
        M_GEOMETRY,
        M_SUBMESH,
        M_MESH_SKELETON_LINK,
        M_MESH_BONE_ASSIGNMENT,
        M_MESH_LOD,
        M_MESH_BOUNDS,
        M_SUBMESH_NAME_TABLE,
        M_EDGE_LISTS,
    ];
    let mut offset = mesh_start + CHUNK_HEADER_SIZE as usize + 1;
    let mut seen = Vec::new();
    while offset < mesh_end {
        let (id, length) = chunk_at(&bytes, offset);
        assert!(
            known.contains(&id),
            "unexpected chunk {id:#06x} at offset {offset}"
        );
        assert!(length >= CHUNK_HEADER_SIZE);
        seen.push(id);
        offset += length as usize;
    }
    assert_eq!(offset, mesh_end, "children must tile the mesh chunk exactly");
    assert_eq!(seen.iter().filter(|&&id| id == M_SUBMESH).count(), 2);
    assert!(seen.contains(&M_MESH_BOUNDS));
    assert!(seen.contains(&M_EDGE_LISTS));
}

// ============================================================================
// Unknown-Chunk Skip
// ============================================================================

#[test]
fn unknown_trailing_chunk_is_ignored() {
    let buffers = DefaultBufferManager::new();
    let mut bytes = export_bytes(&make_full_mesh(&buffers));

    // Splice an unknown chunk inside the mesh chunk, after all known
    // children, as a newer writer would.
    let mut unknown = ChunkWriter::new();
    unknown.begin_chunk(0xF00D);
    unknown.write_u32(0xAAAA_5555);
    unknown.end_chunk().unwrap();
    let unknown = unknown.finish().unwrap();

    let (_, header_len) = chunk_at(&bytes, 0);
    let mesh_start = header_len as usize;
    let (_, mesh_len) = chunk_at(&bytes, mesh_start);
    bytes.extend_from_slice(&unknown);
    let patched_len = mesh_len + unknown.len() as u32;
    bytes[mesh_start + 2..mesh_start + 6].copy_from_slice(&patched_len.to_le_bytes());

    let imported = MeshSerializer::new()
        .import("fixture.mesh", Cursor::new(bytes), &buffers)
        .unwrap();
    assert_eq!(imported.submeshes.len(), 2);
    assert!(imported.bounds.is_some());
}

// ============================================================================
// Version Compatibility
// ============================================================================

/// Minimal legacy-dialect stream: one vertex with a 2D texcoord set, one
/// shared-vertex submesh, bounds.
fn legacy_stream(sentinel: &str, u: f32, v: f32) -> Vec<u8> {
    let mut w = ChunkWriter::new();
    w.begin_chunk(M_HEADER);
    w.write_string(sentinel);
    w.end_chunk().unwrap();

    w.begin_chunk(M_MESH);
    w.write_bool(false);

    w.begin_chunk(M_GEOMETRY);
    w.write_u32(1);
    // Inline position.
    w.write_f32(1.0);
    w.write_f32(2.0);
    w.write_f32(3.0);
    w.begin_chunk(M_GEOMETRY_TEXCOORDS);
    w.write_u16(2);
    w.write_f32(u);
    w.write_f32(v);
    w.end_chunk().unwrap();
    w.end_chunk().unwrap();

    w.begin_chunk(M_SUBMESH);
    w.write_string("Legacy/Mat");
    w.write_bool(true);
    w.write_u32(0);
    w.write_bool(false);
    w.begin_chunk(M_SUBMESH_OPERATION);
    w.write_u16(OperationType::TriangleList.to_disk());
    w.end_chunk().unwrap();
    w.end_chunk().unwrap();

    w.begin_chunk(M_MESH_BOUNDS);
    for value in [-1.0f32, -1.0, -1.0, 1.0, 1.0, 1.0, 1.8] {
        w.write_f32(value);
    }
    w.end_chunk().unwrap();

    w.end_chunk().unwrap();
    w.finish().unwrap()
}

fn imported_texcoords(bytes: Vec<u8>) -> (f32, f32) {
    let buffers = DefaultBufferManager::new();
    let mesh = MeshSerializer::new()
        .import("legacy.mesh", Cursor::new(bytes), &buffers)
        .unwrap();
    let shared = mesh.shared_vertex_data.as_ref().unwrap();
    let element = shared
        .declaration
        .find_element_by_semantic(VertexElementSemantic::TexCoords, 0)
        .unwrap();
    let buffer = shared.binding(element.source).unwrap();
    let buffer = buffer.borrow();
    let coords: &[f32] = bytemuck::cast_slice(buffer.bytes());
    (coords[0], coords[1])
}

#[test]
fn v1_1_reader_flips_texcoord_v() {
    let stored_v = 0.2f32;
    let (u, v) = imported_texcoords(legacy_stream("[MeshSerializer_v1.10]", 0.7, stored_v));
    assert_eq!(u, 0.7);
    assert_eq!(v, 1.0 - stored_v);
}

#[test]
fn v1_2_reader_keeps_texcoord_v() {
    let stored_v = 0.2f32;
    let (u, v) = imported_texcoords(legacy_stream("[MeshSerializer_v1.20]", 0.7, stored_v));
    assert_eq!(u, 0.7);
    assert_eq!(v, stored_v);
}

#[test]
fn same_bytes_differ_by_exactly_the_flip() {
    let stored_v = 0.2f32;
    let (_, v1) = imported_texcoords(legacy_stream("[MeshSerializer_v1.10]", 0.7, stored_v));
    let (_, v2) = imported_texcoords(legacy_stream("[MeshSerializer_v1.20]", 0.7, stored_v));
    assert!(((v1 - v2) - (1.0 - 2.0 * stored_v)).abs() < 1e-6);
}

#[test]
fn legacy_synthesizes_per_attribute_bindings() {
    let buffers = DefaultBufferManager::new();
    let mesh = MeshSerializer::new()
        .import(
            "legacy.mesh",
            Cursor::new(legacy_stream("[MeshSerializer_v1.20]", 0.5, 0.5)),
            &buffers,
        )
        .unwrap();
    let shared = mesh.shared_vertex_data.as_ref().unwrap();
    // One binding per attribute kind: positions and texcoords.
    assert_eq!(shared.binding_count(), 2);
    assert!(
        shared
            .declaration
            .find_element_by_semantic(VertexElementSemantic::Position, 0)
            .is_some()
    );
    // Legacy streams never stored edge lists.
    assert!(mesh.auto_build_edge_lists);
}

#[test]
fn unsupported_version_is_rejected() {
    let mut w = ChunkWriter::new();
    w.begin_chunk(M_HEADER);
    w.write_string("[MeshSerializer_v9.99]");
    w.end_chunk().unwrap();
    let bytes = w.finish().unwrap();

    let buffers = DefaultBufferManager::new();
    let result = MeshSerializer::new().import("bad.mesh", Cursor::new(bytes), &buffers);
    assert!(matches!(result, Err(RelicError::Unsupported(_))));
}

// ============================================================================
// Failure Semantics & Recovery
// ============================================================================

#[test]
fn export_without_bounds_is_invalid_params() {
    let buffers = DefaultBufferManager::new();
    let mut mesh = make_full_mesh(&buffers);
    mesh.bounds = None;

    let mut out = Vec::new();
    let result = MeshSerializer::new().export(&mesh, &mut out);
    assert!(matches!(result, Err(RelicError::InvalidParams(_))));
    assert!(out.is_empty());
}

#[test]
fn empty_shared_geometry_is_recovered() {
    let mut w = ChunkWriter::new();
    w.begin_chunk(M_HEADER);
    w.write_string("[MeshSerializer_v1.30]");
    w.end_chunk().unwrap();

    w.begin_chunk(M_MESH);
    w.write_bool(false);

    // Zero-vertex shared geometry with stray payload the reader must skip.
    w.begin_chunk(M_GEOMETRY);
    w.write_u32(0);
    w.write_bytes(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x11]);
    w.end_chunk().unwrap();

    // A well-formed skeleton link must still be readable afterwards.
    w.begin_chunk(M_MESH_SKELETON_LINK);
    w.write_string("after.skeleton");
    w.end_chunk().unwrap();

    w.begin_chunk(M_MESH_BOUNDS);
    for value in [0.0f32, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0] {
        w.write_f32(value);
    }
    w.end_chunk().unwrap();

    w.end_chunk().unwrap();
    let bytes = w.finish().unwrap();

    let buffers = DefaultBufferManager::new();
    let mesh = MeshSerializer::new()
        .import("anomaly.mesh", Cursor::new(bytes), &buffers)
        .unwrap();
    assert!(mesh.shared_vertex_data.is_none());
    assert_eq!(mesh.skeleton_name.as_deref(), Some("after.skeleton"));
    assert!(mesh.bounds.is_some());
}

#[test]
fn zero_vertex_submesh_geometry_is_fatal() {
    let mut w = ChunkWriter::new();
    w.begin_chunk(M_HEADER);
    w.write_string("[MeshSerializer_v1.30]");
    w.end_chunk().unwrap();

    w.begin_chunk(M_MESH);
    w.write_bool(false);
    w.begin_chunk(M_SUBMESH);
    w.write_string("Broken/Mat");
    w.write_bool(false); // dedicated geometry...
    w.write_u32(0);
    w.write_bool(false);
    w.begin_chunk(M_GEOMETRY);
    w.write_u32(0); // ...with zero vertices
    w.end_chunk().unwrap();
    w.end_chunk().unwrap();
    w.end_chunk().unwrap();
    let bytes = w.finish().unwrap();

    let buffers = DefaultBufferManager::new();
    let result = MeshSerializer::new().import("broken.mesh", Cursor::new(bytes), &buffers);
    assert!(matches!(result, Err(RelicError::InternalError(_))));
}

#[test]
fn truncated_stream_is_rejected() {
    let buffers = DefaultBufferManager::new();
    let bytes = export_bytes(&make_full_mesh(&buffers));
    let result =
        MeshSerializer::new().import("cut.mesh", Cursor::new(bytes[..40].to_vec()), &buffers);
    assert!(result.is_err());
}
