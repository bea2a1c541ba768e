//! Mesh data model.
//!
//! The in-memory graph the serializer populates: a [`Mesh`] owns optional
//! shared [`VertexData`], a list of [`SubMesh`]es, an optional skeleton link
//! with bone assignments, an optional LOD table, bounds, a submesh name
//! table, and per-LOD edge lists for shadow-volume extrusion.

use glam::{Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::errors::{RelicError, Result, fail};
use crate::resources::vertex::{IndexData, VertexData};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Precomputed mesh bounds: AABB plus bounding-sphere radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshBounds {
    pub aabb: BoundingBox,
    pub radius: f32,
}

/// One vertex → bone influence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexBoneAssignment {
    pub vertex_index: u32,
    pub bone_index: u16,
    pub weight: f32,
}

/// Primitive assembly of a submesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum OperationType {
    PointList = 1,
    LineList = 2,
    LineStrip = 3,
    TriangleList = 4,
    TriangleStrip = 5,
    TriangleFan = 6,
}

impl OperationType {
    #[must_use]
    pub fn to_disk(self) -> u16 {
        self as u16
    }

    pub fn from_disk(code: u16) -> Result<Self> {
        Ok(match code {
            1 => Self::PointList,
            2 => Self::LineList,
            3 => Self::LineStrip,
            4 => Self::TriangleList,
            5 => Self::TriangleStrip,
            6 => Self::TriangleFan,
            _ => {
                return Err(RelicError::InvalidParams(format!(
                    "unknown operation type code {code}"
                )));
            }
        })
    }
}

/// One part of a mesh drawn with a single material.
#[derive(Debug, Default)]
pub struct SubMesh {
    pub material_name: String,
    /// When set, vertices come from the mesh's shared geometry and
    /// `vertex_data` is `None`.
    pub use_shared_vertices: bool,
    pub vertex_data: Option<VertexData>,
    pub index_data: IndexData,
    pub operation: OperationType,
    pub bone_assignments: Vec<VertexBoneAssignment>,
    /// Generated LOD index lists, one per reduced level (level 1 first).
    /// Empty for manual-LOD and un-LOD'd meshes.
    pub lod_face_lists: Vec<IndexData>,
}

impl Default for OperationType {
    fn default() -> Self {
        Self::TriangleList
    }
}

/// One reduced-detail level.
#[derive(Debug, Clone, PartialEq)]
pub struct LodUsage {
    /// Camera depth beyond which this level kicks in.
    pub from_depth: f32,
    /// Alternate mesh name; present only in manual LOD tables. Resolution is
    /// lazy, the mesh is looked up when the level is first rendered.
    pub manual_name: Option<String>,
}

/// The mesh-wide LOD table.
///
/// A mesh is either entirely manual or entirely generated; the format does
/// not support mixing the two within one mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshLod {
    pub manual: bool,
    /// Reduced levels only; the base level is the mesh itself.
    pub usages: Vec<LodUsage>,
}

impl MeshLod {
    /// Level count including the base level.
    #[must_use]
    pub fn level_count(&self) -> u16 {
        self.usages.len() as u16 + 1
    }
}

/// One triangle of edge-adjacency data, tagged with the vertex/index sets it
/// was built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeTriangle {
    pub index_set: u32,
    pub vertex_set: u32,
    pub vert_index: [u32; 3],
    pub shared_vert_index: [u32; 3],
    /// Face plane equation (normal + distance).
    pub normal: Vec4,
}

/// One silhouette edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub tri_index: [u32; 2],
    pub vert_index: [u32; 2],
    pub shared_vert_index: [u32; 2],
    pub degenerate: bool,
}

/// Edges grouped by the vertex set they index into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeGroup {
    pub vertex_set: u32,
    pub edges: Vec<Edge>,
}

/// Full triangle/edge adjacency for one LOD level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeData {
    pub triangles: Vec<EdgeTriangle>,
    pub groups: Vec<EdgeGroup>,
}

/// A discrete 3D asset: shared or per-submesh geometry, skeleton binding,
/// LOD, bounds, and shadow-volume adjacency.
#[derive(Debug, Default)]
pub struct Mesh {
    name: String,
    pub shared_vertex_data: Option<VertexData>,
    pub submeshes: Vec<SubMesh>,
    pub skeleton_name: Option<String>,
    /// Bone assignments against the shared geometry.
    pub bone_assignments: Vec<VertexBoneAssignment>,
    pub lod: Option<MeshLod>,
    pub bounds: Option<MeshBounds>,
    submesh_names: FxHashMap<String, u16>,
    /// Per-LOD edge lists, base level first. `None` marks a manual level that
    /// borrows another mesh's topology.
    pub edge_lists: Vec<Option<EdgeData>>,
    /// Set when the source stream predates stored edge lists; the render
    /// system rebuilds them on demand.
    pub auto_build_edge_lists: bool,
}

impl Mesh {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn has_skeleton(&self) -> bool {
        self.skeleton_name.is_some()
    }

    /// Appends a submesh and returns its index.
    pub fn add_submesh(&mut self, submesh: SubMesh) -> u16 {
        self.submeshes.push(submesh);
        (self.submeshes.len() - 1) as u16
    }

    /// Names a submesh for later index lookup. Fails with `DuplicateItem`
    /// when the name is taken and `ItemNotFound` when the index is out of
    /// range.
    pub fn name_submesh(&mut self, name: &str, index: u16) -> Result<()> {
        if (index as usize) >= self.submeshes.len() {
            return fail(RelicError::ItemNotFound(format!(
                "submesh index {index} out of range in mesh '{}'",
                self.name
            )));
        }
        if self.submesh_names.contains_key(name) {
            return fail(RelicError::DuplicateItem(format!(
                "submesh name '{name}' in mesh '{}'",
                self.name
            )));
        }
        self.submesh_names.insert(name.to_string(), index);
        Ok(())
    }

    #[must_use]
    pub fn submesh_index(&self, name: &str) -> Option<u16> {
        self.submesh_names.get(name).copied()
    }

    #[must_use]
    pub fn submesh_names(&self) -> &FxHashMap<String, u16> {
        &self.submesh_names
    }

    /// LOD level count including the base level.
    #[must_use]
    pub fn lod_level_count(&self) -> u16 {
        self.lod.as_ref().map_or(1, MeshLod::level_count)
    }

    pub fn set_bounds(&mut self, min: Vec3, max: Vec3, radius: f32) {
        self.bounds = Some(MeshBounds {
            aabb: BoundingBox { min, max },
            radius,
        });
    }
}
