//! Resource model and collaborator seams.
//!
//! Core data structures and the traits the group manager drives:
//! - Mesh / SubMesh / VertexData / IndexData: the in-memory asset graph
//! - Buffer: the narrow hardware-buffer seam onto the render system
//! - Resource / ResourceManager / ScriptLoader: per-type lifecycle hooks

pub mod buffer;
pub mod mesh;
pub mod mesh_manager;
pub mod vertex;

// Re-export the common types
pub use buffer::{
    BufferManager, BufferUsage, DefaultBufferManager, IndexBuffer, SharedIndexBuffer,
    SharedVertexBuffer, VertexBuffer,
};
pub use mesh::{
    BoundingBox, Edge, EdgeData, EdgeGroup, EdgeTriangle, LodUsage, Mesh, MeshBounds, MeshLod,
    OperationType, SubMesh, VertexBoneAssignment,
};
pub use mesh_manager::{MeshHandle, MeshManager, MeshResource};
pub use vertex::{
    IndexData, IndexType, VertexData, VertexDeclaration, VertexElement, VertexElementSemantic,
    VertexElementType,
};

use std::cell::RefCell;
use std::rc::Rc;

use crate::archive::DataStream;
use crate::errors::Result;
use crate::group::ResourceGroupManager;

/// A shared, interiorly-mutable resource handle.
///
/// Resources are owned by their [`ResourceManager`]; groups hold additional
/// references in their load-order buckets. Single-threaded by design, like
/// the rest of the loading pipeline.
pub type ResourceRef = Rc<RefCell<dyn Resource>>;

/// One loadable asset tracked by a resource manager.
pub trait Resource {
    fn name(&self) -> &str;

    /// The group this resource was created into.
    fn group(&self) -> &str;

    /// Type string matching the owning manager's
    /// [`ResourceManager::resource_type`].
    fn resource_type(&self) -> &str;

    fn is_loaded(&self) -> bool;

    /// Materializes the resource, resolving its data stream through the
    /// group manager's archive layer.
    fn load(&mut self, groups: &ResourceGroupManager) -> Result<()>;

    /// Drops residency; the resource object itself survives and can be
    /// loaded again.
    fn unload(&mut self);

    /// Applies custom creation parameters from a declaration. The default
    /// ignores them.
    fn set_parameters(&mut self, _params: &[(String, String)]) {}

    /// Downcast hook for callers that know the concrete resource type.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Factory and registry for one resource type.
pub trait ResourceManager {
    /// Type string resources of this manager answer to (e.g. `"Mesh"`).
    fn resource_type(&self) -> &str;

    /// Position in the cross-type load sequence; lower loads earlier.
    fn loading_order(&self) -> f32;

    /// Creates an unloaded resource record. Fails with `DuplicateItem` when
    /// the name is taken.
    fn create(&mut self, name: &str, group: &str) -> Result<ResourceRef>;

    /// Removes a resource record, unloading it first. Fails with
    /// `ItemNotFound` for unknown names.
    fn remove(&mut self, name: &str) -> Result<()>;

    /// Removes every resource record.
    fn remove_all(&mut self);
}

/// Parser for a family of script files (materials, particle systems, ...).
///
/// Invoked by [`ResourceGroupManager::initialise_resource_group`] against
/// every location entry matching one of its patterns.
pub trait ScriptLoader {
    /// `*`-wildcard patterns selecting this loader's files.
    fn script_patterns(&self) -> &[String];

    /// Position in the cross-loader parse sequence; lower parses earlier.
    fn loading_order(&self) -> f32;

    fn parse_script(&mut self, stream: &mut DataStream, group: &str) -> Result<()>;
}

/// A promise to create a resource once its group is initialised.
#[derive(Debug, Clone)]
pub struct ResourceDeclaration {
    pub name: String,
    pub resource_type: String,
    pub params: Vec<(String, String)>,
}
