#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod archive;
pub mod errors;
pub mod group;
pub mod resources;
pub mod serializer;

pub use archive::{Archive, DataStream, FileSystemArchive, MemoryArchive, ZipArchive};
pub use errors::{RelicError, Result};
pub use group::{
    DEFAULT_RESOURCE_GROUP, DropMode, LoadOrder, ResourceGroupListener, ResourceGroupManager,
    WORLD_RESOURCE_GROUP,
};
pub use resources::{
    BufferManager, BufferUsage, DefaultBufferManager, IndexData, IndexType, Mesh, MeshManager,
    OperationType, Resource, ResourceManager, ResourceRef, ScriptLoader, SubMesh, VertexData,
    VertexDeclaration, VertexElementSemantic, VertexElementType,
};
pub use serializer::{FormatVersion, MeshSerializer};
