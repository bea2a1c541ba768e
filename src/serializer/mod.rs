//! Mesh Serialization
//!
//! The chunked, versioned binary mesh format:
//! - chunk: self-delimiting `{id, length}` records and typed endian-correct
//!   reads/writes
//! - mesh: the versioned import/export built on top of them
//!
//! Streams begin with a sentinel chunk naming the format revision; the
//! reader dialect is selected from it, so one serializer reads v1.1, v1.2,
//! and v1.3 streams while always writing the current revision.

pub mod chunk;
pub mod mesh;

pub use chunk::{ChunkHeader, ChunkReader, ChunkWriter};
pub use mesh::{FormatVersion, MeshSerializer};
