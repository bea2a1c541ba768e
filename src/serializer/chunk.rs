//! Chunk I/O primitives.
//!
//! Every record in the mesh stream is a chunk: a `u16` id and a `u32` byte
//! length (covering the 6-byte header itself) followed by payload and nested
//! sub-chunks. Chunks are self-delimiting, so a reader can skip anything it
//! does not understand without losing stream position.
//!
//! All integers are little-endian on disk; the typed reads and writes here
//! byte-swap transparently on big-endian hosts. Bulk vertex payloads are
//! converted separately, element-type-aware, via [`vertex_payload_from_disk`]
//! and [`vertex_payload_to_disk`].

use std::io::{Read, Seek, SeekFrom};

use crate::errors::{RelicError, Result};
use crate::resources::vertex::{IndexType, VertexDeclaration};

/// Size of the `{id, length}` chunk header.
pub const CHUNK_HEADER_SIZE: u32 = 6;

// ============================================================================
// Chunk Ids
// ============================================================================

pub const M_HEADER: u16 = 0x1000;
pub const M_MESH: u16 = 0x3000;
pub const M_SUBMESH: u16 = 0x4000;
pub const M_SUBMESH_OPERATION: u16 = 0x4010;
pub const M_SUBMESH_BONE_ASSIGNMENT: u16 = 0x4100;
pub const M_GEOMETRY: u16 = 0x5000;
pub const M_GEOMETRY_VERTEX_DECLARATION: u16 = 0x5100;
pub const M_GEOMETRY_VERTEX_ELEMENT: u16 = 0x5110;
pub const M_GEOMETRY_VERTEX_BUFFER: u16 = 0x5200;
pub const M_GEOMETRY_VERTEX_BUFFER_DATA: u16 = 0x5210;
// Legacy discrete-attribute geometry chunks (v1.1 / v1.2 streams). The ids
// overlap the unified declaration chunks above; the selected format version
// disambiguates.
pub const M_GEOMETRY_NORMALS: u16 = 0x5100;
pub const M_GEOMETRY_COLOURS: u16 = 0x5200;
pub const M_GEOMETRY_TEXCOORDS: u16 = 0x5300;
pub const M_MESH_SKELETON_LINK: u16 = 0x6000;
pub const M_MESH_BONE_ASSIGNMENT: u16 = 0x7000;
pub const M_MESH_LOD: u16 = 0x8000;
pub const M_MESH_LOD_USAGE: u16 = 0x8100;
pub const M_MESH_LOD_MANUAL: u16 = 0x8110;
pub const M_MESH_LOD_GENERATED: u16 = 0x8120;
pub const M_MESH_BOUNDS: u16 = 0x9000;
pub const M_SUBMESH_NAME_TABLE: u16 = 0xA000;
pub const M_SUBMESH_NAME_TABLE_ELEMENT: u16 = 0xA100;
pub const M_EDGE_LISTS: u16 = 0xB000;
pub const M_EDGE_LIST_LOD: u16 = 0xB100;
pub const M_EDGE_GROUP: u16 = 0xB110;

/// A parsed chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: u16,
    /// Byte length of the whole chunk, header included.
    pub length: u32,
}

impl ChunkHeader {
    /// Payload bytes remaining once the header has been consumed.
    #[must_use]
    pub fn payload_len(&self) -> u32 {
        self.length.saturating_sub(CHUNK_HEADER_SIZE)
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Buffering chunk writer.
///
/// Chunks nest via [`begin_chunk`](Self::begin_chunk) /
/// [`end_chunk`](Self::end_chunk); each `end_chunk` patches the length field
/// directly in the buffer, so lengths can never drift from the write logic
/// and no seek-back I/O is needed on the output sink.
#[derive(Debug, Default)]
pub struct ChunkWriter {
    buf: Vec<u8>,
    // Offsets of the length fields of currently open chunks.
    stack: Vec<usize>,
}

impl ChunkWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_chunk(&mut self, id: u16) {
        self.buf.extend_from_slice(&id.to_le_bytes());
        self.stack.push(self.buf.len());
        self.buf.extend_from_slice(&0u32.to_le_bytes());
    }

    pub fn end_chunk(&mut self) -> Result<()> {
        let Some(length_at) = self.stack.pop() else {
            return Err(RelicError::InternalError(
                "end_chunk without a matching begin_chunk".to_string(),
            ));
        };
        // Chunk starts at the id field, two bytes before the length field.
        let length = (self.buf.len() - (length_at - 2)) as u32;
        self.buf[length_at..length_at + 4].copy_from_slice(&length.to_le_bytes());
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    /// Length-prefixed UTF-8 string: `u16` byte count, then the bytes.
    pub fn write_string(&mut self, value: &str) {
        self.write_u16(value.len() as u16);
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Consumes the writer, failing with `InternalError` if any chunk is
    /// still open.
    pub fn finish(self) -> Result<Vec<u8>> {
        if !self.stack.is_empty() {
            return Err(RelicError::InternalError(format!(
                "{} chunk(s) left open at end of write",
                self.stack.len()
            )));
        }
        Ok(self.buf)
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Typed reader over a seekable chunk stream.
pub struct ChunkReader<R> {
    inner: R,
}

impl<R: Read + Seek> ChunkReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads the next chunk header. Returns `None` at a clean end of
    /// stream; a partial header is an `InvalidParams` condition.
    pub fn read_header(&mut self) -> Result<Option<ChunkHeader>> {
        let mut header = [0u8; CHUNK_HEADER_SIZE as usize];
        let mut filled = 0;
        while filled < header.len() {
            let n = self.inner.read(&mut header[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(RelicError::InvalidParams(
                    "truncated chunk header".to_string(),
                ));
            }
            filled += n;
        }
        let id = u16::from_le_bytes([header[0], header[1]]);
        let length = u32::from_le_bytes([header[2], header[3], header[4], header[5]]);
        if length < CHUNK_HEADER_SIZE {
            return Err(RelicError::InvalidParams(format!(
                "bad chunk-size header: chunk {id:#06x} declares {length} bytes"
            )));
        }
        Ok(Some(ChunkHeader { id, length }))
    }

    /// Rewinds by exactly one chunk-header width, undoing the last
    /// [`read_header`](Self::read_header). This is how a nested reader
    /// yields an unexpected chunk back to its caller.
    pub fn backpedal(&mut self) -> Result<()> {
        self.inner
            .seek(SeekFrom::Current(-(i64::from(CHUNK_HEADER_SIZE))))?;
        Ok(())
    }

    /// Skips `count` payload bytes.
    pub fn skip(&mut self, count: u32) -> Result<()> {
        self.inner.seek(SeekFrom::Current(i64::from(count)))?;
        Ok(())
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut bytes = [0u8; 1];
        self.inner.read_exact(&mut bytes)?;
        Ok(bytes[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut bytes = [0u8; 2];
        self.inner.read_exact(&mut bytes)?;
        Ok(u16::from_le_bytes(bytes))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        self.inner.read_exact(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let mut bytes = [0u8; 4];
        self.inner.read_exact(&mut bytes)?;
        Ok(f32::from_le_bytes(bytes))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Length-prefixed UTF-8 string, the counterpart of
    /// [`ChunkWriter::write_string`].
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes)
            .map_err(|_| RelicError::InvalidParams("malformed UTF-8 string in stream".to_string()))
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; count];
        self.inner.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

// ============================================================================
// Bulk Payload Byte Order
// ============================================================================

/// Converts a native-order vertex payload to little-endian disk order.
pub fn vertex_payload_to_disk(
    declaration: &VertexDeclaration,
    source: u16,
    vertex_size: usize,
    data: &mut [u8],
) {
    if cfg!(target_endian = "big") {
        flip_vertex_payload(declaration, source, vertex_size, data);
    }
}

/// Converts a little-endian disk payload to native vertex order.
pub fn vertex_payload_from_disk(
    declaration: &VertexDeclaration,
    source: u16,
    vertex_size: usize,
    data: &mut [u8],
) {
    if cfg!(target_endian = "big") {
        flip_vertex_payload(declaration, source, vertex_size, data);
    }
}

/// Reverses the bytes of every component of every element in the payload.
///
/// The flip width is looked up per element type: floats and packed colours
/// flip 4 bytes, shorts 2, and ubyte4 components are single bytes (no-op).
fn flip_vertex_payload(
    declaration: &VertexDeclaration,
    source: u16,
    vertex_size: usize,
    data: &mut [u8],
) {
    if vertex_size == 0 {
        return;
    }
    for vertex in data.chunks_exact_mut(vertex_size) {
        for element in declaration.elements_for_source(source) {
            let component = element.ty.component_size();
            if component <= 1 {
                continue;
            }
            let count = element.ty.size() / component;
            let base = element.offset as usize;
            for i in 0..count {
                let start = base + i * component;
                vertex[start..start + component].reverse();
            }
        }
    }
}

/// Converts a native-order index payload to little-endian disk order.
pub fn index_payload_to_disk(index_type: IndexType, data: &mut [u8]) {
    if cfg!(target_endian = "big") {
        flip_index_payload(index_type, data);
    }
}

/// Converts a little-endian index payload to native order.
pub fn index_payload_from_disk(index_type: IndexType, data: &mut [u8]) {
    if cfg!(target_endian = "big") {
        flip_index_payload(index_type, data);
    }
}

fn flip_index_payload(index_type: IndexType, data: &mut [u8]) {
    for index in data.chunks_exact_mut(index_type.size()) {
        index.reverse();
    }
}
