//! Hardware buffer seam.
//!
//! The render system proper is an external collaborator; the pipeline only
//! ever asks it to "create a buffer of N bytes with these usage flags" and to
//! copy bytes in and out. [`BufferManager`] is that narrow interface, and
//! [`DefaultBufferManager`] is the system-memory implementation used by tests
//! and offline tooling.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

use crate::errors::{RelicError, Result};
use crate::resources::vertex::IndexType;

bitflags! {
    /// Buffer residency and access hints, passed through to the render
    /// system on upload.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferUsage: u32 {
        /// Rarely modified after creation.
        const STATIC = 1;
        /// Modified frequently.
        const DYNAMIC = 2;
        /// The application never reads back; the device may place the buffer
        /// in write-combined memory.
        const WRITE_ONLY = 4;
        const STATIC_WRITE_ONLY = Self::STATIC.bits() | Self::WRITE_ONLY.bits();
        const DYNAMIC_WRITE_ONLY = Self::DYNAMIC.bits() | Self::WRITE_ONLY.bits();
    }
}

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// A system-memory vertex buffer.
#[derive(Debug)]
pub struct VertexBuffer {
    id: u64,
    vertex_size: usize,
    vertex_count: usize,
    usage: BufferUsage,
    data: Vec<u8>,
}

impl VertexBuffer {
    #[must_use]
    pub fn new(vertex_size: usize, vertex_count: usize, usage: BufferUsage) -> Self {
        Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            vertex_size,
            vertex_count,
            usage,
            data: vec![0; vertex_size * vertex_count],
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn vertex_size(&self) -> usize {
        self.vertex_size
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[inline]
    #[must_use]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        write_range(&mut self.data, offset, bytes)
    }

    pub fn read(&self, offset: usize, len: usize) -> Result<&[u8]> {
        read_range(&self.data, offset, len)
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

/// A system-memory index buffer.
#[derive(Debug)]
pub struct IndexBuffer {
    id: u64,
    index_type: IndexType,
    index_count: usize,
    usage: BufferUsage,
    data: Vec<u8>,
}

impl IndexBuffer {
    #[must_use]
    pub fn new(index_type: IndexType, index_count: usize, usage: BufferUsage) -> Self {
        Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            index_type,
            index_count,
            usage,
            data: vec![0; index_type.size() * index_count],
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    #[inline]
    #[must_use]
    pub fn index_count(&self) -> usize {
        self.index_count
    }

    #[inline]
    #[must_use]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        write_range(&mut self.data, offset, bytes)
    }

    pub fn read(&self, offset: usize, len: usize) -> Result<&[u8]> {
        read_range(&self.data, offset, len)
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

fn write_range(data: &mut [u8], offset: usize, bytes: &[u8]) -> Result<()> {
    let end = offset
        .checked_add(bytes.len())
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            RelicError::InvalidParams(format!(
                "buffer write out of range: offset {offset} + {} > {}",
                bytes.len(),
                data.len()
            ))
        })?;
    data[offset..end].copy_from_slice(bytes);
    Ok(())
}

fn read_range(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let end = offset
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            RelicError::InvalidParams(format!(
                "buffer read out of range: offset {offset} + {len} > {}",
                data.len()
            ))
        })?;
    Ok(&data[offset..end])
}

pub type SharedVertexBuffer = Rc<RefCell<VertexBuffer>>;
pub type SharedIndexBuffer = Rc<RefCell<IndexBuffer>>;

/// Narrow buffer-creation interface onto the render system.
pub trait BufferManager {
    fn create_vertex_buffer(
        &self,
        vertex_size: usize,
        vertex_count: usize,
        usage: BufferUsage,
    ) -> SharedVertexBuffer;

    fn create_index_buffer(
        &self,
        index_type: IndexType,
        index_count: usize,
        usage: BufferUsage,
    ) -> SharedIndexBuffer;
}

/// System-memory [`BufferManager`], the software fallback used when no
/// render system is attached.
#[derive(Debug, Default)]
pub struct DefaultBufferManager;

impl DefaultBufferManager {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl BufferManager for DefaultBufferManager {
    fn create_vertex_buffer(
        &self,
        vertex_size: usize,
        vertex_count: usize,
        usage: BufferUsage,
    ) -> SharedVertexBuffer {
        Rc::new(RefCell::new(VertexBuffer::new(
            vertex_size,
            vertex_count,
            usage,
        )))
    }

    fn create_index_buffer(
        &self,
        index_type: IndexType,
        index_count: usize,
        usage: BufferUsage,
    ) -> SharedIndexBuffer {
        Rc::new(RefCell::new(IndexBuffer::new(
            index_type,
            index_count,
            usage,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_buffer_write_and_read() {
        let mut buf = VertexBuffer::new(12, 4, BufferUsage::STATIC);
        assert_eq!(buf.size(), 48);
        buf.write(12, &[1, 2, 3, 4]).unwrap();
        assert_eq!(buf.read(12, 4).unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn out_of_range_access_is_rejected() {
        let mut buf = VertexBuffer::new(4, 2, BufferUsage::DYNAMIC);
        assert!(buf.write(6, &[0, 0, 0]).is_err());
        assert!(buf.read(0, 9).is_err());
        assert!(buf.read(usize::MAX, 2).is_err());
    }

    #[test]
    fn index_buffer_sizing_follows_width() {
        let b16 = IndexBuffer::new(IndexType::U16, 6, BufferUsage::STATIC);
        let b32 = IndexBuffer::new(IndexType::U32, 6, BufferUsage::STATIC);
        assert_eq!(b16.size(), 12);
        assert_eq!(b32.size(), 24);
    }

    #[test]
    fn buffer_ids_are_unique() {
        let a = VertexBuffer::new(4, 1, BufferUsage::STATIC);
        let b = VertexBuffer::new(4, 1, BufferUsage::STATIC);
        assert_ne!(a.id(), b.id());
    }
}
