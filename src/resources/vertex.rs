//! Vertex and index data model.
//!
//! A [`VertexDeclaration`] is an ordered list of typed, offset-tagged
//! elements grouped by buffer-binding source; [`VertexData`] pairs a
//! declaration with the buffers bound to each source. [`IndexData`] wraps a
//! 16- or 32-bit index buffer. The serializer reads and writes these
//! faithfully; GPU upload happens elsewhere, behind the
//! [`BufferManager`](crate::resources::buffer::BufferManager) seam.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::{RelicError, Result};
use crate::resources::buffer::{SharedIndexBuffer, SharedVertexBuffer};

/// Component layout of one vertex element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum VertexElementType {
    Float1 = 0,
    Float2 = 1,
    Float3 = 2,
    Float4 = 3,
    /// Packed 32-bit colour, one `u32` per vertex.
    Colour = 4,
    Short1 = 5,
    Short2 = 6,
    Short3 = 7,
    Short4 = 8,
    UByte4 = 9,
}

impl VertexElementType {
    /// Total byte size of one element of this type.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::Float1 => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
            Self::Colour => 4,
            Self::Short1 => 2,
            Self::Short2 => 4,
            Self::Short3 => 6,
            Self::Short4 => 8,
            Self::UByte4 => 4,
        }
    }

    /// Width of one component for byte-order conversion.
    ///
    /// `UByte4` is explicitly excluded from swapping (bytes have no order),
    /// so its component width is 1.
    #[must_use]
    pub fn component_size(self) -> usize {
        match self {
            Self::Float1 | Self::Float2 | Self::Float3 | Self::Float4 | Self::Colour => 4,
            Self::Short1 | Self::Short2 | Self::Short3 | Self::Short4 => 2,
            Self::UByte4 => 1,
        }
    }

    #[must_use]
    pub fn to_disk(self) -> u16 {
        self as u16
    }

    pub fn from_disk(code: u16) -> Result<Self> {
        Ok(match code {
            0 => Self::Float1,
            1 => Self::Float2,
            2 => Self::Float3,
            3 => Self::Float4,
            4 => Self::Colour,
            5 => Self::Short1,
            6 => Self::Short2,
            7 => Self::Short3,
            8 => Self::Short4,
            9 => Self::UByte4,
            _ => {
                return Err(RelicError::InvalidParams(format!(
                    "unknown vertex element type code {code}"
                )));
            }
        })
    }
}

/// Meaning of one vertex element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum VertexElementSemantic {
    Position = 1,
    BlendWeights = 2,
    BlendIndices = 3,
    Normal = 4,
    Diffuse = 5,
    Specular = 6,
    TexCoords = 7,
}

impl VertexElementSemantic {
    #[must_use]
    pub fn to_disk(self) -> u16 {
        self as u16
    }

    pub fn from_disk(code: u16) -> Result<Self> {
        Ok(match code {
            1 => Self::Position,
            2 => Self::BlendWeights,
            3 => Self::BlendIndices,
            4 => Self::Normal,
            5 => Self::Diffuse,
            6 => Self::Specular,
            7 => Self::TexCoords,
            _ => {
                return Err(RelicError::InvalidParams(format!(
                    "unknown vertex element semantic code {code}"
                )));
            }
        })
    }
}

/// One typed, offset-tagged element of a vertex declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexElement {
    /// Buffer-binding source this element reads from.
    pub source: u16,
    /// Byte offset within one vertex of that buffer.
    pub offset: u16,
    pub ty: VertexElementType,
    pub semantic: VertexElementSemantic,
    /// Semantic repeat index (texcoord set number and the like).
    pub index: u16,
}

/// Ordered list of vertex elements across all binding sources.
#[derive(Debug, Clone, Default)]
pub struct VertexDeclaration {
    elements: SmallVec<[VertexElement; 8]>,
}

impl VertexDeclaration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_element(
        &mut self,
        source: u16,
        offset: u16,
        ty: VertexElementType,
        semantic: VertexElementSemantic,
        index: u16,
    ) {
        self.elements.push(VertexElement {
            source,
            offset,
            ty,
            semantic,
            index,
        });
    }

    #[must_use]
    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    /// Byte size of one vertex in the given binding source.
    #[must_use]
    pub fn vertex_size(&self, source: u16) -> usize {
        self.elements
            .iter()
            .filter(|e| e.source == source)
            .map(|e| e.offset as usize + e.ty.size())
            .max()
            .unwrap_or(0)
    }

    /// Elements reading from the given binding source, in declaration order.
    pub fn elements_for_source(&self, source: u16) -> impl Iterator<Item = &VertexElement> {
        self.elements.iter().filter(move |e| e.source == source)
    }

    #[must_use]
    pub fn find_element_by_semantic(
        &self,
        semantic: VertexElementSemantic,
        index: u16,
    ) -> Option<&VertexElement> {
        self.elements
            .iter()
            .find(|e| e.semantic == semantic && e.index == index)
    }
}

/// A vertex declaration plus the buffers bound to each source.
#[derive(Debug, Clone, Default)]
pub struct VertexData {
    pub declaration: VertexDeclaration,
    bindings: FxHashMap<u16, SharedVertexBuffer>,
    pub vertex_count: u32,
}

impl VertexData {
    #[must_use]
    pub fn new(vertex_count: u32) -> Self {
        Self {
            declaration: VertexDeclaration::new(),
            bindings: FxHashMap::default(),
            vertex_count,
        }
    }

    pub fn set_binding(&mut self, source: u16, buffer: SharedVertexBuffer) {
        self.bindings.insert(source, buffer);
    }

    #[must_use]
    pub fn binding(&self, source: u16) -> Option<&SharedVertexBuffer> {
        self.bindings.get(&source)
    }

    /// Binding sources in ascending order.
    #[must_use]
    pub fn sources(&self) -> Vec<u16> {
        let mut sources: Vec<u16> = self.bindings.keys().copied().collect();
        sources.sort_unstable();
        sources
    }

    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}

/// Width of the indices in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// An index buffer handle plus its logical count.
#[derive(Debug, Clone, Default)]
pub struct IndexData {
    pub buffer: Option<SharedIndexBuffer>,
    pub index_count: u32,
}

impl IndexData {
    #[must_use]
    pub fn new(buffer: SharedIndexBuffer, index_count: u32) -> Self {
        Self {
            buffer: Some(buffer),
            index_count,
        }
    }

    /// Index width, defaulting to 16-bit when no buffer is present.
    #[must_use]
    pub fn index_type(&self) -> IndexType {
        self.buffer
            .as_ref()
            .map_or(IndexType::U16, |b| b.borrow().index_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_size_is_max_extent_per_source() {
        let mut decl = VertexDeclaration::new();
        decl.add_element(
            0,
            0,
            VertexElementType::Float3,
            VertexElementSemantic::Position,
            0,
        );
        decl.add_element(
            0,
            12,
            VertexElementType::Float3,
            VertexElementSemantic::Normal,
            0,
        );
        decl.add_element(
            1,
            0,
            VertexElementType::Float2,
            VertexElementSemantic::TexCoords,
            0,
        );
        assert_eq!(decl.vertex_size(0), 24);
        assert_eq!(decl.vertex_size(1), 8);
        assert_eq!(decl.vertex_size(2), 0);
    }

    #[test]
    fn element_type_codes_round_trip() {
        for code in 0..=9 {
            let ty = VertexElementType::from_disk(code).unwrap();
            assert_eq!(ty.to_disk(), code);
        }
        assert!(VertexElementType::from_disk(10).is_err());
    }

    #[test]
    fn find_by_semantic_respects_repeat_index() {
        let mut decl = VertexDeclaration::new();
        decl.add_element(
            0,
            0,
            VertexElementType::Float2,
            VertexElementSemantic::TexCoords,
            0,
        );
        decl.add_element(
            0,
            8,
            VertexElementType::Float2,
            VertexElementSemantic::TexCoords,
            1,
        );
        let second = decl
            .find_element_by_semantic(VertexElementSemantic::TexCoords, 1)
            .unwrap();
        assert_eq!(second.offset, 8);
    }
}
