//! Mesh geometry descriptors.

/// Index data for a mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indices {
    /// 16-bit indices.
    U16(Vec<u16>),
    /// 32-bit indices.
    U32(Vec<u32>),
}

impl Indices {
    /// Number of indices.
    pub fn len(&self) -> usize {
        match self {
            Self::U16(indices) => indices.len(),
            Self::U32(indices) => indices.len(),
        }
    }

    /// Returns true if there are no indices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of one index in bytes.
    pub fn index_size(&self) -> u64 {
        match self {
            Self::U16(_) => 2,
            Self::U32(_) => 4,
        }
    }

    /// Total size of the index data in bytes.
    pub fn byte_size(&self) -> u64 {
        self.len() as u64 * self.index_size()
    }
}

/// Descriptor for creating a mesh.
///
/// Vertices are interleaved `f32` attributes; the layout is owned by the
/// rendering pipeline and opaque to this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshDescriptor {
    /// Debug label for the mesh.
    pub label: Option<String>,
    /// Interleaved vertex data.
    pub vertices: Vec<f32>,
    /// Index data.
    pub indices: Indices,
}

impl MeshDescriptor {
    /// Create a mesh descriptor.
    pub fn new(vertices: Vec<f32>, indices: Indices) -> Self {
        Self {
            label: None,
            vertices,
            indices,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
