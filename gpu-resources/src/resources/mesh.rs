//! Mesh and mesh view resources.

use std::sync::Arc;

use crate::disposer::ResourceOwner;

use super::GpuResource;

/// Vertex and index geometry uploaded to the device.
#[derive(Clone)]
pub struct Mesh {
    owner: Arc<ResourceOwner>,
    label: Option<Arc<str>>,
    vertex_floats: usize,
    index_count: usize,
}

impl Mesh {
    pub(crate) fn new(
        owner: Arc<ResourceOwner>,
        label: Option<&str>,
        vertex_floats: usize,
        index_count: usize,
    ) -> Self {
        Self {
            owner,
            label: label.map(Arc::from),
            vertex_floats,
            index_count,
        }
    }

    /// Number of `f32` values in the vertex data.
    pub fn vertex_floats(&self) -> usize {
        self.vertex_floats
    }

    /// Number of indices.
    pub fn index_count(&self) -> usize {
        self.index_count
    }

    /// Get the mesh label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl GpuResource for Mesh {
    fn owner(&self) -> &Arc<ResourceOwner> {
        &self.owner
    }
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("handle", &self.handle())
            .field("vertex_floats", &self.vertex_floats)
            .field("index_count", &self.index_count)
            .field("label", &self.label)
            .finish()
    }
}

/// A drawable instance of a [`Mesh`].
///
/// A view keeps its mesh alive; the mesh is released only after every view
/// of it has been dropped.
#[derive(Clone)]
pub struct MeshView {
    owner: Arc<ResourceOwner>,
    mesh: Mesh,
}

impl MeshView {
    pub(crate) fn new(owner: Arc<ResourceOwner>, mesh: Mesh) -> Self {
        Self { owner, mesh }
    }

    /// The viewed mesh.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }
}

impl GpuResource for MeshView {
    fn owner(&self) -> &Arc<ResourceOwner> {
        &self.owner
    }
}

impl std::fmt::Debug for MeshView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshView")
            .field("handle", &self.handle())
            .field("mesh", &self.mesh.handle())
            .finish()
    }
}

static_assertions::assert_impl_all!(Mesh: Send, Sync);
static_assertions::assert_impl_all!(MeshView: Send, Sync);
