//! Pixel shader resource.

use std::sync::Arc;

use crate::disposer::ResourceOwner;
use crate::types::ShaderDescriptor;

use super::GpuResource;

/// A compiled pixel shader.
///
/// Besides the native shader, this keeps the constant register table so the
/// pipeline can look up where to upload named parameters.
#[derive(Clone)]
pub struct Shader {
    owner: Arc<ResourceOwner>,
    descriptor: Arc<ShaderDescriptor>,
}

impl Shader {
    pub(crate) fn new(owner: Arc<ResourceOwner>, descriptor: ShaderDescriptor) -> Self {
        Self {
            owner,
            descriptor: Arc::new(descriptor),
        }
    }

    /// Register index of a named constant.
    pub fn register(&self, name: &str) -> Option<u32> {
        self.descriptor.registers.get(name).copied()
    }

    /// Highest texture coordinate set the shader reads.
    pub fn max_tex_coord_index(&self) -> u32 {
        self.descriptor.max_tex_coord_index
    }

    /// Returns true if the shader reads the pixel coordinate.
    pub fn uses_pixcoord(&self) -> bool {
        self.descriptor.uses_pixcoord
    }

    /// Returns true if the shader reads per-vertex color.
    pub fn uses_vertex_color(&self) -> bool {
        self.descriptor.uses_vertex_color
    }

    /// Get the shader label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl GpuResource for Shader {
    fn owner(&self) -> &Arc<ResourceOwner> {
        &self.owner
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("handle", &self.handle())
            .field("label", &self.descriptor.label)
            .field("registers", &self.descriptor.registers.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(Shader: Send, Sync);
