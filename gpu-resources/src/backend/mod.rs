//! Native backend seam.
//!
//! Every call that touches the native graphics API goes through the
//! [`NativeBackend`] trait. Backends hand out opaque [`Handle`]s and use
//! [`Handle::NULL`] to report creation failure; release never reports
//! errors to the caller; the backend logs them itself.
//!
//! # Available Backends
//!
//! - [`DummyBackend`]: in-memory backend for tests and headless runs. It
//!   counts creations and releases and can inject failures.
//!
//! Hardware backends live with the platform integration and implement the
//! same trait.

pub mod dummy;

pub use dummy::{DummyBackend, DummyFailure};

use crate::handle::Handle;
use crate::types::{MeshDescriptor, ShaderDescriptor, TextureFormat, TextureUsage};

/// Capabilities of a native device.
///
/// Queried once when a [`Context`](crate::Context) is created and cached for
/// its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendCapabilities {
    /// Maximum texture dimension.
    pub max_texture_size: u32,
    /// Maximum multisample count for render targets.
    pub max_samples: u32,
    /// Pixel shader model (major, minor).
    pub shader_model: (u8, u8),
    /// Whether floating point textures can be created.
    pub float_textures: bool,
}

impl BackendCapabilities {
    /// Returns true if textures of this format can be created.
    pub fn supports_format(&self, format: TextureFormat) -> bool {
        !format.is_float() || self.float_textures
    }
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            max_texture_size: 16384,
            max_samples: 4,
            shader_model: (5, 0),
            float_textures: true,
        }
    }
}

/// Parameters of a native texture allocation.
///
/// Dimensions are the physical allocation size, after any power-of-two
/// rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeTextureRequest {
    /// Pixel format.
    pub format: TextureFormat,
    /// Usage hints.
    pub usage: TextureUsage,
    /// Physical width.
    pub width: u32,
    /// Physical height.
    pub height: u32,
    /// Multisample count, 0 or 1 for none.
    pub samples: u32,
    /// Allocate a mip chain.
    pub mipmapped: bool,
}

impl NativeTextureRequest {
    /// Returns true if the texture can be rendered into.
    pub fn is_render_target(&self) -> bool {
        self.usage.contains(TextureUsage::RENDER_TARGET)
    }
}

/// The native graphics API, as seen by the resource layer.
pub trait NativeBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Number of adapters available.
    fn adapter_count(&self) -> usize;

    /// Create a device for an adapter. Returns [`Handle::NULL`] on failure.
    fn create_device(&self, adapter: usize) -> Handle;

    /// Destroy a device. All resources must have been released.
    fn destroy_device(&self, device: Handle);

    /// Query device capabilities.
    fn capabilities(&self, device: Handle) -> BackendCapabilities;

    /// Create a texture. Returns [`Handle::NULL`] on failure.
    fn create_texture(&self, device: Handle, request: &NativeTextureRequest) -> Handle;

    /// Physical size of a texture as allocated by the driver.
    fn texture_size(&self, texture: Handle) -> (u32, u32);

    /// Upload pixel data covering the whole texture.
    fn update_texture(&self, device: Handle, texture: Handle, data: &[u8]) -> bool;

    /// Clear a render target to transparent black.
    fn clear_texture(&self, device: Handle, texture: Handle) -> bool;

    /// Read back the contents of a render target.
    fn read_texture(&self, device: Handle, texture: Handle) -> Option<Vec<u8>>;

    /// Create a pixel shader from bytecode. Returns [`Handle::NULL`] on failure.
    fn create_shader(&self, device: Handle, descriptor: &ShaderDescriptor) -> Handle;

    /// Create an empty mesh. Returns [`Handle::NULL`] on failure.
    fn create_mesh(&self, device: Handle) -> Handle;

    /// Upload vertex and index data into a mesh.
    fn build_mesh_geometry(&self, device: Handle, mesh: Handle, descriptor: &MeshDescriptor)
    -> bool;

    /// Create a drawable view of a mesh. Returns [`Handle::NULL`] on failure.
    fn create_mesh_view(&self, device: Handle, mesh: Handle) -> Handle;

    /// Create a swap chain for a native window. Returns [`Handle::NULL`] on failure.
    fn create_swap_chain(&self, device: Handle, window: u64, vsync: bool) -> Handle;

    /// Present a swap chain.
    fn present(&self, device: Handle, swap_chain: Handle) -> bool;

    /// Release a native resource.
    fn release(&self, device: Handle, resource: Handle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_support() {
        let caps = BackendCapabilities {
            float_textures: false,
            ..Default::default()
        };
        assert!(!caps.supports_format(TextureFormat::Rgba32Float));
        assert!(caps.supports_format(TextureFormat::Bgra8Premultiplied));
        assert!(BackendCapabilities::default().supports_format(TextureFormat::Rgba16Float));
    }
}
