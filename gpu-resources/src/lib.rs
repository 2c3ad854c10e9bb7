//! # RedLilium GPU Resources
//!
//! Lifetime management for native GPU resources.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`ContextRegistry`] - one [`Context`] per adapter, created lazily and torn
//!   down explicitly on the thread that created it
//! - [`ResourceFactory`] - typed creation of textures, render targets,
//!   shaders, meshes and swap chains, gated by per-category budgets
//! - [`ResourcePool`] - memory budget with eviction of reclaimable resources
//! - [`Disposer`] - background release of resources whose owners were dropped
//! - [`WeakResourceCache`] - image to texture caches that do not keep images alive
//! - [`NativeBackend`] - the seam to the native graphics API, with a
//!   [`DummyBackend`] for tests
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use redlilium_gpu_resources::{ContextRegistry, DummyBackend, ResourceSettings, WrapMode};
//!
//! let registry = ContextRegistry::new(Arc::new(DummyBackend::new()), ResourceSettings::default())?;
//! let factory = registry.find_default()?;
//! let target = factory.create_render_target(800, 600, WrapMode::ClampToZero, false)?;
//! drop(target); // released on the disposer thread
//! registry.dispose()?;
//! ```

mod affinity;
pub mod backend;
pub mod cache;
pub mod config;
pub mod context;
pub mod disposer;
pub mod error;
pub mod factory;
pub mod handle;
pub mod pool;
pub mod record;
pub mod registry;
pub mod resources;
pub mod types;

// Re-export main types for convenience
pub use backend::{
    BackendCapabilities, DummyBackend, DummyFailure, NativeBackend, NativeTextureRequest,
};
pub use cache::WeakResourceCache;
pub use config::{ResourceSettings, load_or_default, load_settings};
pub use context::Context;
pub use disposer::{Disposer, DisposerHandle, DisposerStats, ResourceOwner};
pub use error::{ResourceError, ResourceResult};
pub use factory::{ResourceFactory, next_power_of_two};
pub use handle::{Handle, RecordId, ResourceKind};
pub use pool::{
    PoolCategory, PoolStats, ResourcePool, estimate_mesh_size, estimate_render_target_size,
    estimate_texture_size,
};
pub use record::DisposableRecord;
pub use registry::ContextRegistry;
pub use resources::{
    GpuResource, Mesh, MeshView, RenderTarget, ResourcePin, Shader, SwapChain, Texture,
};
pub use types::{
    Image, Indices, MeshDescriptor, ShaderDescriptor, SwapChainDescriptor, TextureDescriptor,
    TextureFormat, TextureUsage, WrapMode,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the resource subsystem.
///
/// This should be called once before creating a [`ContextRegistry`].
pub fn init() {
    log::info!("RedLilium GPU Resources v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_backend() {
        let backend = DummyBackend::new();
        assert!(backend.name() == "Dummy");
    }
}
