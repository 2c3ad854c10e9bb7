//! Typed GPU resources.
//!
//! This module contains the resource types created by
//! [`ResourceFactory`](crate::ResourceFactory):
//! - [`Texture`] - sampled texture
//! - [`RenderTarget`] - texture that can be rendered into and read back
//! - [`Shader`] - compiled pixel shader
//! - [`Mesh`] / [`MeshView`] - geometry and drawable instances of it
//! - [`SwapChain`] - presentable window surface with its back buffer
//!
//! Every resource is a cheap `Clone` handle around a shared
//! [`ResourceOwner`]. Dropping the last clone queues the native release on
//! the disposer; [`GpuResource::dispose`] releases eagerly.

mod mesh;
mod render_target;
mod shader;
mod swap_chain;
mod texture;

use std::sync::Arc;

pub use mesh::{Mesh, MeshView};
pub use render_target::RenderTarget;
pub use shader::Shader;
pub use swap_chain::SwapChain;
pub use texture::Texture;

use crate::context::ContextShared;
use crate::disposer::ResourceOwner;
use crate::error::{ResourceError, ResourceResult};
use crate::handle::{Handle, ResourceKind};
use crate::record::DisposableRecord;

/// Operations shared by every typed resource.
pub trait GpuResource {
    /// The shared owner of the native resource.
    fn owner(&self) -> &Arc<ResourceOwner>;

    /// The disposable record.
    fn record(&self) -> &Arc<DisposableRecord> {
        self.owner().record()
    }

    /// The native handle, or [`Handle::NULL`] once disposed.
    fn handle(&self) -> Handle {
        self.record().handle()
    }

    /// Kind of native resource.
    fn kind(&self) -> ResourceKind {
        self.record().kind()
    }

    /// Returns true once the native resource has been released.
    fn is_disposed(&self) -> bool {
        self.record().is_disposed()
    }

    /// Release the native resource now. Returns `true` if this call released it.
    fn dispose(&self) -> bool {
        self.record().dispose()
    }

    /// Mark the resource as used, moving it to the back of the eviction order.
    fn touch(&self) {
        if let Some(context) = self.record().context() {
            context.touch(self.record());
        }
    }

    /// Keep the resource from being evicted while the pin is held.
    fn pin(&self) -> ResourcePin {
        ResourcePin::new(Arc::clone(self.owner()))
    }

    /// Declare whether the contents are still needed.
    ///
    /// Resources whose contents are not useful may be evicted under budget
    /// pressure while unpinned, even though they are still owned.
    fn set_contents_useful(&self, useful: bool) {
        self.record().set_discardable(!useful);
    }
}

/// Guard that keeps a resource non-evictable.
#[must_use = "the resource is unpinned when the guard is dropped"]
pub struct ResourcePin {
    owner: Arc<ResourceOwner>,
}

impl ResourcePin {
    fn new(owner: Arc<ResourceOwner>) -> Self {
        owner.record().pin();
        Self { owner }
    }
}

impl Drop for ResourcePin {
    fn drop(&mut self) {
        self.owner.record().unpin();
    }
}

impl std::fmt::Debug for ResourcePin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ResourcePin")
            .field(&self.owner.record().id())
            .finish()
    }
}

/// Resolve the context and live handle of a record for a native operation.
pub(crate) fn live_target(
    record: &DisposableRecord,
) -> ResourceResult<(Arc<ContextShared>, Handle)> {
    let handle = record.handle();
    if handle.is_null() {
        return Err(ResourceError::Disposed(record.kind()));
    }
    let context = record.context().ok_or(ResourceError::ContextDisposed)?;
    context.touch(record);
    Ok((context, handle))
}

static_assertions::assert_impl_all!(ResourcePin: Send, Sync);
