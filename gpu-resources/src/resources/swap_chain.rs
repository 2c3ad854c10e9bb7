//! Swap chain resource.

use std::sync::Arc;

use crate::disposer::ResourceOwner;
use crate::error::{ResourceError, ResourceResult};

use super::{GpuResource, RenderTarget, live_target};

/// A presentable surface bound to a native window.
///
/// Rendering goes into the [`back_buffer`](Self::back_buffer), which is a
/// regular render target charged to the render target pool.
#[derive(Clone)]
pub struct SwapChain {
    owner: Arc<ResourceOwner>,
    back_buffer: RenderTarget,
    window: u64,
    scale_x: f32,
    scale_y: f32,
}

impl SwapChain {
    pub(crate) fn new(
        owner: Arc<ResourceOwner>,
        back_buffer: RenderTarget,
        window: u64,
        scale: (f32, f32),
    ) -> Self {
        Self {
            owner,
            back_buffer,
            window,
            scale_x: scale.0,
            scale_y: scale.1,
        }
    }

    /// The render target presented by this swap chain.
    pub fn back_buffer(&self) -> &RenderTarget {
        &self.back_buffer
    }

    /// Native window handle.
    pub fn window(&self) -> u64 {
        self.window
    }

    /// Content width in physical pixels.
    pub fn width(&self) -> u32 {
        self.back_buffer.width()
    }

    /// Content height in physical pixels.
    pub fn height(&self) -> u32 {
        self.back_buffer.height()
    }

    /// Horizontal render scale.
    pub fn scale_x(&self) -> f32 {
        self.scale_x
    }

    /// Vertical render scale.
    pub fn scale_y(&self) -> f32 {
        self.scale_y
    }

    /// Returns true if the back buffer is multisampled.
    pub fn is_msaa(&self) -> bool {
        self.back_buffer.is_msaa()
    }

    /// Present the back buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Disposed`] after disposal and
    /// [`ResourceError::NativeOperationFailed`] if the driver fails to present.
    pub fn present(&self) -> ResourceResult<()> {
        if self.back_buffer.is_disposed() {
            return Err(ResourceError::Disposed(self.back_buffer.kind()));
        }
        let (context, handle) = live_target(self.record())?;
        self.back_buffer.touch();
        if !context.backend().present(context.device(), handle) {
            log::warn!("SwapChain {handle}: present failed");
            return Err(ResourceError::NativeOperationFailed {
                kind: self.kind(),
                operation: "present",
            });
        }
        Ok(())
    }
}

impl GpuResource for SwapChain {
    fn owner(&self) -> &Arc<ResourceOwner> {
        &self.owner
    }

    /// Release the swap chain together with its back buffer.
    fn dispose(&self) -> bool {
        let released = self.record().dispose();
        self.back_buffer.dispose();
        released
    }
}

impl std::fmt::Debug for SwapChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwapChain")
            .field("handle", &self.handle())
            .field("window", &format_args!("{:#x}", self.window))
            .field("back_buffer", &self.back_buffer)
            .finish()
    }
}

static_assertions::assert_impl_all!(SwapChain: Send, Sync);
