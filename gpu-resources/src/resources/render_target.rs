//! Render target resource.

use std::sync::Arc;

use crate::disposer::ResourceOwner;
use crate::error::{ResourceError, ResourceResult};
use crate::types::WrapMode;

use super::{GpuResource, live_target};

const BYTES_PER_PIXEL: usize = 4;

/// A texture that can be rendered into.
///
/// The native allocation may be larger than the requested content size when
/// power-of-two rounding is forced; [`width`](Self::width) and
/// [`height`](Self::height) always report the content region.
#[derive(Clone)]
pub struct RenderTarget {
    owner: Arc<ResourceOwner>,
    width: u32,
    height: u32,
    physical_width: u32,
    physical_height: u32,
    samples: u32,
    wrap_mode: WrapMode,
}

impl RenderTarget {
    pub(crate) fn new(
        owner: Arc<ResourceOwner>,
        content_size: (u32, u32),
        physical_size: (u32, u32),
        samples: u32,
        wrap_mode: WrapMode,
    ) -> Self {
        Self {
            owner,
            width: content_size.0,
            height: content_size.1,
            physical_width: physical_size.0,
            physical_height: physical_size.1,
            samples,
            wrap_mode,
        }
    }

    /// Content width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Content height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width of the native allocation.
    pub fn physical_width(&self) -> u32 {
        self.physical_width
    }

    /// Height of the native allocation.
    pub fn physical_height(&self) -> u32 {
        self.physical_height
    }

    /// Multisample count, 0 when not multisampled.
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Returns true if the target is multisampled.
    pub fn is_msaa(&self) -> bool {
        self.samples > 1
    }

    /// Wrap mode used when the target is sampled.
    pub fn wrap_mode(&self) -> WrapMode {
        self.wrap_mode
    }

    /// Read back the content region as tightly packed 32-bit pixels.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Disposed`] if the target has been released and
    /// [`ResourceError::NativeOperationFailed`] if the driver refuses the
    /// read-back.
    pub fn read_pixels(&self) -> ResourceResult<Vec<u8>> {
        let (context, handle) = live_target(self.record())?;
        let failed = || ResourceError::NativeOperationFailed {
            kind: self.kind(),
            operation: "read-back",
        };

        let data = context
            .backend()
            .read_texture(context.device(), handle)
            .ok_or_else(failed)?;

        let src_stride = self.physical_width as usize * BYTES_PER_PIXEL;
        let row = self.width as usize * BYTES_PER_PIXEL;
        if data.len() < src_stride * self.height as usize {
            log::warn!(
                "RenderTarget {handle}: read-back returned {} bytes, too short",
                data.len()
            );
            return Err(failed());
        }

        let mut pixels = Vec::with_capacity(row * self.height as usize);
        for y in 0..self.height as usize {
            let start = y * src_stride;
            pixels.extend_from_slice(&data[start..start + row]);
        }
        Ok(pixels)
    }
}

impl GpuResource for RenderTarget {
    fn owner(&self) -> &Arc<ResourceOwner> {
        &self.owner
    }
}

impl std::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("handle", &self.handle())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("physical_width", &self.physical_width)
            .field("physical_height", &self.physical_height)
            .field("samples", &self.samples)
            .finish()
    }
}

static_assertions::assert_impl_all!(RenderTarget: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::config::ResourceSettings;
    use crate::context::Context;
    use crate::disposer::Disposer;
    use crate::factory::ResourceFactory;

    fn create_test_factory(settings: ResourceSettings) -> (Disposer, ResourceFactory) {
        let disposer = Disposer::start("render-target-test").unwrap();
        let context = Context::new(
            0,
            Arc::new(DummyBackend::new()),
            Arc::new(settings),
            disposer.handle(),
        )
        .unwrap();
        (disposer, ResourceFactory::new(context))
    }

    #[test]
    fn test_new_target_reads_back_zeroed() {
        let (_disposer, factory) = create_test_factory(ResourceSettings::default());
        let target = factory
            .create_render_target(3, 2, WrapMode::ClampToZero, false)
            .unwrap();
        assert_eq!(target.read_pixels().unwrap(), vec![0; 3 * 2 * 4]);
    }

    #[test]
    fn test_read_back_crops_to_content() {
        let settings = ResourceSettings::default().with_force_pow2(true);
        let (_disposer, factory) = create_test_factory(settings);
        let target = factory
            .create_render_target(5, 3, WrapMode::ClampNotNeeded, false)
            .unwrap();

        assert_eq!((target.width(), target.height()), (5, 3));
        assert_eq!((target.physical_width(), target.physical_height()), (8, 4));
        assert_eq!(target.read_pixels().unwrap().len(), 5 * 3 * 4);
    }

    #[test]
    fn test_read_back_after_dispose() {
        let (_disposer, factory) = create_test_factory(ResourceSettings::default());
        let target = factory
            .create_render_target(4, 4, WrapMode::ClampToEdge, false)
            .unwrap();
        assert!(target.dispose());
        assert!(matches!(
            target.read_pixels(),
            Err(ResourceError::Disposed(_))
        ));
    }
}
