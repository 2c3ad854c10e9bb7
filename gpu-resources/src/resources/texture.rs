//! Sampled texture resource.

use std::sync::Arc;

use crate::disposer::ResourceOwner;
use crate::error::{ResourceError, ResourceResult};
use crate::types::{TextureDescriptor, TextureFormat, WrapMode};

use super::{GpuResource, live_target};

/// A sampled GPU texture.
///
/// Textures are created by [`ResourceFactory`](crate::ResourceFactory) and are
/// cheap to clone; all clones share one native texture.
///
/// # Example
///
/// ```ignore
/// let texture = factory.create_texture(&TextureDescriptor::new_2d(
///     256, 256,
///     TextureFormat::Bgra8Premultiplied,
/// ))?;
/// texture.update(&pixels)?;
/// ```
#[derive(Clone)]
pub struct Texture {
    owner: Arc<ResourceOwner>,
    descriptor: Arc<TextureDescriptor>,
    physical_width: u32,
    physical_height: u32,
}

impl Texture {
    pub(crate) fn new(
        owner: Arc<ResourceOwner>,
        descriptor: TextureDescriptor,
        physical_size: (u32, u32),
    ) -> Self {
        Self {
            owner,
            descriptor: Arc::new(descriptor),
            physical_width: physical_size.0,
            physical_height: physical_size.1,
        }
    }

    /// Get the texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Get the content width.
    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    /// Get the content height.
    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    /// Width of the native allocation.
    pub fn physical_width(&self) -> u32 {
        self.physical_width
    }

    /// Height of the native allocation.
    pub fn physical_height(&self) -> u32 {
        self.physical_height
    }

    /// Get the texture format.
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    /// Get the wrap mode.
    pub fn wrap_mode(&self) -> WrapMode {
        self.descriptor.wrap_mode
    }

    /// Get the texture label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Upload pixel data covering the whole allocation.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidParameter`] if the data size does not
    /// match the allocation and [`ResourceError::Disposed`] if the texture has
    /// been released.
    pub fn update(&self, data: &[u8]) -> ResourceResult<()> {
        let expected = self.physical_width as usize
            * self.physical_height as usize
            * self.format().bytes_per_pixel() as usize;
        if data.len() != expected {
            return Err(ResourceError::InvalidParameter(format!(
                "texture upload is {} bytes, expected {expected}",
                data.len()
            )));
        }

        let (context, handle) = live_target(self.record())?;
        if !context
            .backend()
            .update_texture(context.device(), handle, data)
        {
            log::warn!("Texture {handle}: upload of {} bytes failed", data.len());
            return Err(ResourceError::NativeOperationFailed {
                kind: self.kind(),
                operation: "upload",
            });
        }
        Ok(())
    }
}

impl GpuResource for Texture {
    fn owner(&self) -> &Arc<ResourceOwner> {
        &self.owner
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("handle", &self.handle())
            .field("width", &self.descriptor.width)
            .field("height", &self.descriptor.height)
            .field("format", &self.descriptor.format)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure Texture is Send + Sync
static_assertions::assert_impl_all!(Texture: Send, Sync);
