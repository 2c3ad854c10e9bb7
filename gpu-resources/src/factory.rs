//! Typed resource creation.
//!
//! Every creation follows the same steps:
//!
//! 1. Validate the request. Nothing is reserved for an invalid request.
//!    Cached image textures whose image is gone are handed to the disposer,
//!    so the pool can evict them if it needs the room.
//! 2. Reserve the estimated size in the pool of the resource's category,
//!    evicting reclaimable resources if needed.
//! 3. Call the native backend. A null handle hands the reservation back.
//! 4. Wrap the handle in a record registered with the context, and give the
//!    caller a typed resource that owns it.
//!
//! Budget and native failures are reported as transient errors
//! ([`ResourceError::is_transient`]); the caller should degrade or retry
//! later rather than give up.

use std::sync::Arc;

use crate::backend::NativeTextureRequest;
use crate::cache::WeakResourceCache;
use crate::context::Context;
use crate::disposer::ResourceOwner;
use crate::error::{ResourceError, ResourceResult};
use crate::handle::{Handle, ResourceKind};
use crate::pool::{estimate_mesh_size, estimate_render_target_size, estimate_texture_size};
use crate::resources::{GpuResource, Mesh, MeshView, RenderTarget, Shader, SwapChain, Texture};
use crate::types::{
    Image, MeshDescriptor, ShaderDescriptor, SwapChainDescriptor, TextureDescriptor,
    TextureFormat, TextureUsage, WrapMode,
};

/// Round `value` up to a power of two.
///
/// Returns 0 if `value` is larger than `max`. The result itself may exceed
/// `max` when `max` is not a power of two.
pub fn next_power_of_two(value: u32, max: u32) -> u32 {
    if value > max {
        return 0;
    }
    value.checked_next_power_of_two().unwrap_or(0)
}

/// Creates typed resources for one [`Context`].
///
/// The factory also owns three image texture caches, one per sampling
/// setup: clamped, repeating and mipmapped.
pub struct ResourceFactory {
    context: Arc<Context>,
    clamp_cache: WeakResourceCache<Image, Texture>,
    repeat_cache: WeakResourceCache<Image, Texture>,
    mipmap_cache: WeakResourceCache<Image, Texture>,
}

impl ResourceFactory {
    /// Create a factory for a context.
    pub fn new(context: Arc<Context>) -> Self {
        Self {
            context,
            clamp_cache: WeakResourceCache::new(),
            repeat_cache: WeakResourceCache::new(),
            mipmap_cache: WeakResourceCache::new(),
        }
    }

    /// The context resources are created on.
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Effective maximum texture dimension.
    pub fn max_texture_size(&self) -> u32 {
        self.context.max_texture_size()
    }

    /// Returns true if textures of this format can be created.
    pub fn is_format_supported(&self, format: TextureFormat) -> bool {
        self.context.capabilities().supports_format(format)
    }

    /// Round `value` up to a power of two, bounded by `max`.
    pub fn next_power_of_two(value: u32, max: u32) -> u32 {
        next_power_of_two(value, max)
    }

    /// Create a sampled texture.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidParameter`] for zero or oversized
    /// dimensions and unsupported formats, [`ResourceError::AllocationRejected`]
    /// if the texture budget is exhausted, and
    /// [`ResourceError::NativeCreationFailed`] if the driver fails.
    pub fn create_texture(&self, descriptor: &TextureDescriptor) -> ResourceResult<Texture> {
        self.validate_size(descriptor.width, descriptor.height)?;
        if !self.is_format_supported(descriptor.format) {
            return Err(ResourceError::InvalidParameter(format!(
                "texture format {:?} is not supported by the device",
                descriptor.format
            )));
        }

        let mut size = estimate_texture_size(descriptor.width, descriptor.height, descriptor.format);
        if descriptor.mipmapped {
            size += size / 3;
        }
        let request = NativeTextureRequest {
            format: descriptor.format,
            usage: descriptor.usage,
            width: descriptor.width,
            height: descriptor.height,
            samples: 0,
            mipmapped: descriptor.mipmapped,
        };

        let owner = self.allocate(ResourceKind::Texture, size, |device| {
            self.context.backend().create_texture(device, &request)
        })?;
        let physical = self.context.backend().texture_size(owner.record().handle());
        Ok(Texture::new(owner, descriptor.clone(), physical))
    }

    /// Create a texture and upload the pixels of an image into it.
    pub fn create_texture_from_image(
        &self,
        image: &Image,
        wrap_mode: WrapMode,
        mipmapped: bool,
    ) -> ResourceResult<Texture> {
        let descriptor = TextureDescriptor::new_2d(image.width(), image.height(), image.format())
            .with_wrap_mode(wrap_mode)
            .with_mipmaps(mipmapped);
        let texture = self.create_texture(&descriptor)?;

        if let Err(e) = texture.update(image.pixels()) {
            texture.dispose();
            return Err(e);
        }
        Ok(texture)
    }

    /// Get the texture derived from an image, creating it on first use.
    ///
    /// The texture is cached for as long as the `Arc<Image>` is alive. A cached
    /// texture that was evicted under budget pressure is recreated.
    pub fn get_cached_texture(
        &self,
        image: &Arc<Image>,
        wrap_mode: WrapMode,
        mipmapped: bool,
    ) -> ResourceResult<Texture> {
        let cache = if mipmapped {
            &self.mipmap_cache
        } else if wrap_mode == WrapMode::Repeat {
            &self.repeat_cache
        } else {
            &self.clamp_cache
        };

        let texture = cache.get_or_create(image, |image| {
            self.create_texture_from_image(image, wrap_mode, mipmapped)
        })?;
        if !texture.is_disposed() {
            texture.touch();
            return Ok(texture);
        }

        log::debug!("Cached texture for image was evicted, recreating");
        let texture = self.create_texture_from_image(image, wrap_mode, mipmapped)?;
        cache.insert(image, texture.clone());
        Ok(texture)
    }

    /// Create a render target.
    ///
    /// With `force_pow2` set, the allocation is rounded up to powers of two
    /// and charged at the rounded size; the content region keeps the
    /// requested size. With `msaa`, the device's maximum sample count is
    /// used. New targets are cleared to transparent black.
    pub fn create_render_target(
        &self,
        width: u32,
        height: u32,
        wrap_mode: WrapMode,
        msaa: bool,
    ) -> ResourceResult<RenderTarget> {
        self.validate_size(width, height)?;

        let max = self.max_texture_size();
        let (alloc_width, alloc_height) = if self.context.settings().force_pow2 {
            (next_power_of_two(width, max), next_power_of_two(height, max))
        } else {
            (width, height)
        };
        if alloc_width == 0 || alloc_height == 0 || alloc_width > max || alloc_height > max {
            return Err(ResourceError::InvalidParameter(format!(
                "render target {width}x{height} does not fit the {max} size limit after rounding"
            )));
        }

        let samples = if msaa {
            self.context.capabilities().max_samples
        } else {
            0
        };
        let size = estimate_render_target_size(alloc_width, alloc_height, samples, false);
        let request = NativeTextureRequest {
            format: TextureFormat::Bgra8Premultiplied,
            usage: TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED | TextureUsage::READBACK,
            width: alloc_width,
            height: alloc_height,
            samples,
            mipmapped: false,
        };

        let owner = self.allocate(ResourceKind::RenderTarget, size, |device| {
            self.context.backend().create_texture(device, &request)
        })?;

        let backend = self.context.backend();
        let handle = owner.record().handle();
        let physical = backend.texture_size(handle);
        if !backend.clear_texture(self.context.device(), handle) {
            log::warn!("RenderTarget {handle}: initial clear failed");
        }

        Ok(RenderTarget::new(
            owner,
            (width, height),
            physical,
            samples,
            wrap_mode,
        ))
    }

    /// Create a pixel shader from compiled bytecode.
    pub fn create_shader(&self, descriptor: &ShaderDescriptor) -> ResourceResult<Shader> {
        if descriptor.bytecode.is_empty() {
            return Err(ResourceError::InvalidParameter(
                "shader bytecode cannot be empty".to_string(),
            ));
        }
        let owner = self.allocate(ResourceKind::Shader, 0, |device| {
            self.context.backend().create_shader(device, descriptor)
        })?;
        Ok(Shader::new(owner, descriptor.clone()))
    }

    /// Create a mesh and upload its geometry.
    ///
    /// If the geometry upload fails, the native mesh and its reservation are
    /// released before the error is returned.
    pub fn create_mesh(&self, descriptor: &MeshDescriptor) -> ResourceResult<Mesh> {
        if descriptor.vertices.is_empty() {
            return Err(ResourceError::InvalidParameter(
                "mesh has no vertices".to_string(),
            ));
        }

        let size = estimate_mesh_size(descriptor.vertices.len(), &descriptor.indices);
        let owner = self.allocate(ResourceKind::Mesh, size, |device| {
            self.context.backend().create_mesh(device)
        })?;

        let handle = owner.record().handle();
        if !self
            .context
            .backend()
            .build_mesh_geometry(self.context.device(), handle, descriptor)
        {
            log::warn!("Mesh {handle}: geometry upload failed");
            owner.record().dispose();
            return Err(ResourceError::native(
                ResourceKind::Mesh,
                "geometry upload failed",
            ));
        }

        Ok(Mesh::new(
            owner,
            descriptor.label.as_deref(),
            descriptor.vertices.len(),
            descriptor.indices.len(),
        ))
    }

    /// Create a drawable view of a mesh.
    pub fn create_mesh_view(&self, mesh: &Mesh) -> ResourceResult<MeshView> {
        let mesh_handle = mesh.handle();
        if mesh_handle.is_null() {
            return Err(ResourceError::Disposed(ResourceKind::Mesh));
        }
        let owner = self.allocate(ResourceKind::MeshView, 0, |device| {
            self.context.backend().create_mesh_view(device, mesh_handle)
        })?;
        Ok(MeshView::new(owner, mesh.clone()))
    }

    /// Create a swap chain and its back buffer.
    ///
    /// If the back buffer cannot be created, the native swap chain is released
    /// before the error is returned.
    pub fn create_swap_chain(&self, descriptor: &SwapChainDescriptor) -> ResourceResult<SwapChain> {
        if descriptor.window == 0 {
            return Err(ResourceError::InvalidParameter(
                "swap chain needs a native window".to_string(),
            ));
        }
        self.validate_size(descriptor.width, descriptor.height)?;

        let vsync = self.context.settings().vsync;
        let owner = self.allocate(ResourceKind::SwapChain, 0, |device| {
            self.context
                .backend()
                .create_swap_chain(device, descriptor.window, vsync)
        })?;

        let back_buffer = match self.create_render_target(
            descriptor.width,
            descriptor.height,
            WrapMode::ClampNotNeeded,
            descriptor.msaa,
        ) {
            Ok(target) => target,
            Err(e) => {
                log::warn!("SwapChain: back buffer creation failed: {e}");
                owner.record().dispose();
                return Err(e);
            }
        };

        Ok(SwapChain::new(
            owner,
            back_buffer,
            descriptor.window,
            (descriptor.scale_x, descriptor.scale_y),
        ))
    }

    /// Drop every cached image texture. Used on teardown.
    pub fn clear_caches(&self) {
        self.clamp_cache.clear();
        self.repeat_cache.clear();
        self.mipmap_cache.clear();
    }

    /// Release cached textures whose source image has been dropped.
    ///
    /// Their records become orphaned and are queued on the disposer. Returns
    /// the number of textures let go.
    pub fn purge_caches(&self) -> usize {
        let purged =
            self.clamp_cache.purge() + self.repeat_cache.purge() + self.mipmap_cache.purge();
        if purged > 0 {
            log::debug!("ResourceFactory: released {purged} cached textures of dropped images");
        }
        purged
    }

    /// Number of live entries in the image texture caches.
    pub fn cached_texture_count(&self) -> usize {
        self.clamp_cache.len() + self.repeat_cache.len() + self.mipmap_cache.len()
    }

    fn validate_size(&self, width: u32, height: u32) -> ResourceResult<()> {
        if width == 0 || height == 0 {
            return Err(ResourceError::InvalidParameter(
                "dimensions cannot be zero".to_string(),
            ));
        }
        let max = self.max_texture_size();
        if width > max || height > max {
            return Err(ResourceError::InvalidParameter(format!(
                "{width}x{height} exceeds maximum texture size {max}"
            )));
        }
        Ok(())
    }

    /// Reserve, create natively and register one resource.
    fn allocate(
        &self,
        kind: ResourceKind,
        size: u64,
        create: impl FnOnce(Handle) -> Handle,
    ) -> ResourceResult<Arc<ResourceOwner>> {
        if self.context.is_disposed() {
            return Err(ResourceError::ContextDisposed);
        }

        let pool = kind.pool_category().map(|category| self.context.pool(category));
        let size = if pool.is_some() { size } else { 0 };
        if let Some(pool) = pool {
            self.purge_caches();
            pool.reserve(size)?;
        }

        let handle = create(self.context.device());
        if handle.is_null() {
            if let Some(pool) = pool {
                pool.release(size);
            }
            log::warn!(
                "Context({}): native {kind} creation failed ({size} bytes)",
                self.context.adapter()
            );
            return Err(ResourceError::native(kind, "backend returned a null handle"));
        }

        let record = self.context.track(kind, handle, size)?;
        Ok(Arc::new(self.context.disposer().register(record)))
    }
}

impl std::fmt::Debug for ResourceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceFactory")
            .field("context", &self.context)
            .field("cached_textures", &self.cached_texture_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(ResourceFactory: Send, Sync);
