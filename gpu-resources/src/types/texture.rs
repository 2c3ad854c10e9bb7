//! Texture types and descriptors.

use bitflags::bitflags;

/// Pixel format of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    /// 8-bit BGRA channels, premultiplied alpha.
    #[default]
    Bgra8Premultiplied,
    /// 32-bit packed ARGB, premultiplied alpha.
    Argb8Premultiplied,
    /// 8-bit RGB channels, no alpha.
    Rgb8,
    /// 8-bit luminance.
    Gray8,
    /// 8-bit alpha mask.
    Alpha8,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
}

impl TextureFormat {
    /// Returns the size in bytes of one pixel.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::Gray8 | Self::Alpha8 => 1,
            Self::Rgb8 => 3,
            Self::Bgra8Premultiplied | Self::Argb8Premultiplied => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }

    /// Returns true if this is a floating point format.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Rgba16Float | Self::Rgba32Float)
    }

    /// Returns true if the format carries premultiplied alpha.
    pub fn is_premultiplied(&self) -> bool {
        matches!(self, Self::Bgra8Premultiplied | Self::Argb8Premultiplied)
    }
}

bitflags! {
    /// Usage hints for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture is sampled in shaders.
        const SAMPLED = 1 << 0;
        /// Texture contents are updated frequently from the CPU.
        const DYNAMIC = 1 << 1;
        /// Texture can be rendered into.
        const RENDER_TARGET = 1 << 2;
        /// Texture contents can be read back to the CPU.
        const READBACK = 1 << 3;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::SAMPLED
    }
}

/// Addressing mode used when sampling outside the content region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    /// Edges do not need to be clamped.
    ClampNotNeeded,
    /// Clamp to the edge pixels.
    #[default]
    ClampToEdge,
    /// Clamp to transparent black.
    ClampToZero,
    /// Tile the texture.
    Repeat,
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: TextureFormat,
    /// Usage hints.
    pub usage: TextureUsage,
    /// Wrap mode.
    pub wrap_mode: WrapMode,
    /// Allocate a full mip chain.
    pub mipmapped: bool,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            width,
            height,
            format,
            usage: TextureUsage::default(),
            wrap_mode: WrapMode::default(),
            mipmapped: false,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the usage hints.
    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Set the wrap mode.
    pub fn with_wrap_mode(mut self, wrap_mode: WrapMode) -> Self {
        self.wrap_mode = wrap_mode;
        self
    }

    /// Request a mip chain.
    pub fn with_mipmaps(mut self, mipmapped: bool) -> Self {
        self.mipmapped = mipmapped;
        self
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self::new_2d(1, 1, TextureFormat::default())
    }
}
