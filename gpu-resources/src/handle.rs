//! Opaque native handles and resource kinds.

use std::fmt;

use crate::pool::PoolCategory;

/// Opaque native resource identifier.
///
/// The value is meaningless without the device it was issued for. Zero is
/// reserved to mean "no native resource", and native creation calls return
/// [`Handle::NULL`] to signal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle(pub(crate) u64);

impl Handle {
    /// The null handle.
    pub const NULL: Handle = Handle(0);

    /// Wrap a raw native value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw native value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns true if this handle refers to no native resource.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identifier of a [`DisposableRecord`](crate::DisposableRecord) within its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub(crate) u64);

impl RecordId {
    /// Get the raw id.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// The kind of native resource a record owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Native device of a context.
    Device,
    /// Sampled texture.
    Texture,
    /// Texture that can be rendered into.
    RenderTarget,
    /// Compiled pixel shader.
    Shader,
    /// Vertex/index geometry.
    Mesh,
    /// Drawable instance of a mesh.
    MeshView,
    /// Presentable swap chain.
    SwapChain,
}

impl ResourceKind {
    /// The budget pool this kind is charged against, if any.
    pub fn pool_category(self) -> Option<PoolCategory> {
        match self {
            Self::Texture => Some(PoolCategory::Textures),
            Self::RenderTarget => Some(PoolCategory::RenderTargets),
            Self::Mesh => Some(PoolCategory::Geometry),
            Self::Device | Self::Shader | Self::MeshView | Self::SwapChain => None,
        }
    }

    /// Human readable name, used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Texture => "texture",
            Self::RenderTarget => "render target",
            Self::Shader => "shader",
            Self::Mesh => "mesh",
            Self::MeshView => "mesh view",
            Self::SwapChain => "swap chain",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle() {
        assert!(Handle::NULL.is_null());
        assert!(Handle::default().is_null());
        assert!(!Handle::from_raw(7).is_null());
        assert_eq!(Handle::from_raw(7).raw(), 7);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(Handle::from_raw(255).to_string(), "0xff");
    }

    #[test]
    fn test_pool_categories() {
        assert_eq!(
            ResourceKind::Texture.pool_category(),
            Some(PoolCategory::Textures)
        );
        assert_eq!(
            ResourceKind::RenderTarget.pool_category(),
            Some(PoolCategory::RenderTargets)
        );
        assert_eq!(
            ResourceKind::Mesh.pool_category(),
            Some(PoolCategory::Geometry)
        );
        assert_eq!(ResourceKind::Shader.pool_category(), None);
        assert_eq!(ResourceKind::SwapChain.pool_category(), None);
    }
}
