//! Swap chain descriptors.

/// Descriptor for creating a swap chain for a native window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapChainDescriptor {
    /// Native window/view handle supplied by the windowing layer.
    pub window: u64,
    /// Back buffer width in physical pixels.
    pub width: u32,
    /// Back buffer height in physical pixels.
    pub height: u32,
    /// Horizontal render scale.
    pub scale_x: f32,
    /// Vertical render scale.
    pub scale_y: f32,
    /// Request a multisampled back buffer.
    pub msaa: bool,
}

impl SwapChainDescriptor {
    /// Create a swap chain descriptor with unit scale and no multisampling.
    pub fn new(window: u64, width: u32, height: u32) -> Self {
        Self {
            window,
            width,
            height,
            scale_x: 1.0,
            scale_y: 1.0,
            msaa: false,
        }
    }

    /// Set the render scale.
    pub fn with_scale(mut self, scale_x: f32, scale_y: f32) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// Request multisampling.
    pub fn with_msaa(mut self, msaa: bool) -> Self {
        self.msaa = msaa;
        self
    }
}
