//! Descriptors and formats for GPU resources.
//!
//! This module contains format enums, usage flags, descriptor structs and the
//! decoded [`Image`] source asset used throughout the crate.

mod image;
mod mesh;
mod shader;
mod swap_chain;
mod texture;

pub use image::Image;
pub use mesh::{Indices, MeshDescriptor};
pub use shader::ShaderDescriptor;
pub use swap_chain::SwapChainDescriptor;
pub use texture::{TextureDescriptor, TextureFormat, TextureUsage, WrapMode};
