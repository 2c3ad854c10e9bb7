//! Shader descriptors.

use std::collections::HashMap;

/// Descriptor for creating a pixel shader from compiled bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderDescriptor {
    /// Debug label for the shader.
    pub label: Option<String>,
    /// Compiled shader bytecode.
    pub bytecode: Vec<u8>,
    /// Constant name to register index.
    pub registers: HashMap<String, u32>,
    /// Highest texture coordinate set the shader reads.
    pub max_tex_coord_index: u32,
    /// Shader reads the pixel coordinate input.
    pub uses_pixcoord: bool,
    /// Shader reads per-vertex color.
    pub uses_vertex_color: bool,
}

impl ShaderDescriptor {
    /// Create a shader descriptor from bytecode.
    pub fn new(bytecode: impl Into<Vec<u8>>) -> Self {
        Self {
            bytecode: bytecode.into(),
            ..Default::default()
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Map a named constant to a register.
    pub fn with_register(mut self, name: impl Into<String>, register: u32) -> Self {
        self.registers.insert(name.into(), register);
        self
    }

    /// Set the highest texture coordinate index.
    pub fn with_max_tex_coord_index(mut self, index: u32) -> Self {
        self.max_tex_coord_index = index;
        self
    }
}
