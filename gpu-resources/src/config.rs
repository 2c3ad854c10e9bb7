//! Resource settings.
//!
//! Settings are supplied by the embedding application when the
//! [`ContextRegistry`](crate::ContextRegistry) is created, either built in code
//! or loaded from a TOML file:
//!
//! ```toml
//! texture_budget = 536870912
//! render_target_budget = 268435456
//! force_pow2 = false
//! max_texture_size = 4096
//! verbose = true
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{ResourceError, ResourceResult};
use crate::pool::PoolCategory;

const MIB: u64 = 1024 * 1024;

/// Numeric knobs consumed at context creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResourceSettings {
    /// Budget for sampled textures, in bytes.
    pub texture_budget: u64,
    /// Budget for render targets, in bytes.
    pub render_target_budget: u64,
    /// Budget for mesh geometry, in bytes.
    pub geometry_budget: u64,
    /// Round render target dimensions up to powers of two.
    pub force_pow2: bool,
    /// Upper bound for texture dimensions, applied on top of the device limit.
    pub max_texture_size: u32,
    /// Present swap chains with vertical sync.
    pub vsync: bool,
    /// Log adapter capabilities and clamping decisions.
    pub verbose: bool,
    /// Name of the background disposer thread.
    pub disposer_thread_name: String,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            texture_budget: 512 * MIB,
            render_target_budget: 256 * MIB,
            geometry_budget: 64 * MIB,
            force_pow2: false,
            max_texture_size: 4096,
            vsync: true,
            verbose: false,
            disposer_thread_name: "gpu-disposer".into(),
        }
    }
}

impl ResourceSettings {
    /// Budget configured for a pool category.
    pub fn budget(&self, category: PoolCategory) -> u64 {
        match category {
            PoolCategory::Textures => self.texture_budget,
            PoolCategory::RenderTargets => self.render_target_budget,
            PoolCategory::Geometry => self.geometry_budget,
        }
    }

    /// Set the budget for a pool category.
    pub fn with_budget(mut self, category: PoolCategory, bytes: u64) -> Self {
        match category {
            PoolCategory::Textures => self.texture_budget = bytes,
            PoolCategory::RenderTargets => self.render_target_budget = bytes,
            PoolCategory::Geometry => self.geometry_budget = bytes,
        }
        self
    }

    /// Enable or disable power-of-two rounding of render targets.
    pub fn with_force_pow2(mut self, force_pow2: bool) -> Self {
        self.force_pow2 = force_pow2;
        self
    }

    /// Set the texture size limit.
    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self
    }

    /// Enable or disable vsync for new swap chains.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable verbose logging.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Parse settings from TOML text. Missing keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Load settings from a TOML file.
pub fn load_settings(path: &Path) -> ResourceResult<ResourceSettings> {
    let content = std::fs::read_to_string(path).map_err(|source| ResourceError::SettingsRead {
        path: path.to_path_buf(),
        source,
    })?;
    ResourceSettings::from_toml(&content).map_err(|e| ResourceError::SettingsParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load settings, falling back to defaults if the file is missing or invalid.
pub fn load_or_default(path: &Path) -> ResourceSettings {
    match load_settings(path) {
        Ok(settings) => {
            log::info!("Loaded resource settings from {}", path.display());
            settings
        }
        Err(e) => {
            log::warn!("No resource settings ({e}), using defaults");
            ResourceSettings::default()
        }
    }
}
