//! Common utilities for resource integration tests.
//!
//! Every test runs against the in-process [`DummyBackend`], which counts
//! native creations and releases so tests can check that each native
//! resource is freed exactly once.

use std::sync::Arc;

use redlilium_gpu_resources::{
    ContextRegistry, DummyBackend, PoolCategory, RenderTarget, ResourceFactory, ResourceSettings,
    WrapMode,
};

/// Install the test logger once per process.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A registry on a dummy backend with the factory of adapter 0.
pub struct Harness {
    pub backend: Arc<DummyBackend>,
    pub registry: ContextRegistry,
    pub factory: Arc<ResourceFactory>,
}

impl Harness {
    /// Create a harness with the given settings.
    pub fn new(settings: ResourceSettings) -> Self {
        init_logging();
        let backend = Arc::new(DummyBackend::new());
        let registry = ContextRegistry::new(backend.clone(), settings).unwrap();
        let factory = registry.factory(0).unwrap();
        Self {
            backend,
            registry,
            factory,
        }
    }

    /// Create a harness with one category budget overridden.
    pub fn with_budget(category: PoolCategory, bytes: u64) -> Self {
        Self::new(ResourceSettings::default().with_budget(category, bytes))
    }

    /// Current usage of a pool.
    pub fn usage(&self, category: PoolCategory) -> u64 {
        self.factory.context().pool(category).usage()
    }

    /// Block until the disposer has drained everything dropped so far.
    pub fn flush(&self) {
        self.registry.disposer().flush();
    }
}

/// Create a render target charged exactly `bytes` (must be a multiple of 1000).
pub fn render_target_of(factory: &ResourceFactory, bytes: u64) -> RenderTarget {
    assert_eq!(bytes % 1000, 0, "helper needs a multiple of 1000 bytes");
    // 250 px wide at 4 bytes per pixel is 1000 bytes per row.
    let height = (bytes / 1000) as u32;
    factory
        .create_render_target(250, height, WrapMode::ClampNotNeeded, false)
        .unwrap()
}
