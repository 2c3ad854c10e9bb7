//! Process-wide registry of contexts, one per adapter.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::affinity::ThreadAffinity;
use crate::backend::NativeBackend;
use crate::config::ResourceSettings;
use crate::context::Context;
use crate::disposer::{Disposer, DisposerStats};
use crate::error::{ResourceError, ResourceResult};
use crate::factory::ResourceFactory;

#[derive(Default)]
struct Slots {
    factories: Vec<Option<Arc<ResourceFactory>>>,
    disposed: bool,
}

/// Entry point of the resource layer.
///
/// The registry owns the backend, the settings and the [`Disposer`], and
/// lazily creates one [`Context`] (with its [`ResourceFactory`]) per adapter
/// ordinal. Repeat lookups return the same instance. It is created once at
/// startup and torn down explicitly with [`dispose`](Self::dispose) on the
/// thread that created it.
///
/// # Example
///
/// ```ignore
/// let registry = ContextRegistry::new(backend, ResourceSettings::default())?;
/// let factory = registry.find_default()?;
/// let target = factory.create_render_target(1920, 1080, WrapMode::ClampNotNeeded, false)?;
/// // ...
/// registry.dispose()?;
/// ```
pub struct ContextRegistry {
    backend: Arc<dyn NativeBackend>,
    settings: Arc<ResourceSettings>,
    disposer: Disposer,
    affinity: ThreadAffinity,
    slots: Mutex<Slots>,
}

impl ContextRegistry {
    /// Create a registry and start the disposer thread.
    pub fn new(
        backend: Arc<dyn NativeBackend>,
        settings: ResourceSettings,
    ) -> ResourceResult<Self> {
        let disposer = Disposer::start(&settings.disposer_thread_name)?;
        let adapters = backend.adapter_count();
        log::info!(
            "ContextRegistry: {} backend with {adapters} adapter(s)",
            backend.name()
        );

        Ok(Self {
            backend,
            settings: Arc::new(settings),
            disposer,
            affinity: ThreadAffinity::current(),
            slots: Mutex::new(Slots {
                factories: vec![None; adapters],
                disposed: false,
            }),
        })
    }

    /// The native backend.
    pub fn backend(&self) -> &Arc<dyn NativeBackend> {
        &self.backend
    }

    /// The settings every context is created with.
    pub fn settings(&self) -> &ResourceSettings {
        &self.settings
    }

    /// The disposer shared by every context.
    pub fn disposer(&self) -> &Disposer {
        &self.disposer
    }

    /// Snapshot of the disposer counters.
    pub fn disposer_stats(&self) -> DisposerStats {
        self.disposer.stats()
    }

    /// Number of adapter slots.
    pub fn adapter_count(&self) -> usize {
        self.slots.lock().factories.len()
    }

    /// Returns true once [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.slots.lock().disposed
    }

    /// Get the factory for an adapter, creating its context on first use.
    ///
    /// The context is bound to the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::AdapterUnavailable`] for an out-of-range
    /// ordinal and [`ResourceError::NativeCreationFailed`] if the device cannot
    /// be created; the slot stays empty so a later call can retry.
    pub fn factory(&self, adapter: usize) -> ResourceResult<Arc<ResourceFactory>> {
        let mut slots = self.slots.lock();
        if slots.disposed {
            return Err(ResourceError::ContextDisposed);
        }
        let slot = slots
            .factories
            .get_mut(adapter)
            .ok_or(ResourceError::AdapterUnavailable(adapter))?;
        if let Some(factory) = slot.as_ref() {
            return Ok(Arc::clone(factory));
        }

        let context = Context::new(
            adapter,
            Arc::clone(&self.backend),
            Arc::clone(&self.settings),
            self.disposer.handle(),
        )?;
        let factory = Arc::new(ResourceFactory::new(context));
        *slot = Some(Arc::clone(&factory));
        Ok(factory)
    }

    /// Get the context for an adapter, creating it on first use.
    pub fn context(&self, adapter: usize) -> ResourceResult<Arc<Context>> {
        self.factory(adapter).map(|factory| Arc::clone(factory.context()))
    }

    /// Factory of the first adapter whose device can be created.
    pub fn find_default(&self) -> ResourceResult<Arc<ResourceFactory>> {
        let mut last_error = ResourceError::AdapterUnavailable(0);
        for adapter in 0..self.adapter_count() {
            match self.factory(adapter) {
                Ok(factory) => return Ok(factory),
                Err(e) => {
                    log::warn!("ContextRegistry: adapter {adapter} unusable: {e}");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// Tear down every context and stop the disposer.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::CrossThreadTeardown`] if called from a thread
    /// other than the creator; nothing is torn down in that case. If a context
    /// was created on another thread its teardown fails the same way; the
    /// remaining contexts are still disposed and the first error is returned.
    pub fn dispose(&self) -> ResourceResult<()> {
        self.affinity.ensure_current("ContextRegistry::dispose")?;

        let factories: Vec<_> = {
            let mut slots = self.slots.lock();
            if slots.disposed {
                return Ok(());
            }
            slots.disposed = true;
            slots.factories.iter_mut().filter_map(Option::take).collect()
        };

        let mut result = Ok(());
        for factory in &factories {
            factory.clear_caches();
            if let Err(e) = factory.context().dispose() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        drop(factories);

        self.disposer.shutdown();
        log::info!("ContextRegistry: disposed");
        result
    }
}

impl Drop for ContextRegistry {
    fn drop(&mut self) {
        if self.slots.get_mut().disposed {
            return;
        }
        if let Err(e) = self.dispose() {
            log::error!("ContextRegistry dropped without teardown: {e}");
        }
    }
}

impl fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("backend", &self.backend.name())
            .field("adapters", &self.adapter_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

static_assertions::assert_impl_all!(ContextRegistry: Send, Sync);

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::backend::DummyBackend;

    fn create_test_registry(backend: &Arc<DummyBackend>) -> ContextRegistry {
        ContextRegistry::new(backend.clone(), ResourceSettings::default()).unwrap()
    }

    #[test]
    fn test_factory_is_cached() {
        let backend = Arc::new(DummyBackend::new().with_adapter_count(2));
        let registry = create_test_registry(&backend);

        let a = registry.factory(1).unwrap();
        let b = registry.factory(1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(a.context(), &registry.context(1).unwrap()));
        assert_eq!(backend.device_count(), 1);
    }

    #[test]
    fn test_out_of_range_adapter() {
        let backend = Arc::new(DummyBackend::new());
        let registry = create_test_registry(&backend);
        assert!(matches!(
            registry.factory(5),
            Err(ResourceError::AdapterUnavailable(5))
        ));
    }

    #[test]
    fn test_failed_device_leaves_slot_empty() {
        let backend = Arc::new(DummyBackend::new());
        backend.fail_next(crate::backend::DummyFailure::Device, 1);
        let registry = create_test_registry(&backend);

        assert!(registry.factory(0).is_err());
        assert!(registry.factory(0).is_ok());
    }

    #[test]
    fn test_find_default_skips_broken_adapters() {
        let backend = Arc::new(DummyBackend::new().with_adapter_count(3));
        backend.fail_adapter(0);
        let registry = create_test_registry(&backend);

        let factory = registry.find_default().unwrap();
        assert_eq!(factory.context().adapter(), 1);
    }

    #[test]
    fn test_find_default_without_adapters() {
        let backend = Arc::new(DummyBackend::new().with_adapter_count(0));
        let registry = create_test_registry(&backend);
        assert!(matches!(
            registry.find_default(),
            Err(ResourceError::AdapterUnavailable(0))
        ));
    }

    #[test]
    fn test_dispose_tears_down_everything() {
        let backend = Arc::new(DummyBackend::new().with_adapter_count(2));
        let registry = create_test_registry(&backend);
        let context = registry.context(0).unwrap();
        registry.context(1).unwrap();

        registry.dispose().unwrap();
        assert!(context.is_disposed());
        assert_eq!(backend.destroyed_device_count(), 2);
        assert!(!registry.disposer().is_running());
        assert!(matches!(
            registry.factory(0),
            Err(ResourceError::ContextDisposed)
        ));
    }

    #[test]
    fn test_dispose_from_other_thread_fails() {
        let backend = Arc::new(DummyBackend::new());
        let registry = Arc::new(create_test_registry(&backend));
        registry.context(0).unwrap();

        let remote = Arc::clone(&registry);
        let result = thread::spawn(move || remote.dispose()).join().unwrap();
        assert!(matches!(
            result,
            Err(ResourceError::CrossThreadTeardown { .. })
        ));
        assert!(!registry.is_disposed());
        assert_eq!(backend.destroyed_device_count(), 0);

        registry.dispose().unwrap();
        assert_eq!(backend.destroyed_device_count(), 1);
    }
}
