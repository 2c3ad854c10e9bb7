//! Per-device resource registry.
//!
//! A context is split in two. [`Context`] is the owner-side handle: it is
//! bound to the creating thread and tears the device down when dropped
//! there. [`ContextShared`] holds the device, the record registry and the
//! pools; records and in-flight releases only ever hold this half, so a
//! release running on the disposer thread can never end up dropping the
//! owner-side handle.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::affinity::ThreadAffinity;
use crate::backend::{BackendCapabilities, NativeBackend};
use crate::config::ResourceSettings;
use crate::disposer::DisposerHandle;
use crate::error::{ResourceError, ResourceResult};
use crate::handle::{Handle, RecordId, ResourceKind};
use crate::pool::{PoolCategory, ResourcePool};
use crate::record::DisposableRecord;

#[derive(Debug, Default)]
struct Registry {
    records: HashMap<RecordId, Arc<DisposableRecord>>,
    disposed: bool,
}

/// State of a context reachable from its records.
///
/// Dropping it never tears anything down.
pub(crate) struct ContextShared {
    adapter: usize,
    backend: Arc<dyn NativeBackend>,
    // Null once the device has been destroyed.
    device: RwLock<Handle>,
    capabilities: BackendCapabilities,
    max_texture_size: u32,
    settings: Arc<ResourceSettings>,
    disposer: DisposerHandle,
    registry: Mutex<Registry>,
    pools: [ResourcePool; 3],
    next_record: AtomicU64,
    clock: AtomicU64,
}

impl ContextShared {
    pub(crate) fn backend(&self) -> &Arc<dyn NativeBackend> {
        &self.backend
    }

    pub(crate) fn device(&self) -> Handle {
        *self.device.read()
    }

    fn pool(&self, category: PoolCategory) -> &ResourcePool {
        &self.pools[category.index()]
    }

    fn is_disposed(&self) -> bool {
        self.registry.lock().disposed
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn touch(&self, record: &DisposableRecord) {
        record.set_last_used(self.tick());
    }

    fn track(
        self: &Arc<Self>,
        kind: ResourceKind,
        handle: Handle,
        size: u64,
    ) -> ResourceResult<Arc<DisposableRecord>> {
        let id = RecordId(self.next_record.fetch_add(1, Ordering::Relaxed));
        let record = Arc::new(DisposableRecord::new(
            id,
            kind,
            handle,
            size,
            Arc::downgrade(self),
            self.tick(),
        ));

        let registered = {
            let mut registry = self.registry.lock();
            if !registry.disposed {
                registry.records.insert(id, Arc::clone(&record));
            }
            !registry.disposed
        };
        if !registered {
            log::warn!("Context({}): {kind} created after teardown", self.adapter);
            record.dispose();
            return Err(ResourceError::ContextDisposed);
        }

        if let Some(category) = kind.pool_category() {
            self.pool(category).track(&record);
        }
        log::trace!(
            "Context({}): created {kind} {handle} as {id:?}, size={size}",
            self.adapter
        );
        Ok(record)
    }

    /// Deregister, refund and release a record whose handle was just taken.
    pub(crate) fn release_record(&self, record: &DisposableRecord, handle: Handle) {
        self.registry.lock().records.remove(&record.id());
        if let Some(category) = record.kind().pool_category() {
            self.pool(category).untrack(record);
        }

        let device = self.device.read();
        if device.is_null() {
            log::warn!(
                "Context({}): {} {handle} released after device teardown",
                self.adapter,
                record.kind()
            );
            return;
        }
        log::trace!(
            "Context({}): releasing {} {handle}",
            self.adapter,
            record.kind()
        );
        self.backend.release(*device, handle);
    }

    fn teardown(&self) {
        let mut records: Vec<_> = {
            let mut registry = self.registry.lock();
            if registry.disposed {
                return;
            }
            registry.disposed = true;
            registry.records.drain().map(|(_, record)| record).collect()
        };
        records.sort_by_key(|record| record.id());

        let mut released = 0usize;
        for record in &records {
            if let Some(handle) = record.take_handle() {
                self.release_record(record, handle);
                released += 1;
            }
        }

        // Waits for releases still running on other threads.
        let mut device = self.device.write();
        self.backend.destroy_device(*device);
        *device = Handle::NULL;
        log::info!(
            "Context({}): disposed, released {released} resources",
            self.adapter
        );
    }
}

/// One native device and every resource allocated against it.
///
/// The context keeps a registry of live records so the whole device can be
/// torn down at once, and one [`ResourcePool`] per [`PoolCategory`]. It must
/// be torn down on the thread that created it, since that thread may still
/// be rendering with the device.
pub struct Context {
    shared: Arc<ContextShared>,
    affinity: ThreadAffinity,
}

impl Context {
    /// Create a context for an adapter, bound to the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::AdapterUnavailable`] if the ordinal is out of
    /// range and [`ResourceError::NativeCreationFailed`] if the native device
    /// cannot be created.
    pub fn new(
        adapter: usize,
        backend: Arc<dyn NativeBackend>,
        settings: Arc<ResourceSettings>,
        disposer: DisposerHandle,
    ) -> ResourceResult<Arc<Self>> {
        if adapter >= backend.adapter_count() {
            return Err(ResourceError::AdapterUnavailable(adapter));
        }

        let device = backend.create_device(adapter);
        if device.is_null() {
            log::warn!(
                "{}: failed to create device on adapter {adapter}",
                backend.name()
            );
            return Err(ResourceError::native(
                ResourceKind::Device,
                format!("{} returned no device for adapter {adapter}", backend.name()),
            ));
        }

        let capabilities = backend.capabilities(device);
        let max_texture_size = capabilities.max_texture_size.min(settings.max_texture_size);
        if settings.verbose {
            log::info!(
                "Context({adapter}): {} device {device}, {capabilities:?}",
                backend.name()
            );
            if max_texture_size < capabilities.max_texture_size {
                log::info!(
                    "Context({adapter}): max texture size clamped from {} to {max_texture_size}",
                    capabilities.max_texture_size
                );
            }
        }

        let pools = PoolCategory::ALL
            .map(|category| ResourcePool::new(category, settings.budget(category)));

        log::info!("Context({adapter}): created on {}", backend.name());

        let shared = Arc::new(ContextShared {
            adapter,
            backend,
            device: RwLock::new(device),
            capabilities,
            max_texture_size,
            settings,
            disposer,
            registry: Mutex::new(Registry::default()),
            pools,
            next_record: AtomicU64::new(1),
            clock: AtomicU64::new(0),
        });
        Ok(Arc::new(Self {
            shared,
            affinity: ThreadAffinity::current(),
        }))
    }

    /// Adapter ordinal.
    pub fn adapter(&self) -> usize {
        self.shared.adapter
    }

    /// Native device handle, or [`Handle::NULL`] after teardown.
    pub fn device(&self) -> Handle {
        self.shared.device()
    }

    /// The native backend.
    pub fn backend(&self) -> &Arc<dyn NativeBackend> {
        &self.shared.backend
    }

    /// Device capabilities, queried once at creation.
    pub fn capabilities(&self) -> &BackendCapabilities {
        &self.shared.capabilities
    }

    /// Effective texture size limit: the device limit clamped by settings.
    pub fn max_texture_size(&self) -> u32 {
        self.shared.max_texture_size
    }

    /// Settings the context was created with.
    pub fn settings(&self) -> &ResourceSettings {
        &self.shared.settings
    }

    /// Disposer that owners of this context's resources report to.
    pub fn disposer(&self) -> &DisposerHandle {
        &self.shared.disposer
    }

    /// Budget pool of a category.
    pub fn pool(&self, category: PoolCategory) -> &ResourcePool {
        self.shared.pool(category)
    }

    /// Returns true once [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    /// Returns true if called on the thread that created the context.
    pub fn is_owner_thread(&self) -> bool {
        self.affinity.is_current()
    }

    /// Number of live records.
    pub fn record_count(&self) -> usize {
        self.shared.registry.lock().records.len()
    }

    /// Returns true if the record is registered as live.
    pub fn contains(&self, id: RecordId) -> bool {
        self.shared.registry.lock().records.contains_key(&id)
    }

    /// Snapshot of the live records, ordered by id.
    pub fn live_records(&self) -> Vec<Arc<DisposableRecord>> {
        let mut records: Vec<_> = self
            .shared
            .registry
            .lock()
            .records
            .values()
            .cloned()
            .collect();
        records.sort_by_key(|record| record.id());
        records
    }

    /// Mark a record as used now, for least-recently-used eviction.
    pub fn touch(&self, record: &DisposableRecord) {
        self.shared.touch(record);
    }

    /// Wrap a freshly created native handle in a record and register it.
    ///
    /// The caller must already hold a pool reservation of `size` bytes for
    /// budgeted kinds; from here on the record owns that reservation.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::ContextDisposed`] if the context has been torn
    /// down. The handle is released and the reservation returned before the
    /// error is reported.
    pub(crate) fn track(
        &self,
        kind: ResourceKind,
        handle: Handle,
        size: u64,
    ) -> ResourceResult<Arc<DisposableRecord>> {
        self.shared.track(kind, handle, size)
    }

    /// Tear down every live resource and the native device.
    ///
    /// Idempotent on the owner thread. Releases already running on other
    /// threads finish before the device is destroyed.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::CrossThreadTeardown`] if called from any other
    /// thread. Nothing is released in that case.
    pub fn dispose(&self) -> ResourceResult<()> {
        self.affinity.ensure_current("Context::dispose")?;
        self.shared.teardown();
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.shared.is_disposed() {
            return;
        }
        if self.affinity.is_current() {
            self.shared.teardown();
        } else {
            log::error!(
                "Context({}) dropped on a foreign thread, owner is [{}]; leaking {} resources",
                self.shared.adapter,
                self.affinity.owner_name(),
                self.record_count()
            );
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("adapter", &self.adapter())
            .field("backend", &self.shared.backend.name())
            .field("device", &self.device())
            .field("records", &self.record_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(Context: Send, Sync);
static_assertions::assert_impl_all!(ContextShared: Send, Sync);
