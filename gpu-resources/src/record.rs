//! The unit of native release.

use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::context::ContextShared;
use crate::handle::{Handle, RecordId, ResourceKind};

/// Binds one native [`Handle`] to the [`Context`](crate::Context) that issued it.
///
/// A record is shared between the application-side owner of a resource and
/// the context registry. Disposal is a single atomic swap of the handle to
/// null, so no matter how many threads call [`dispose`](Self::dispose), the
/// native release happens exactly once and every later call is a no-op.
///
/// The record holds only a weak reference to its context; it never keeps a
/// device alive.
pub struct DisposableRecord {
    id: RecordId,
    kind: ResourceKind,
    size: u64,
    handle: AtomicU64,
    context: Weak<ContextShared>,
    orphaned: AtomicBool,
    discardable: AtomicBool,
    pins: AtomicUsize,
    last_used: AtomicU64,
}

impl DisposableRecord {
    pub(crate) fn new(
        id: RecordId,
        kind: ResourceKind,
        handle: Handle,
        size: u64,
        context: Weak<ContextShared>,
        tick: u64,
    ) -> Self {
        Self {
            id,
            kind,
            size,
            handle: AtomicU64::new(handle.raw()),
            context,
            orphaned: AtomicBool::new(false),
            discardable: AtomicBool::new(false),
            pins: AtomicUsize::new(0),
            last_used: AtomicU64::new(tick),
        }
    }

    /// Identifier within the owning context.
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Kind of native resource.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Bytes charged to the pool for this resource.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The native handle, or [`Handle::NULL`] once disposed.
    pub fn handle(&self) -> Handle {
        Handle(self.handle.load(Ordering::Acquire))
    }

    /// Returns true once the native resource has been released.
    pub fn is_disposed(&self) -> bool {
        self.handle().is_null()
    }

    /// Returns true if the application owner has been dropped.
    pub fn is_orphaned(&self) -> bool {
        self.orphaned.load(Ordering::Acquire)
    }

    /// Returns true if the owner allowed the contents to be discarded.
    pub fn is_discardable(&self) -> bool {
        self.discardable.load(Ordering::Acquire)
    }

    /// Returns true while at least one pin is held.
    pub fn is_pinned(&self) -> bool {
        self.pins.load(Ordering::Acquire) > 0
    }

    /// Context clock value of the last use.
    pub fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }

    /// Shared state of the owning context, if it is still alive.
    pub(crate) fn context(&self) -> Option<Arc<ContextShared>> {
        self.context.upgrade()
    }

    /// Release the native resource.
    ///
    /// Clears the handle, removes the record from its context, returns the
    /// reserved bytes to the pool and finally releases the native handle.
    /// Returns `true` only for the call that performed the release.
    pub fn dispose(&self) -> bool {
        let Some(handle) = self.take_handle() else {
            return false;
        };
        match self.context.upgrade() {
            Some(context) => context.release_record(self, handle),
            None => log::warn!(
                "{} {handle} outlived its context, native release skipped",
                self.kind
            ),
        }
        true
    }

    /// Clear the handle, returning it to the single caller that observed it live.
    pub(crate) fn take_handle(&self) -> Option<Handle> {
        match self.handle.swap(0, Ordering::AcqRel) {
            0 => None,
            raw => Some(Handle(raw)),
        }
    }

    pub(crate) fn is_evictable(&self) -> bool {
        !self.is_disposed()
            && (self.is_orphaned() || (self.is_discardable() && !self.is_pinned()))
    }

    pub(crate) fn mark_orphaned(&self) {
        self.orphaned.store(true, Ordering::Release);
    }

    pub(crate) fn set_discardable(&self, discardable: bool) {
        self.discardable.store(discardable, Ordering::Release);
    }

    pub(crate) fn pin(&self) {
        self.pins.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn unpin(&self) {
        let previous = self.pins.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "unbalanced unpin");
    }

    pub(crate) fn set_last_used(&self, tick: u64) {
        self.last_used.fetch_max(tick, Ordering::Relaxed);
    }
}

impl fmt::Debug for DisposableRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableRecord")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("handle", &self.handle())
            .field("size", &self.size)
            .field("orphaned", &self.is_orphaned())
            .finish()
    }
}

static_assertions::assert_impl_all!(DisposableRecord: Send, Sync);
