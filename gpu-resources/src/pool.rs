//! Budgeted resource pools.
//!
//! Every [`Context`](crate::Context) owns one [`ResourcePool`] per
//! [`PoolCategory`]. A pool tracks the estimated native memory held by the
//! live resources of its category and gates new allocations against a fixed
//! maximum:
//!
//! 1. If the request fits, it is committed immediately.
//! 2. Otherwise evictable resources are disposed, one at a time, until the
//!    request fits or no candidate is left.
//! 3. If it still does not fit, the request is rejected and usage is left as
//!    the evictions made it.
//!
//! A resource is evictable when its owner has been dropped but the disposer
//! has not drained it yet, or when its owner is alive but has marked the
//! contents as not useful and holds no pin. Orphans go first, then the least
//! recently used, then the oldest record.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ResourceError, ResourceResult};
use crate::handle::RecordId;
use crate::record::DisposableRecord;
use crate::types::{Indices, TextureFormat};

/// Budget category of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolCategory {
    /// Sampled textures created from images or descriptors.
    Textures,
    /// Render targets, including swap chain back buffers.
    RenderTargets,
    /// Mesh vertex and index data.
    Geometry,
}

impl PoolCategory {
    /// All categories, in pool order.
    pub const ALL: [PoolCategory; 3] = [Self::Textures, Self::RenderTargets, Self::Geometry];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Human readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Textures => "texture",
            Self::RenderTargets => "render target",
            Self::Geometry => "geometry",
        }
    }
}

impl fmt::Display for PoolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of pool accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Bytes currently reserved.
    pub usage: u64,
    /// Configured budget.
    pub maximum: u64,
    /// Highest usage seen.
    pub peak: u64,
    /// Live records charged to this pool.
    pub tracked: usize,
    /// Resources disposed to make room.
    pub evictions: u64,
    /// Reservations that could not be satisfied.
    pub rejections: u64,
}

#[derive(Debug, Default)]
struct PoolState {
    usage: u64,
    peak: u64,
    tracked: HashMap<RecordId, Arc<DisposableRecord>>,
    evictions: u64,
    rejections: u64,
}

impl PoolState {
    fn select_victim(&self) -> Option<Arc<DisposableRecord>> {
        self.tracked
            .values()
            .filter(|record| record.is_evictable())
            .min_by_key(|record| (!record.is_orphaned(), record.last_used(), record.id()))
            .cloned()
    }
}

/// Memory budget for one resource category of one context.
pub struct ResourcePool {
    category: PoolCategory,
    maximum: u64,
    state: Mutex<PoolState>,
}

impl ResourcePool {
    /// Create an empty pool with a fixed budget.
    pub fn new(category: PoolCategory, maximum: u64) -> Self {
        Self {
            category,
            maximum,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// The category this pool budgets.
    pub fn category(&self) -> PoolCategory {
        self.category
    }

    /// Bytes currently reserved.
    pub fn usage(&self) -> u64 {
        self.state.lock().usage
    }

    /// Configured budget in bytes.
    pub fn maximum(&self) -> u64 {
        self.maximum
    }

    /// Bytes that can be reserved without evicting anything.
    pub fn available(&self) -> u64 {
        self.maximum.saturating_sub(self.usage())
    }

    /// Snapshot of the pool accounting.
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            usage: state.usage,
            maximum: self.maximum,
            peak: state.peak,
            tracked: state.tracked.len(),
            evictions: state.evictions,
            rejections: state.rejections,
        }
    }

    /// Reserve `bytes`, evicting reclaimable resources if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::AllocationRejected`] if the request cannot fit
    /// even after every evictable resource has been disposed. The rejected
    /// request itself is not charged.
    pub fn reserve(&self, bytes: u64) -> ResourceResult<()> {
        if bytes > self.maximum {
            let mut state = self.state.lock();
            state.rejections += 1;
            return Err(self.rejection(bytes, state.usage));
        }

        loop {
            let victim = {
                let mut state = self.state.lock();
                // Usage never exceeds the maximum, so the headroom cannot underflow.
                if bytes <= self.maximum.saturating_sub(state.usage) {
                    state.usage += bytes;
                    state.peak = state.peak.max(state.usage);
                    return Ok(());
                }
                match state.select_victim() {
                    Some(victim) => victim,
                    None => {
                        state.rejections += 1;
                        log::debug!(
                            "ResourcePool({}): rejecting {bytes} bytes, {} of {} in use",
                            self.category,
                            state.usage,
                            self.maximum
                        );
                        return Err(self.rejection(bytes, state.usage));
                    }
                }
            };

            // Disposal re-enters the pool to release its bytes, so the lock
            // must not be held here.
            log::debug!(
                "ResourcePool({}): evicting {} {:?} ({} bytes)",
                self.category,
                victim.kind(),
                victim.id(),
                victim.size()
            );
            if victim.dispose() {
                self.state.lock().evictions += 1;
            }
        }
    }

    /// Return `bytes` to the budget.
    ///
    /// Releasing more than is reserved is an accounting bug; usage is
    /// floored at zero.
    pub fn release(&self, bytes: u64) {
        let underflow = {
            let mut state = self.state.lock();
            let underflow = bytes > state.usage;
            state.usage = state.usage.saturating_sub(bytes);
            underflow
        };
        if underflow {
            log::error!(
                "ResourcePool({}): released {bytes} bytes, more than the reserved usage",
                self.category
            );
            debug_assert!(!underflow, "pool usage underflow");
        }
    }

    /// Start tracking a live record for eviction.
    pub(crate) fn track(&self, record: &Arc<DisposableRecord>) {
        let mut state = self.state.lock();
        // A record disposed before it was tracked has already released its bytes.
        if !record.is_disposed() {
            state.tracked.insert(record.id(), Arc::clone(record));
        }
    }

    /// Stop tracking a record and return its bytes.
    pub(crate) fn untrack(&self, record: &DisposableRecord) {
        self.state.lock().tracked.remove(&record.id());
        self.release(record.size());
    }

    fn rejection(&self, requested: u64, usage: u64) -> ResourceError {
        ResourceError::AllocationRejected {
            category: self.category,
            requested,
            usage,
            maximum: self.maximum,
        }
    }
}

impl fmt::Debug for ResourcePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("ResourcePool")
            .field("category", &self.category)
            .field("usage", &stats.usage)
            .field("maximum", &stats.maximum)
            .field("tracked", &stats.tracked)
            .finish()
    }
}

static_assertions::assert_impl_all!(ResourcePool: Send, Sync);

/// Estimated size of a sampled texture.
pub fn estimate_texture_size(width: u32, height: u32, format: TextureFormat) -> u64 {
    width as u64 * height as u64 * format.bytes_per_pixel() as u64
}

/// Estimated size of a render target.
///
/// Render targets are always 32 bits per pixel; every sample and the
/// optional depth buffer count as another full plane.
pub fn estimate_render_target_size(width: u32, height: u32, samples: u32, has_depth: bool) -> u64 {
    let plane = width as u64 * height as u64 * 4 * samples.max(1) as u64;
    if has_depth { plane * 2 } else { plane }
}

/// Estimated size of mesh geometry.
pub fn estimate_mesh_size(vertex_floats: usize, indices: &Indices) -> u64 {
    vertex_floats as u64 * 4 + indices.byte_size()
}
