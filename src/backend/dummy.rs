//! Dummy allocator for testing and development.
//!
//! This allocator doesn't touch a GPU but tracks every object it hands out,
//! so tests can observe allocation churn and simulate running out of memory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{BackendError, BackendResult};
use crate::resource::ResourceShape;

use super::{GpuHandle, ResourceAllocator};

/// Counters shared between a [`DummyAllocator`] and its observers.
#[derive(Debug, Default)]
pub struct AllocatorStats {
    created: AtomicU64,
    reallocated: AtomicU64,
    destroyed: AtomicU64,
    live_bytes: AtomicU64,
}

impl AllocatorStats {
    /// Number of objects created from scratch.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Number of in-place reallocations.
    pub fn reallocated(&self) -> u64 {
        self.reallocated.load(Ordering::Relaxed)
    }

    /// Number of destroyed objects.
    pub fn destroyed(&self) -> u64 {
        self.destroyed.load(Ordering::Relaxed)
    }

    /// Bytes currently held by live objects.
    pub fn live_bytes(&self) -> u64 {
        self.live_bytes.load(Ordering::Relaxed)
    }

    /// Number of live objects.
    pub fn live_objects(&self) -> u64 {
        self.created() - self.destroyed()
    }
}

/// Dummy resource allocator.
#[derive(Debug)]
pub struct DummyAllocator {
    next_handle: u64,
    budget: Option<u64>,
    live: HashMap<GpuHandle, u64>,
    stats: Arc<AllocatorStats>,
}

impl DummyAllocator {
    /// Create a new dummy allocator with unlimited memory.
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            budget: None,
            live: HashMap::new(),
            stats: Arc::new(AllocatorStats::default()),
        }
    }

    /// Limit the total bytes the allocator will hand out.
    ///
    /// Requests beyond the budget fail with [`BackendError::OutOfMemory`].
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.budget = Some(bytes);
        self
    }

    /// Shared statistics handle; stays valid after the allocator is moved
    /// into a map.
    pub fn stats(&self) -> Arc<AllocatorStats> {
        Arc::clone(&self.stats)
    }

    fn reserve_bytes(&self, requested: u64, freed: u64) -> BackendResult<()> {
        if let Some(budget) = self.budget {
            let in_use = self.stats.live_bytes().saturating_sub(freed);
            let available = budget.saturating_sub(in_use);
            if requested > available {
                return Err(BackendError::OutOfMemory {
                    requested,
                    available,
                });
            }
        }
        Ok(())
    }

    fn issue_handle(&mut self, bytes: u64) -> GpuHandle {
        let handle = GpuHandle::new(self.next_handle);
        self.next_handle += 1;
        self.live.insert(handle, bytes);
        self.stats.live_bytes.fetch_add(bytes, Ordering::Relaxed);
        handle
    }
}

impl Default for DummyAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceAllocator for DummyAllocator {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn create(&mut self, shape: &ResourceShape) -> BackendResult<GpuHandle> {
        let bytes = shape.estimated_size();
        self.reserve_bytes(bytes, 0)?;
        let handle = self.issue_handle(bytes);
        self.stats.created.fetch_add(1, Ordering::Relaxed);
        log::trace!("DummyAllocator: created {:?} ({})", handle, shape);
        Ok(handle)
    }

    fn reallocate(
        &mut self,
        handle: GpuHandle,
        from: &ResourceShape,
        to: &ResourceShape,
    ) -> BackendResult<GpuHandle> {
        let old_bytes = self.live.get(&handle).copied().unwrap_or(0);
        let new_bytes = to.estimated_size();
        self.reserve_bytes(new_bytes, old_bytes)?;

        self.live.insert(handle, new_bytes);
        self.stats.live_bytes.fetch_sub(old_bytes, Ordering::Relaxed);
        self.stats.live_bytes.fetch_add(new_bytes, Ordering::Relaxed);
        self.stats.reallocated.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "DummyAllocator: reallocated {:?} from {} to {}",
            handle,
            from,
            to
        );
        Ok(handle)
    }

    fn destroy(&mut self, handle: GpuHandle, shape: &ResourceShape) {
        match self.live.remove(&handle) {
            Some(bytes) => {
                self.stats.live_bytes.fetch_sub(bytes, Ordering::Relaxed);
                self.stats.destroyed.fetch_add(1, Ordering::Relaxed);
                log::trace!("DummyAllocator: destroyed {:?} ({})", handle, shape);
            }
            None => log::error!("DummyAllocator: double destroy of {:?}", handle),
        }
    }
}
