//! Collection outcomes and heap counters.

/// Result of [`ManagedHeap::collect`](crate::ManagedHeap::collect).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectOutcome {
    /// The collection ran.
    Completed {
        /// Bytes of freed arrays returned to capacity.
        reclaimed_bytes: usize,
        /// Live arrays moved to fresh storage.
        relocated: usize,
    },
    /// A critical region is open; the collection will run when it closes.
    Deferred {
        /// Number of open critical regions.
        active_critical: u32,
    },
}

/// Point-in-time heap counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Live arrays.
    pub live_arrays: usize,
    /// Bytes held by live arrays.
    pub live_bytes: usize,
    /// Bytes held by freed arrays awaiting collection.
    pub dead_bytes: usize,
    /// Configured capacity.
    pub capacity_bytes: usize,
    /// Open critical regions.
    pub active_critical: u32,
    /// Whether a deferred collection is waiting for the regions to close.
    pub collection_pending: bool,
    /// Completed collections (including deferred ones that later ran).
    pub collections: u64,
    /// Collection requests that had to be deferred.
    pub deferred_collections: u64,
    /// Cumulative array relocations.
    pub relocations: u64,
}

impl HeapStats {
    /// Bytes that can still be allocated without a collection.
    pub fn available_bytes(&self) -> usize {
        self.capacity_bytes
            .saturating_sub(self.live_bytes + self.dead_bytes)
    }
}
