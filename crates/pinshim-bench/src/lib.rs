//! Benchmark profiles and utilities for the pinshim critical pin shim.
//!
//! - [`hyperalloc_profile`]: one 1 MB array, the size the allocation
//!   stress harness pins
//! - [`pattern_profile`]: one 16-byte array
//! - [`populated_heap`]: a heap holding many live arrays, for collection cost
//! - [`critical_window`]: allocate under a held pin until the collector is
//!   blocked, then release

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use pinshim_core::{ArrayId, PinError};
use pinshim_critical::CriticalPin;
use pinshim_heap::{HeapConfig, HeapError, ManagedHeap, PinStrategy};

/// Length of the array pinned by the allocation stress harness.
pub const HYPERALLOC_ARRAY_LEN: usize = 1_000_000;

/// A shim over a fresh heap holding one zeroed array of `len` bytes.
///
/// The heap has room for the array plus `headroom` bytes.
pub fn shim_with_array(
    len: usize,
    headroom: usize,
    strategy: PinStrategy,
) -> (CriticalPin<ManagedHeap>, ArrayId) {
    let mut config = HeapConfig::with_capacity(len + headroom);
    config.pin_strategy = strategy;
    let mut heap = ManagedHeap::new(config).unwrap();
    let array = heap.allocate(len).unwrap();
    (CriticalPin::new(heap), array)
}

/// One [`HYPERALLOC_ARRAY_LEN`]-byte array with 4 MiB of headroom.
pub fn hyperalloc_profile(strategy: PinStrategy) -> (CriticalPin<ManagedHeap>, ArrayId) {
    shim_with_array(HYPERALLOC_ARRAY_LEN, 4 * 1024 * 1024, strategy)
}

/// One 16-byte array.
pub fn pattern_profile(strategy: PinStrategy) -> (CriticalPin<ManagedHeap>, ArrayId) {
    shim_with_array(16, 0, strategy)
}

/// A heap with `count` live arrays of `len` bytes each.
pub fn populated_heap(count: usize, len: usize) -> ManagedHeap {
    let mut heap = ManagedHeap::new(HeapConfig::with_capacity(count * len)).unwrap();
    for _ in 0..count {
        heap.allocate(len).unwrap();
    }
    heap
}

/// Outcome of one [`critical_window`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowReport {
    /// Allocations that succeeded while pinned.
    pub allocated: usize,
    /// Allocations refused because the collector was locked out.
    pub blocked: usize,
    /// Collections completed by the end of the window, including the one
    /// deferred until release.
    pub collections: u64,
}

/// Pin `array`, attempt `attempts` short-lived allocations of
/// `object_len` bytes, then release.
///
/// Every allocation is freed immediately, so garbage builds up until the
/// heap needs a collection it cannot run while pinned.
pub fn critical_window(
    shim: &mut CriticalPin<ManagedHeap>,
    array: ArrayId,
    attempts: usize,
    object_len: usize,
) -> Result<WindowReport, PinError> {
    let token = shim.acquire(array)?;
    let mut report = WindowReport::default();
    for _ in 0..attempts {
        match shim.runtime_mut().allocate(object_len) {
            Ok(object) => {
                report.allocated += 1;
                let freed = shim.runtime_mut().free(object);
                debug_assert!(freed.is_ok(), "fresh object failed to free: {freed:?}");
            }
            Err(HeapError::CollectionBlocked { .. }) => report.blocked += 1,
            Err(_) => break,
        }
    }
    shim.release(array, token)?;
    report.collections = shim.runtime().stats().collections;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_blocks_then_collects_on_release() {
        let (mut shim, array) = shim_with_array(64, 256, PinStrategy::InPlace);
        let report = critical_window(&mut shim, array, 100, 32).unwrap();
        assert_eq!(report.allocated, 8);
        assert_eq!(report.blocked, 92);
        assert_eq!(report.collections, 1);
        let stats = shim.runtime().stats();
        assert_eq!(stats.dead_bytes, 0);
        assert!(!stats.collection_pending);
    }

    #[test]
    fn profiles_build() {
        let (shim, array) = hyperalloc_profile(PinStrategy::Copy);
        assert_eq!(shim.runtime().len(array).unwrap(), HYPERALLOC_ARRAY_LEN);
        let heap = populated_heap(10, 8);
        assert_eq!(heap.stats().live_arrays, 10);
        assert_eq!(heap.stats().available_bytes(), 0);
    }
}
