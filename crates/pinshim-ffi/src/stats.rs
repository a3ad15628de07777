//! C-compatible runtime statistics: shim counters plus heap counters.

use pinshim_critical::PinCounters;
use pinshim_heap::HeapStats;

use crate::runtime::lookup;
use crate::status::PinStatus;

/// Snapshot returned by `pinshim_stats_get`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PinshimStats {
    /// Pins established.
    pub acquires: u64,
    /// Pins ended.
    pub releases: u64,
    /// `Commit` releases that kept the pin.
    pub commits: u64,
    /// Acquires refused by the shim or the heap.
    pub rejected_acquires: u64,
    /// Releases that did not match the held pin.
    pub unbalanced_releases: u64,
    /// Live arrays.
    pub live_arrays: u64,
    /// Bytes held by live arrays.
    pub live_bytes: u64,
    /// Bytes of freed arrays awaiting collection.
    pub dead_bytes: u64,
    /// Configured heap capacity.
    pub capacity_bytes: u64,
    /// Completed collections.
    pub collections: u64,
    /// Collection requests deferred by an open critical region.
    pub deferred_collections: u64,
    /// Cumulative array relocations.
    pub relocations: u64,
    /// Open critical regions.
    pub active_critical: u32,
    /// 1 if a pin is held.
    pub pinned: u8,
    /// 1 if a deferred collection is waiting.
    pub collection_pending: u8,
}

// 12×u64 + u32 + 2×u8 + 2 bytes padding = 104 bytes, align 8.
const _: () = assert!(std::mem::size_of::<PinshimStats>() == 104);
const _: () = assert!(std::mem::align_of::<PinshimStats>() == 8);

impl PinshimStats {
    pub(crate) fn from_rust(counters: &PinCounters, heap: &HeapStats, pinned: bool) -> Self {
        Self {
            acquires: counters.acquires,
            releases: counters.releases,
            commits: counters.commits,
            rejected_acquires: counters.rejected_acquires,
            unbalanced_releases: counters.unbalanced_releases,
            live_arrays: heap.live_arrays as u64,
            live_bytes: heap.live_bytes as u64,
            dead_bytes: heap.dead_bytes as u64,
            capacity_bytes: heap.capacity_bytes as u64,
            collections: heap.collections,
            deferred_collections: heap.deferred_collections,
            relocations: heap.relocations,
            active_critical: heap.active_critical,
            pinned: u8::from(pinned),
            collection_pending: u8::from(heap.collection_pending),
        }
    }
}

/// Write a statistics snapshot for runtime `rt` to `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_stats_get(rt: u64, out: *mut PinshimStats) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return PinStatus::InvalidArgument as i32;
        }
        let arc = match lookup(rt) {
            Ok(a) => a,
            Err(s) => return s as i32,
        };
        let shim = ffi_lock!(arc);
        let stats = PinshimStats::from_rust(
            &shim.counters(),
            &shim.runtime().stats(),
            shim.is_pinned(),
        );
        // SAFETY: out is non-null and valid per caller contract.
        unsafe { *out = stats };
        PinStatus::Ok as i32
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::pinshim_array_alloc;
    use crate::config::{pinshim_config_create, pinshim_config_set_capacity};
    use crate::pin::{pinshim_acquire, pinshim_release};
    use crate::runtime::{pinshim_runtime_collect, pinshim_runtime_create, pinshim_runtime_destroy};
    use crate::types::PinshimCollectOutcome;

    #[test]
    fn from_rust_copies_every_counter() {
        let counters = PinCounters {
            acquires: 5,
            releases: 4,
            commits: 1,
            rejected_acquires: 2,
            unbalanced_releases: 3,
        };
        let heap = HeapStats {
            live_arrays: 2,
            live_bytes: 10,
            dead_bytes: 6,
            capacity_bytes: 64,
            active_critical: 1,
            collection_pending: true,
            collections: 7,
            deferred_collections: 8,
            relocations: 9,
        };
        let s = PinshimStats::from_rust(&counters, &heap, true);
        assert_eq!(s.acquires, 5);
        assert_eq!(s.unbalanced_releases, 3);
        assert_eq!(s.dead_bytes, 6);
        assert_eq!(s.relocations, 9);
        assert_eq!(s.pinned, 1);
        assert_eq!(s.collection_pending, 1);
    }

    #[test]
    fn deferred_collection_shows_in_stats() {
        let mut cfg = 0;
        pinshim_config_create(&mut cfg);
        pinshim_config_set_capacity(cfg, 256);
        let mut rt = 0;
        assert_eq!(pinshim_runtime_create(cfg, &mut rt), PinStatus::Ok as i32);
        let mut a = 0;
        pinshim_array_alloc(rt, 32, &mut a);

        let mut token = 0;
        let mut ptr = std::ptr::null_mut();
        assert_eq!(
            pinshim_acquire(rt, a, &mut token, &mut ptr, std::ptr::null_mut()),
            PinStatus::Ok as i32
        );
        let mut outcome = PinshimCollectOutcome::default();
        assert_eq!(pinshim_runtime_collect(rt, &mut outcome), PinStatus::Ok as i32);
        assert_eq!(outcome.deferred, 1);
        assert_eq!(outcome.active_critical, 1);

        let mut stats = PinshimStats::default();
        assert_eq!(pinshim_stats_get(rt, &mut stats), PinStatus::Ok as i32);
        assert_eq!(stats.pinned, 1);
        assert_eq!(stats.collection_pending, 1);
        assert_eq!(stats.deferred_collections, 1);
        assert_eq!(stats.collections, 0);

        assert_eq!(pinshim_release(rt, a, token, 0), PinStatus::Ok as i32);
        assert_eq!(pinshim_stats_get(rt, &mut stats), PinStatus::Ok as i32);
        assert_eq!(stats.pinned, 0);
        assert_eq!(stats.collection_pending, 0);
        assert_eq!(stats.collections, 1);
        assert_eq!(stats.relocations, 1);
        assert_eq!(stats.acquires, stats.releases);
        pinshim_runtime_destroy(rt);
    }

    #[test]
    fn null_out_is_invalid_argument() {
        assert_eq!(
            pinshim_stats_get(0, std::ptr::null_mut()),
            PinStatus::InvalidArgument as i32
        );
    }
}
