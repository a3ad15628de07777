//! Scoped pins.
//!
//! [`PinGuard`] holds the shim's only pin and a mutable borrow of the
//! shim, so nothing can reach the runtime while the pinned bytes are
//! visible. Dropping the guard releases with [`ReleaseMode::CopyBack`];
//! in debug builds a release forced by unwinding is reported on stderr.

use pinshim_core::{ArrayId, PinError, PinRuntime, ReleaseMode};

use crate::shim::CriticalPin;
use crate::state::PinToken;

/// A critical pin that ends when the guard goes out of scope.
#[must_use = "dropping the guard releases the pin immediately"]
pub struct PinGuard<'a, R: PinRuntime> {
    shim: &'a mut CriticalPin<R>,
    token: Option<PinToken>,
}

impl<'a, R: PinRuntime> PinGuard<'a, R> {
    pub(crate) fn new(shim: &'a mut CriticalPin<R>, token: PinToken) -> Self {
        Self {
            shim,
            token: Some(token),
        }
    }

    fn token(&self) -> &PinToken {
        // The token is only taken by `release`, which consumes the guard.
        match &self.token {
            Some(t) => t,
            None => unreachable!("pin guard used after release"),
        }
    }

    /// The pinned array.
    pub fn array(&self) -> ArrayId {
        self.token().array()
    }

    /// Length of the pinned bytes.
    pub fn len(&self) -> usize {
        self.token().len()
    }

    /// Returns `true` if the pinned array is empty.
    pub fn is_empty(&self) -> bool {
        self.token().is_empty()
    }

    /// Whether the runtime exposed a copy instead of the storage itself.
    pub fn is_copy(&self) -> bool {
        self.token().region().is_copy()
    }

    /// Raw start of the pinned bytes.
    pub fn as_ptr(&self) -> *mut u8 {
        self.token().region().as_mut_ptr()
    }

    /// The pinned bytes.
    #[allow(unsafe_code)]
    pub fn as_slice(&self) -> &[u8] {
        let region = self.token().region();
        // SAFETY: `PinRuntime` guarantees the region is valid for `len`
        // bytes until the unpin, which only this guard can trigger; the
        // pointer is non-null and aligned even when `len == 0`.
        unsafe { std::slice::from_raw_parts(region.as_mut_ptr(), region.len()) }
    }

    /// The pinned bytes, mutably.
    #[allow(unsafe_code)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let region = self.token().region();
        // SAFETY: as in `as_slice`; `&mut self` makes this the only live
        // borrow of the region.
        unsafe { std::slice::from_raw_parts_mut(region.as_mut_ptr(), region.len()) }
    }

    /// Publish writes made to a copied region while keeping the pin.
    ///
    /// A no-op for in-place pins beyond the runtime's own bookkeeping.
    pub fn commit(&mut self) -> Result<(), PinError> {
        let array = self.array();
        let serial = self.token().serial();
        self.shim.release_serial(array, serial, ReleaseMode::Commit)
    }

    /// End the pin in `mode`.
    ///
    /// The guard ends the pin whatever the mode, so [`ReleaseMode::Commit`]
    /// is treated as [`ReleaseMode::CopyBack`].
    pub fn release(mut self, mode: ReleaseMode) -> Result<(), PinError> {
        let mode = match mode {
            ReleaseMode::Commit => ReleaseMode::CopyBack,
            other => other,
        };
        let token = self.token.take();
        match token {
            Some(token) => {
                let array = token.array();
                self.shim.release_with(array, token, mode).map(|_| ())
            }
            None => Ok(()),
        }
    }
}

impl<R: PinRuntime> Drop for PinGuard<'_, R> {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        let array = token.array();
        let result = self.shim.release_with(array, token, ReleaseMode::CopyBack);
        debug_assert!(result.is_ok(), "guard release failed: {result:?}");
        #[cfg(debug_assertions)]
        {
            if std::thread::panicking() {
                eprintln!("pinshim: array {array} released by unwinding pin guard");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinshim_heap::{HeapConfig, ManagedHeap, PinStrategy};
    use pinshim_test_utils::{pattern_heap, PATTERN_16};

    #[test]
    fn guard_reads_and_writes_storage() {
        let (heap, a) = pattern_heap();
        let mut shim = CriticalPin::new(heap);
        {
            let mut guard = shim.pin(a).unwrap();
            assert_eq!(guard.as_slice(), &PATTERN_16);
            assert!(!guard.is_copy());
            guard.as_mut_slice()[0] = 0x5A;
        }
        assert!(!shim.is_pinned());
        assert_eq!(shim.runtime().read(a).unwrap()[0], 0x5A);
    }

    #[test]
    fn guard_drop_on_early_return_releases() {
        fn first_byte(shim: &mut CriticalPin<ManagedHeap>, a: ArrayId) -> Result<u8, PinError> {
            let guard = shim.pin(a)?;
            Ok(guard.as_slice()[0])
        }
        let (heap, a) = pattern_heap();
        let mut shim = CriticalPin::new(heap);
        assert_eq!(first_byte(&mut shim, a).unwrap(), PATTERN_16[0]);
        assert!(!shim.is_pinned());
        assert!(shim.counters().is_balanced());
    }

    #[test]
    fn guard_releases_during_unwind() {
        let (heap, a) = pattern_heap();
        let mut shim = CriticalPin::new(heap);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = shim.pin(a).unwrap();
            panic!("boom inside critical region");
        }));
        assert!(result.is_err());
        assert!(!shim.is_pinned());
        assert_eq!(shim.runtime().active_critical(), 0);
    }

    #[test]
    fn explicit_abort_discards_copy() {
        let mut cfg = HeapConfig::with_capacity(256);
        cfg.pin_strategy = PinStrategy::Copy;
        let mut heap = ManagedHeap::new(cfg).unwrap();
        let a = heap.allocate_from(&PATTERN_16).unwrap();
        let mut shim = CriticalPin::new(heap);

        let mut guard = shim.pin(a).unwrap();
        assert!(guard.is_copy());
        guard.as_mut_slice().fill(0);
        guard.release(ReleaseMode::Abort).unwrap();
        assert_eq!(shim.runtime().read(a).unwrap(), &PATTERN_16);
    }

    #[test]
    fn commit_publishes_and_keeps_guard() {
        let mut cfg = HeapConfig::with_capacity(256);
        cfg.pin_strategy = PinStrategy::Copy;
        let mut heap = ManagedHeap::new(cfg).unwrap();
        let a = heap.allocate_from(&[1, 2, 3]).unwrap();
        let mut shim = CriticalPin::new(heap);

        let mut guard = shim.pin(a).unwrap();
        guard.as_mut_slice()[2] = 30;
        guard.commit().unwrap();
        guard.as_mut_slice()[0] = 10;
        guard.release(ReleaseMode::Abort).unwrap();
        assert_eq!(shim.runtime().read(a).unwrap(), &[1, 2, 30]);
        assert_eq!(shim.counters().commits, 1);
    }

    #[test]
    fn zero_length_guard() {
        let mut heap = ManagedHeap::new(HeapConfig::with_capacity(16)).unwrap();
        let a = heap.allocate(0).unwrap();
        let mut shim = CriticalPin::new(heap);
        {
            let mut guard = shim.pin(a).unwrap();
            assert!(guard.is_empty());
            assert!(guard.as_slice().is_empty());
            assert!(guard.as_mut_slice().is_empty());
        }
        assert!(!shim.is_pinned());
    }
}
