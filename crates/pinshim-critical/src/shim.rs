//! The single-slot shim over a host runtime.

use std::mem::ManuallyDrop;

use pinshim_core::{ArrayId, PinError, PinRuntime, RawRegion, ReleaseFault, ReleaseMode};

use crate::guard::PinGuard;
use crate::state::{PinCounters, PinState, PinToken};

#[derive(Clone, Copy)]
struct Held {
    array: ArrayId,
    serial: u64,
    region: RawRegion,
}

/// Tracks at most one critical pin against runtime `R`.
///
/// Dropping the shim while pinned releases the pin with
/// [`ReleaseMode::CopyBack`].
pub struct CriticalPin<R: PinRuntime> {
    runtime: R,
    held: Option<Held>,
    next_serial: u64,
    counters: PinCounters,
}

impl<R: PinRuntime> CriticalPin<R> {
    /// Wrap `runtime` in an unpinned shim.
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            held: None,
            next_serial: 1,
            counters: PinCounters::default(),
        }
    }

    /// Borrow the runtime.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Mutably borrow the runtime.
    ///
    /// Available while a token-form pin is held; the runtime itself is
    /// responsible for keeping pinned storage in place.
    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// Release any outstanding pin and return the runtime.
    #[allow(unsafe_code)]
    pub fn into_runtime(mut self) -> R {
        self.release_outstanding();
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so `runtime` is moved out exactly
        // once. The remaining fields own no resources.
        unsafe { std::ptr::read(&this.runtime) }
    }

    /// Current state.
    pub fn state(&self) -> PinState {
        match self.held {
            None => PinState::Unpinned,
            Some(h) => PinState::Pinned {
                array: h.array,
                serial: h.serial,
            },
        }
    }

    /// Whether a pin is held.
    pub fn is_pinned(&self) -> bool {
        self.held.is_some()
    }

    /// The pinned array, if any.
    pub fn pinned_array(&self) -> Option<ArrayId> {
        self.held.map(|h| h.array)
    }

    /// Cumulative counters.
    pub fn counters(&self) -> PinCounters {
        self.counters
    }

    /// Pin `array` and return the token that releases it.
    ///
    /// Fails with [`PinError::AlreadyPinned`] without calling the runtime
    /// if a pin is held, and with [`PinError::PinFailure`] if the runtime
    /// refuses.
    pub fn acquire(&mut self, array: ArrayId) -> Result<PinToken, PinError> {
        if let Some(held) = self.held {
            self.counters.rejected_acquires += 1;
            return Err(PinError::AlreadyPinned { held: held.array });
        }
        let region = match self.runtime.pin_critical(array) {
            Ok(region) => region,
            Err(cause) => {
                self.counters.rejected_acquires += 1;
                return Err(PinError::PinFailure { array, cause });
            }
        };
        let serial = self.next_serial;
        self.next_serial += 1;
        self.held = Some(Held {
            array,
            serial,
            region,
        });
        self.counters.acquires += 1;
        Ok(PinToken {
            array,
            serial,
            region,
        })
    }

    /// Pin `array` for the lifetime of the returned guard.
    pub fn pin(&mut self, array: ArrayId) -> Result<PinGuard<'_, R>, PinError> {
        let token = self.acquire(array)?;
        Ok(PinGuard::new(self, token))
    }

    /// End the pin owned by `token` with [`ReleaseMode::CopyBack`].
    ///
    /// On error the held pin, if any, is left intact and can still be
    /// ended with [`release_pinned`](Self::release_pinned).
    pub fn release(&mut self, array: ArrayId, token: PinToken) -> Result<(), PinError> {
        self.release_with(array, token, ReleaseMode::CopyBack)
            .map(|_| ())
    }

    /// Release in `mode`. A [`ReleaseMode::Commit`] keeps the pin and
    /// hands the token back.
    pub fn release_with(
        &mut self,
        array: ArrayId,
        token: PinToken,
        mode: ReleaseMode,
    ) -> Result<Option<PinToken>, PinError> {
        if token.array != array {
            self.counters.unbalanced_releases += 1;
            return Err(PinError::UnbalancedRelease {
                array,
                fault: ReleaseFault::HandleMismatch {
                    pinned: token.array,
                },
            });
        }
        self.release_serial(array, token.serial, mode)?;
        Ok(mode.keeps_pin().then_some(token))
    }

    /// Release by raw token serial, as carried across the C boundary.
    pub fn release_serial(
        &mut self,
        array: ArrayId,
        serial: u64,
        mode: ReleaseMode,
    ) -> Result<(), PinError> {
        let held = self.match_held(array, serial)?;
        self.finish(held, mode);
        Ok(())
    }

    /// Release whatever is pinned, returning the array that was held.
    ///
    /// For callers that cannot carry a token and only know that a pin
    /// should be outstanding. `array` is the caller's name for the array
    /// it meant to release; it is reported in the error and otherwise not
    /// compared, since such callers have no stable identity for it.
    pub fn release_pinned(
        &mut self,
        array: ArrayId,
        mode: ReleaseMode,
    ) -> Result<ArrayId, PinError> {
        let Some(held) = self.held else {
            self.counters.unbalanced_releases += 1;
            return Err(PinError::UnbalancedRelease {
                array,
                fault: ReleaseFault::NotPinned,
            });
        };
        self.finish(held, mode);
        Ok(held.array)
    }

    fn match_held(&mut self, array: ArrayId, serial: u64) -> Result<Held, PinError> {
        let fault = match self.held {
            None => ReleaseFault::NotPinned,
            Some(h) if h.array != array => ReleaseFault::HandleMismatch { pinned: h.array },
            Some(h) if h.serial != serial => ReleaseFault::StaleToken,
            Some(h) => return Ok(h),
        };
        self.counters.unbalanced_releases += 1;
        Err(PinError::UnbalancedRelease { array, fault })
    }

    fn finish(&mut self, held: Held, mode: ReleaseMode) {
        self.runtime.unpin_critical(held.array, held.region, mode);
        if mode.keeps_pin() {
            self.counters.commits += 1;
        } else {
            self.held = None;
            self.counters.releases += 1;
        }
    }

    fn release_outstanding(&mut self) -> Option<ArrayId> {
        let held = self.held?;
        self.finish(held, ReleaseMode::CopyBack);
        Some(held.array)
    }
}

impl<R: PinRuntime> Drop for CriticalPin<R> {
    fn drop(&mut self) {
        let released = self.release_outstanding();
        #[cfg(debug_assertions)]
        {
            if let Some(array) = released {
                eprintln!(
                    "pinshim: shim dropped with array {array} pinned; released with copy-back"
                );
            }
        }
        #[cfg(not(debug_assertions))]
        let _ = released;
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use pinshim_core::PinFailureCause;
    use pinshim_heap::{HeapConfig, ManagedHeap};
    use pinshim_test_utils::{MockCall, MockRuntime, PATTERN_16};

    fn heap_shim() -> CriticalPin<ManagedHeap> {
        CriticalPin::new(ManagedHeap::new(HeapConfig::with_capacity(4096)).unwrap())
    }

    #[test]
    fn acquire_release_round_trip() {
        let mut shim = heap_shim();
        let a = shim.runtime_mut().allocate_from(&PATTERN_16).unwrap();
        assert_eq!(shim.state(), PinState::Unpinned);

        let token = shim.acquire(a).unwrap();
        assert_eq!(
            shim.state(),
            PinState::Pinned {
                array: a,
                serial: 1
            }
        );
        assert_eq!(token.len(), 16);
        shim.release(a, token).unwrap();

        assert_eq!(shim.state(), PinState::Unpinned);
        assert_eq!(shim.runtime().read(a).unwrap(), &PATTERN_16);
        assert_eq!(shim.runtime().active_critical(), 0);
        assert!(shim.counters().is_balanced());
    }

    #[test]
    fn release_before_acquire_is_unbalanced() {
        let mut shim = heap_shim();
        let a = shim.runtime_mut().allocate(4).unwrap();
        assert_eq!(
            shim.release_serial(a, 1, ReleaseMode::CopyBack),
            Err(PinError::UnbalancedRelease {
                array: a,
                fault: ReleaseFault::NotPinned
            })
        );
        assert_eq!(
            shim.release_pinned(a, ReleaseMode::CopyBack),
            Err(PinError::UnbalancedRelease {
                array: a,
                fault: ReleaseFault::NotPinned
            })
        );
        assert_eq!(shim.counters().unbalanced_releases, 2);

        let token = shim.acquire(a).unwrap();
        let other = ArrayId(u64::MAX);
        assert_eq!(shim.release_pinned(other, ReleaseMode::CopyBack), Ok(a));
        assert_eq!(shim.state(), PinState::Unpinned);
        assert_eq!(
            shim.release(a, token).unwrap_err(),
            PinError::UnbalancedRelease {
                array: a,
                fault: ReleaseFault::NotPinned
            }
        );
    }

    #[test]
    fn double_acquire_is_refused_without_runtime_call() {
        let mut rt = MockRuntime::new();
        let a = rt.add_array(&[1, 2, 3]);
        let b = rt.add_array(&[4]);
        let mut shim = CriticalPin::new(rt);

        let token = shim.acquire(a).unwrap();
        assert_eq!(
            shim.acquire(b).unwrap_err(),
            PinError::AlreadyPinned { held: a }
        );
        assert_eq!(shim.runtime().calls(), &[MockCall::Pin(a)]);
        assert_eq!(shim.pinned_array(), Some(a));

        shim.release(a, token).unwrap();
        assert_eq!(shim.counters().rejected_acquires, 1);
    }

    #[test]
    fn mismatched_release_keeps_pin() {
        let mut shim = heap_shim();
        let a = shim.runtime_mut().allocate(4).unwrap();
        let b = shim.runtime_mut().allocate(4).unwrap();
        let token = shim.acquire(a).unwrap();
        let serial = token.serial();

        assert_eq!(
            shim.release(b, token),
            Err(PinError::UnbalancedRelease {
                array: b,
                fault: ReleaseFault::HandleMismatch { pinned: a }
            })
        );
        assert!(shim.is_pinned());
        assert_eq!(
            shim.release_serial(b, serial, ReleaseMode::CopyBack),
            Err(PinError::UnbalancedRelease {
                array: b,
                fault: ReleaseFault::HandleMismatch { pinned: a }
            })
        );
        shim.release_serial(a, serial, ReleaseMode::CopyBack).unwrap();
        assert!(!shim.is_pinned());
    }

    #[test]
    fn stale_serial_rejected() {
        let mut shim = heap_shim();
        let a = shim.runtime_mut().allocate(4).unwrap();
        let first = shim.acquire(a).unwrap();
        let old_serial = first.serial();
        shim.release(a, first).unwrap();

        let second = shim.acquire(a).unwrap();
        assert_eq!(second.serial(), old_serial + 1);
        assert_eq!(
            shim.release_serial(a, old_serial, ReleaseMode::CopyBack),
            Err(PinError::UnbalancedRelease {
                array: a,
                fault: ReleaseFault::StaleToken
            })
        );
        shim.release(a, second).unwrap();
    }

    #[test]
    fn runtime_refusal_is_pin_failure() {
        let mut rt = MockRuntime::new();
        let a = rt.add_array(&[0; 4]);
        rt.fail_next(PinFailureCause::NoBackingStorage);
        let mut shim = CriticalPin::new(rt);
        assert_eq!(
            shim.acquire(a).unwrap_err(),
            PinError::PinFailure {
                array: a,
                cause: PinFailureCause::NoBackingStorage
            }
        );
        assert_eq!(shim.state(), PinState::Unpinned);
        assert!(shim.acquire(a).is_ok());
        shim.release_pinned(a, ReleaseMode::CopyBack).unwrap();
    }

    #[test]
    fn pattern_write_through_pointer_is_visible() {
        let mut shim = heap_shim();
        let a = shim.runtime_mut().allocate_from(&PATTERN_16).unwrap();
        let token = shim.acquire(a).unwrap();
        let seen = unsafe { std::slice::from_raw_parts(token.ptr().as_ptr(), 16) };
        assert_eq!(seen, &PATTERN_16);
        unsafe { *token.ptr().as_ptr() = 0xEE };
        shim.release(a, token).unwrap();
        let after = shim.runtime().read(a).unwrap();
        assert_eq!(after[0], 0xEE);
        assert_eq!(&after[1..], &PATTERN_16[1..]);
    }

    #[test]
    fn commit_keeps_pin_and_returns_token() {
        let mut rt = MockRuntime::new();
        let a = rt.add_array(&[1, 2]);
        let mut shim = CriticalPin::new(rt);
        let token = shim.acquire(a).unwrap();
        let token = shim
            .release_with(a, token, ReleaseMode::Commit)
            .unwrap()
            .expect("commit hands the token back");
        assert!(shim.is_pinned());
        assert_eq!(shim.counters().commits, 1);
        assert_eq!(
            shim.release_with(a, token, ReleaseMode::Abort).unwrap(),
            None
        );
        assert_eq!(
            shim.runtime().calls(),
            &[
                MockCall::Pin(a),
                MockCall::Unpin(a, ReleaseMode::Commit),
                MockCall::Unpin(a, ReleaseMode::Abort),
            ]
        );
    }

    #[test]
    fn drop_releases_outstanding_pin() {
        let mut heap = ManagedHeap::new(HeapConfig::with_capacity(64)).unwrap();
        let a = heap.allocate(8).unwrap();
        {
            let mut shim = CriticalPin::new(&mut heap);
            let _token = shim.acquire(a).unwrap();
        }
        assert_eq!(heap.active_critical(), 0);
        assert!(!heap.is_pinned(a));
    }

    #[test]
    fn drop_releases_mock_pin_once_with_copy_back() {
        let mut rt = MockRuntime::new();
        let a = rt.add_array(&[1, 2, 3]);
        {
            let mut shim = CriticalPin::new(&mut rt);
            let token = shim.acquire(a).unwrap();
            // SAFETY: the region stays valid until the shim releases it.
            unsafe { *token.region().as_mut_ptr() = 7 };
            assert_eq!(shim.runtime().open_regions(), 1);
        }
        assert_eq!(rt.open_regions(), 0);
        assert_eq!(
            rt.calls(),
            &[MockCall::Pin(a), MockCall::Unpin(a, ReleaseMode::CopyBack)]
        );
        assert_eq!(rt.bytes(a), Some(&[7, 2, 3][..]));
    }

    #[test]
    fn into_runtime_releases() {
        let mut shim = heap_shim();
        let a = shim.runtime_mut().allocate(8).unwrap();
        let _token = shim.acquire(a).unwrap();
        let heap = shim.into_runtime();
        assert_eq!(heap.active_critical(), 0);
    }

    #[test]
    fn ten_thousand_cycles_stay_balanced() {
        let mut shim = heap_shim();
        let a = shim.runtime_mut().allocate_from(&PATTERN_16).unwrap();
        for _ in 0..10_000 {
            let token = shim.acquire(a).unwrap();
            shim.release(a, token).unwrap();
        }
        let c = shim.counters();
        assert_eq!(c.acquires, 10_000);
        assert!(c.is_balanced());
        assert_eq!(shim.runtime().active_critical(), 0);
        assert_eq!(shim.runtime().read(a).unwrap(), &PATTERN_16);
    }
}
