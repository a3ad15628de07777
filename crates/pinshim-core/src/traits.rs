//! The host-runtime side of the critical pin boundary.

use crate::error::PinFailureCause;
use crate::id::ArrayId;
use crate::region::{RawRegion, ReleaseMode};

/// A managed runtime's critical pin/unpin pair.
///
/// `pin_critical` enters a critical region for one array and exposes its
/// storage (or a copy of it). `unpin_critical` leaves the region. The
/// shim calls them strictly in pairs, except that a
/// [`ReleaseMode::Commit`] unpin leaves the region open and is followed
/// by another unpin for the same region.
///
/// # Safety
///
/// Implementors guarantee that a region returned by `pin_critical` is
/// valid for reads and writes of `region.len()` bytes, is not relocated,
/// reclaimed or otherwise accessed by the runtime's memory manager, and
/// stays so until an unpin of that region in a mode other than `Commit`.
#[allow(unsafe_code)]
pub unsafe trait PinRuntime {
    /// Enter a critical region for `array` and expose its bytes.
    fn pin_critical(&mut self, array: ArrayId) -> Result<RawRegion, PinFailureCause>;

    /// Leave the critical region entered for `array`.
    ///
    /// `region` is exactly the value returned by the matching
    /// `pin_critical`.
    fn unpin_critical(&mut self, array: ArrayId, region: RawRegion, mode: ReleaseMode);
}

// SAFETY: forwards to `R`, which upholds the contract.
#[allow(unsafe_code)]
unsafe impl<R: PinRuntime + ?Sized> PinRuntime for &mut R {
    fn pin_critical(&mut self, array: ArrayId) -> Result<RawRegion, PinFailureCause> {
        (**self).pin_critical(array)
    }

    fn unpin_critical(&mut self, array: ArrayId, region: RawRegion, mode: ReleaseMode) {
        (**self).unpin_critical(array, region, mode)
    }
}

// SAFETY: forwards to `R`, which upholds the contract.
#[allow(unsafe_code)]
unsafe impl<R: PinRuntime + ?Sized> PinRuntime for Box<R> {
    fn pin_critical(&mut self, array: ArrayId) -> Result<RawRegion, PinFailureCause> {
        (**self).pin_critical(array)
    }

    fn unpin_critical(&mut self, array: ArrayId, region: RawRegion, mode: ReleaseMode) {
        (**self).unpin_critical(array, region, mode)
    }
}
