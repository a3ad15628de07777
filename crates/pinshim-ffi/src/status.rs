//! C-compatible status codes.
//!
//! [`PinStatus`] is a `repr(i32)` enum covering every error the shim and
//! the heap can report. Conversions from [`PinError`] and [`HeapError`]
//! are provided.

use pinshim_core::{PinError, ReleaseFault};
use pinshim_heap::HeapError;

/// C-compatible status code returned by all FFI functions.
///
/// `Ok` = 0, all errors are negative. Values are ABI-stable.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinStatus {
    /// Success.
    Ok = 0,
    /// Handle is invalid or was already destroyed.
    InvalidHandle = -1,
    /// The runtime could not pin the array.
    PinFailure = -2,
    /// Release with nothing pinned.
    UnbalancedRelease = -3,
    /// Release named an array other than the pinned one.
    HandleMismatch = -4,
    /// Release token belongs to an earlier pin.
    StaleToken = -5,
    /// Acquire while another array is pinned.
    AlreadyPinned = -6,
    /// Heap capacity exhausted even after collection.
    CapacityExceeded = -7,
    /// A collection was needed but a critical region is open.
    CollectionBlocked = -8,
    /// Requested array exceeds the per-array limit.
    ArrayTooLarge = -9,
    /// Read or write outside the array.
    OutOfBounds = -10,
    /// The array is pinned and cannot be freed.
    ArrayPinned = -11,
    /// Configuration validation error.
    ConfigError = -12,
    /// An argument is null, out of range, or otherwise invalid.
    InvalidArgument = -13,
    /// Caller-provided buffer is too small.
    BufferTooSmall = -14,
    /// Internal error (e.g. poisoned mutex after a prior panic).
    InternalError = -15,
    /// A Rust panic was caught at the FFI boundary.
    Panicked = -128,
}

impl From<&PinError> for PinStatus {
    fn from(e: &PinError) -> Self {
        match e {
            PinError::PinFailure { .. } => PinStatus::PinFailure,
            PinError::AlreadyPinned { .. } => PinStatus::AlreadyPinned,
            PinError::UnbalancedRelease { fault, .. } => match fault {
                ReleaseFault::NotPinned => PinStatus::UnbalancedRelease,
                ReleaseFault::HandleMismatch { .. } => PinStatus::HandleMismatch,
                ReleaseFault::StaleToken => PinStatus::StaleToken,
            },
        }
    }
}

impl From<&HeapError> for PinStatus {
    fn from(e: &HeapError) -> Self {
        match e {
            HeapError::CapacityExceeded { .. } => PinStatus::CapacityExceeded,
            HeapError::CollectionBlocked { .. } => PinStatus::CollectionBlocked,
            HeapError::ArrayTooLarge { .. } => PinStatus::ArrayTooLarge,
            HeapError::UnknownArray { .. } => PinStatus::InvalidHandle,
            HeapError::OutOfBounds { .. } => PinStatus::OutOfBounds,
            HeapError::ArrayPinned { .. } => PinStatus::ArrayPinned,
            HeapError::InvalidConfig { .. } => PinStatus::ConfigError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinshim_core::{ArrayId, PinFailureCause};

    #[test]
    fn status_code_values_are_stable() {
        assert_eq!(PinStatus::Ok as i32, 0);
        assert_eq!(PinStatus::InvalidHandle as i32, -1);
        assert_eq!(PinStatus::PinFailure as i32, -2);
        assert_eq!(PinStatus::UnbalancedRelease as i32, -3);
        assert_eq!(PinStatus::HandleMismatch as i32, -4);
        assert_eq!(PinStatus::StaleToken as i32, -5);
        assert_eq!(PinStatus::AlreadyPinned as i32, -6);
        assert_eq!(PinStatus::CapacityExceeded as i32, -7);
        assert_eq!(PinStatus::CollectionBlocked as i32, -8);
        assert_eq!(PinStatus::ArrayTooLarge as i32, -9);
        assert_eq!(PinStatus::OutOfBounds as i32, -10);
        assert_eq!(PinStatus::ArrayPinned as i32, -11);
        assert_eq!(PinStatus::ConfigError as i32, -12);
        assert_eq!(PinStatus::InvalidArgument as i32, -13);
        assert_eq!(PinStatus::BufferTooSmall as i32, -14);
        assert_eq!(PinStatus::InternalError as i32, -15);
        assert_eq!(PinStatus::Panicked as i32, -128);
    }

    #[test]
    fn pin_error_to_status() {
        let a = ArrayId(3);
        assert_eq!(
            PinStatus::from(&PinError::PinFailure {
                array: a,
                cause: PinFailureCause::InvalidHandle
            }),
            PinStatus::PinFailure
        );
        assert_eq!(
            PinStatus::from(&PinError::AlreadyPinned { held: a }),
            PinStatus::AlreadyPinned
        );
        assert_eq!(
            PinStatus::from(&PinError::UnbalancedRelease {
                array: a,
                fault: ReleaseFault::NotPinned
            }),
            PinStatus::UnbalancedRelease
        );
        assert_eq!(
            PinStatus::from(&PinError::UnbalancedRelease {
                array: a,
                fault: ReleaseFault::HandleMismatch { pinned: ArrayId(4) }
            }),
            PinStatus::HandleMismatch
        );
        assert_eq!(
            PinStatus::from(&PinError::UnbalancedRelease {
                array: a,
                fault: ReleaseFault::StaleToken
            }),
            PinStatus::StaleToken
        );
    }

    #[test]
    fn heap_error_to_status() {
        let a = ArrayId(1);
        assert_eq!(
            PinStatus::from(&HeapError::UnknownArray { array: a }),
            PinStatus::InvalidHandle
        );
        assert_eq!(
            PinStatus::from(&HeapError::ArrayPinned { array: a }),
            PinStatus::ArrayPinned
        );
        assert_eq!(
            PinStatus::from(&HeapError::CollectionBlocked { active_critical: 1 }),
            PinStatus::CollectionBlocked
        );
        assert_eq!(
            PinStatus::from(&HeapError::InvalidConfig {
                reason: "x".into()
            }),
            PinStatus::ConfigError
        );
        assert_eq!(
            PinStatus::from(&HeapError::OutOfBounds {
                array: a,
                offset: 4,
                len: 4,
                array_len: 6
            }),
            PinStatus::OutOfBounds
        );
    }
}
