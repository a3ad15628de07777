//! C-compatible enums for release modes and pin strategies, and the
//! collection outcome record.

use pinshim_core::ReleaseMode;
use pinshim_heap::{CollectOutcome, PinStrategy};

/// Release mode for `pinshim_release`.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinshimReleaseMode {
    /// Write a copied region back and end the pin.
    CopyBack = 0,
    /// Write a copied region back and keep the pin.
    Commit = 1,
    /// Discard a copied region and end the pin.
    Abort = 2,
}

/// Pin strategy for `pinshim_config_set_pin_strategy`.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinshimPinStrategy {
    /// Pins expose the array's own storage.
    InPlace = 0,
    /// Pins expose a scratch copy.
    Copy = 1,
}

// The C enums must carry the same values the Rust side parses.
const _: () = assert!(PinshimReleaseMode::CopyBack as i32 == ReleaseMode::CopyBack as i32);
const _: () = assert!(PinshimReleaseMode::Commit as i32 == ReleaseMode::Commit as i32);
const _: () = assert!(PinshimReleaseMode::Abort as i32 == ReleaseMode::Abort as i32);
const _: () = assert!(PinshimPinStrategy::InPlace as i32 == PinStrategy::InPlace as i32);
const _: () = assert!(PinshimPinStrategy::Copy as i32 == PinStrategy::Copy as i32);

/// Result of `pinshim_runtime_collect`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PinshimCollectOutcome {
    /// 1 if the collection was deferred by an open critical region.
    pub deferred: u8,
    /// Open critical regions at the time of the request.
    pub active_critical: u32,
    /// Bytes reclaimed (0 when deferred).
    pub reclaimed_bytes: u64,
    /// Arrays relocated (0 when deferred).
    pub relocated: u64,
}

// 1 + 3 padding + 4 + 8 + 8 = 24 bytes, align 8.
const _: () = assert!(std::mem::size_of::<PinshimCollectOutcome>() == 24);
const _: () = assert!(std::mem::align_of::<PinshimCollectOutcome>() == 8);

impl PinshimCollectOutcome {
    pub(crate) fn from_rust(outcome: &CollectOutcome) -> Self {
        match *outcome {
            CollectOutcome::Completed {
                reclaimed_bytes,
                relocated,
            } => Self {
                deferred: 0,
                active_critical: 0,
                reclaimed_bytes: reclaimed_bytes as u64,
                relocated: relocated as u64,
            },
            CollectOutcome::Deferred { active_critical } => Self {
                deferred: 1,
                active_critical,
                reclaimed_bytes: 0,
                relocated: 0,
            },
        }
    }
}
