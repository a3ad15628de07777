//! Observable shim state, capability tokens and counters.

use std::fmt;
use std::ptr::NonNull;

use pinshim_core::{ArrayId, RawRegion};

/// The shim's two states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PinState {
    /// Nothing is pinned. Initial state.
    #[default]
    Unpinned,
    /// One array is pinned.
    Pinned {
        /// The pinned array.
        array: ArrayId,
        /// Serial of the token that owns the pin.
        serial: u64,
    },
}

impl fmt::Display for PinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpinned => write!(f, "unpinned"),
            Self::Pinned { array, serial } => write!(f, "pinned(array {array}, serial {serial})"),
        }
    }
}

/// Capability to release one pin.
///
/// Returned by [`CriticalPin::acquire`](crate::CriticalPin::acquire) and
/// consumed by the release that ends the pin. Serials start at 1 and are
/// never reused within a shim, so a token from an earlier pin is rejected.
#[must_use = "a pin stays held until its token is released"]
#[derive(Debug, PartialEq, Eq)]
pub struct PinToken {
    pub(crate) array: ArrayId,
    pub(crate) serial: u64,
    pub(crate) region: RawRegion,
}

impl PinToken {
    /// The pinned array.
    pub fn array(&self) -> ArrayId {
        self.array
    }

    /// Serial number of this pin.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// The pinned region.
    pub fn region(&self) -> RawRegion {
        self.region
    }

    /// Start of the pinned bytes.
    pub fn ptr(&self) -> NonNull<u8> {
        self.region.ptr()
    }

    /// Length of the pinned bytes.
    pub fn len(&self) -> usize {
        self.region.len()
    }

    /// Returns `true` if the pinned array is empty.
    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }
}

/// Cumulative shim counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PinCounters {
    /// Pins established.
    pub acquires: u64,
    /// Pins ended.
    pub releases: u64,
    /// `Commit` releases that kept the pin.
    pub commits: u64,
    /// Acquires refused, either by the shim or by the runtime.
    pub rejected_acquires: u64,
    /// Releases that did not match the held pin.
    pub unbalanced_releases: u64,
}

impl PinCounters {
    /// Whether every established pin has been ended.
    pub fn is_balanced(&self) -> bool {
        self.acquires == self.releases
    }
}
