//! Heap-specific error types.

use std::error::Error;
use std::fmt;

use pinshim_core::ArrayId;

/// Errors from heap allocation and array access.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapError {
    /// Not enough capacity even after a collection.
    CapacityExceeded {
        /// Bytes requested.
        requested: usize,
        /// Bytes still available.
        available: usize,
    },
    /// A collection was needed but a critical region is open. The
    /// collection runs when the last region closes.
    CollectionBlocked {
        /// Number of open critical regions.
        active_critical: u32,
    },
    /// The request exceeds the per-array limit.
    ArrayTooLarge {
        /// Bytes requested.
        requested: usize,
        /// Configured limit.
        max: usize,
    },
    /// The ID does not name a live array.
    UnknownArray {
        /// The unrecognised array.
        array: ArrayId,
    },
    /// An access fell outside the array.
    OutOfBounds {
        /// The array accessed.
        array: ArrayId,
        /// Start of the access.
        offset: usize,
        /// Bytes accessed.
        len: usize,
        /// Length of the array.
        array_len: usize,
    },
    /// The array is inside a critical region and cannot be freed or
    /// written through the heap.
    ArrayPinned {
        /// The pinned array.
        array: ArrayId,
    },
    /// Configuration validation failed.
    InvalidConfig {
        /// Which invariant was violated.
        reason: String,
    },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded {
                requested,
                available,
            } => write!(
                f,
                "heap capacity exceeded: requested {requested} bytes, {available} available"
            ),
            Self::CollectionBlocked { active_critical } => write!(
                f,
                "collection blocked by {active_critical} open critical region(s)"
            ),
            Self::ArrayTooLarge { requested, max } => {
                write!(f, "array of {requested} bytes exceeds limit of {max}")
            }
            Self::UnknownArray { array } => write!(f, "unknown array: {array}"),
            Self::OutOfBounds {
                array,
                offset,
                len,
                array_len,
            } => write!(
                f,
                "access [{offset}, {offset}+{len}) out of bounds for array {array} of length {array_len}"
            ),
            Self::ArrayPinned { array } => write!(f, "array {array} is pinned"),
            Self::InvalidConfig { reason } => write!(f, "invalid heap config: {reason}"),
        }
    }
}

impl Error for HeapError {}
