//! Heap configuration parameters.

use crate::error::HeapError;

/// How the heap satisfies a critical pin.
#[repr(i32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PinStrategy {
    /// Expose the array's own storage.
    #[default]
    InPlace = 0,
    /// Expose a scratch copy, written back according to the release mode.
    Copy = 1,
}

impl PinStrategy {
    /// Parse an ABI value, returning `None` for unknown strategies.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::InPlace),
            1 => Some(Self::Copy),
            _ => None,
        }
    }
}

/// Configuration for a [`ManagedHeap`](crate::ManagedHeap).
///
/// Validated at construction and immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeapConfig {
    /// Total bytes of array storage, counting freed arrays that have not
    /// been reclaimed by a collection yet.
    ///
    /// Default: 256 MiB. Must be non-zero.
    pub capacity_bytes: usize,

    /// Largest single array, in bytes.
    ///
    /// Default: `i32::MAX`, the largest length a 32-bit array index can
    /// address. Must be non-zero and no larger than `capacity_bytes`.
    pub max_array_len: usize,

    /// Whether pins expose storage directly or through a copy.
    pub pin_strategy: PinStrategy,
}

impl HeapConfig {
    /// Default capacity: 256 MiB.
    pub const DEFAULT_CAPACITY_BYTES: usize = 256 * 1024 * 1024;

    /// Default per-array limit.
    pub const DEFAULT_MAX_ARRAY_LEN: usize = i32::MAX as usize;

    /// A config with the given capacity and defaults elsewhere.
    ///
    /// `max_array_len` is clamped to the capacity.
    pub fn with_capacity(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            max_array_len: Self::DEFAULT_MAX_ARRAY_LEN.min(capacity_bytes),
            pin_strategy: PinStrategy::InPlace,
        }
    }

    /// Check every invariant documented on the fields.
    pub fn validate(&self) -> Result<(), HeapError> {
        if self.capacity_bytes == 0 {
            return Err(HeapError::InvalidConfig {
                reason: "capacity_bytes must be non-zero".into(),
            });
        }
        if self.max_array_len == 0 {
            return Err(HeapError::InvalidConfig {
                reason: "max_array_len must be non-zero".into(),
            });
        }
        if self.max_array_len > self.capacity_bytes {
            return Err(HeapError::InvalidConfig {
                reason: format!(
                    "max_array_len {} exceeds capacity_bytes {}",
                    self.max_array_len, self.capacity_bytes
                ),
            });
        }
        Ok(())
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY_BYTES)
    }
}
