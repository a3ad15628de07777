//! Pinned regions and release modes.

use std::fmt;
use std::ptr::NonNull;

/// A raw view of pinned array storage.
///
/// Produced by [`PinRuntime::pin_critical`](crate::PinRuntime::pin_critical)
/// and valid until the matching unpin. A zero-length region carries a
/// dangling, well-aligned pointer and must never be dereferenced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawRegion {
    ptr: NonNull<u8>,
    len: usize,
    copied: bool,
}

// SAFETY: a region is only an address and a length. Dereferencing it is
// gated on holding the pin that produced it, and the pin owner serializes
// every access to the runtime that backs it.
#[allow(unsafe_code)]
unsafe impl Send for RawRegion {}

impl RawRegion {
    /// Describe `len` bytes at `ptr`. `copied` reports whether the runtime
    /// handed out a scratch copy instead of the array's own storage.
    pub fn new(ptr: NonNull<u8>, len: usize, copied: bool) -> Self {
        Self { ptr, len, copied }
    }

    /// A zero-length region. Its pointer is dangling.
    pub fn empty(copied: bool) -> Self {
        Self::new(NonNull::dangling(), 0, copied)
    }

    /// Start of the region.
    pub fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Start of the region as a raw mutable pointer.
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for zero-length regions.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the region is a copy of the array rather than its storage.
    pub fn is_copy(&self) -> bool {
        self.copied
    }
}

/// How a pin ends. ABI-stable values match the runtime release call's
/// `mode` argument.
#[repr(i32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReleaseMode {
    /// Write a copied region back, then end the pin.
    #[default]
    CopyBack = 0,
    /// Write a copied region back and keep the pin active.
    Commit = 1,
    /// End the pin, discarding writes made to a copied region.
    Abort = 2,
}

impl ReleaseMode {
    /// Parse an ABI value, returning `None` for unknown modes.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::CopyBack),
            1 => Some(Self::Commit),
            2 => Some(Self::Abort),
            _ => None,
        }
    }

    /// Whether the pin is still held after a release in this mode.
    pub fn keeps_pin(self) -> bool {
        matches!(self, Self::Commit)
    }

    /// Whether a copied region is written back to the array.
    pub fn writes_back(self) -> bool {
        !matches!(self, Self::Abort)
    }
}

impl fmt::Display for ReleaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CopyBack => write!(f, "copy-back"),
            Self::Commit => write!(f, "commit"),
            Self::Abort => write!(f, "abort"),
        }
    }
}
