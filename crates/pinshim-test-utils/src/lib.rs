//! Test utilities and mock types for pinshim development.
//!
//! Provides the 16-byte reference pattern, prebuilt heaps, and
//! [`MockRuntime`], a [`PinRuntime`] that records every call and can be
//! told to refuse the next pin.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::collections::HashMap;
use std::ptr::NonNull;

use pinshim_core::{ArrayId, PinFailureCause, PinRuntime, RawRegion, ReleaseMode};
use pinshim_heap::{HeapConfig, ManagedHeap, PinStrategy};

/// Known 16-byte pattern for write-through checks.
pub const PATTERN_16: [u8; 16] = [
    0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA,
    0xBB,
];

/// A 4 KiB in-place heap holding one array filled with [`PATTERN_16`].
pub fn pattern_heap() -> (ManagedHeap, ArrayId) {
    pattern_heap_with(PinStrategy::InPlace)
}

/// As [`pattern_heap`], with the given pin strategy.
pub fn pattern_heap_with(strategy: PinStrategy) -> (ManagedHeap, ArrayId) {
    let mut config = HeapConfig::with_capacity(4096);
    config.pin_strategy = strategy;
    let mut heap = match ManagedHeap::new(config) {
        Ok(h) => h,
        Err(e) => panic!("fixture heap config rejected: {e}"),
    };
    let array = match heap.allocate_from(&PATTERN_16) {
        Ok(a) => a,
        Err(e) => panic!("fixture allocation failed: {e}"),
    };
    (heap, array)
}

/// One call observed by [`MockRuntime`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockCall {
    Pin(ArrayId),
    Unpin(ArrayId, ReleaseMode),
}

/// Scripted runtime backed by plain boxed buffers.
///
/// Arrays never move. Every `pin_critical`/`unpin_critical` is appended to
/// [`calls`](MockRuntime::calls), including refused pins.
pub struct MockRuntime {
    arrays: HashMap<ArrayId, Box<[u8]>>,
    next_id: u64,
    fail_next: Option<PinFailureCause>,
    calls: Vec<MockCall>,
    open: u32,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            arrays: HashMap::new(),
            next_id: 1,
            fail_next: None,
            calls: Vec::new(),
            open: 0,
        }
    }

    /// Register an array holding a copy of `bytes`.
    pub fn add_array(&mut self, bytes: &[u8]) -> ArrayId {
        let id = ArrayId(self.next_id);
        self.next_id += 1;
        self.arrays.insert(id, bytes.into());
        id
    }

    /// Refuse the next pin with `cause`.
    pub fn fail_next(&mut self, cause: PinFailureCause) {
        self.fail_next = Some(cause);
    }

    /// Contents of `array`, if registered.
    pub fn bytes(&self, array: ArrayId) -> Option<&[u8]> {
        self.arrays.get(&array).map(|b| &**b)
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> &[MockCall] {
        &self.calls
    }

    /// Pins entered and not yet ended.
    pub fn open_regions(&self) -> u32 {
        self.open
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: regions point into boxed buffers that are never reallocated or
// removed while registered.
#[allow(unsafe_code)]
unsafe impl PinRuntime for MockRuntime {
    fn pin_critical(&mut self, array: ArrayId) -> Result<RawRegion, PinFailureCause> {
        self.calls.push(MockCall::Pin(array));
        if let Some(cause) = self.fail_next.take() {
            return Err(cause);
        }
        let data = self
            .arrays
            .get_mut(&array)
            .ok_or(PinFailureCause::InvalidHandle)?;
        let ptr = NonNull::new(data.as_mut_ptr()).ok_or(PinFailureCause::NoBackingStorage)?;
        self.open += 1;
        Ok(RawRegion::new(ptr, data.len(), false))
    }

    fn unpin_critical(&mut self, array: ArrayId, _region: RawRegion, mode: ReleaseMode) {
        self.calls.push(MockCall::Unpin(array, mode));
        if !mode.keeps_pin() {
            self.open = self.open.saturating_sub(1);
        }
    }
}
