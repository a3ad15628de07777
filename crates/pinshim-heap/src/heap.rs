//! The managed heap and its critical pin implementation.
//!
//! Collection semantics follow the critical-region lock: opening a region
//! locks the collector out entirely, so nothing is relocated while any
//! pointer handed out by [`PinRuntime::pin_critical`] is live. Requests
//! that arrive meanwhile are recorded and the collection runs as soon as
//! the last region closes.

use std::ptr::NonNull;

use indexmap::IndexMap;
use pinshim_core::{ArrayId, HandleTable, PinFailureCause, PinRuntime, RawRegion, ReleaseMode};

use crate::config::{HeapConfig, PinStrategy};
use crate::error::HeapError;
use crate::stats::{CollectOutcome, HeapStats};

struct HeapArray {
    data: Box<[u8]>,
    /// Open critical regions on this array.
    pins: u32,
}

/// Scratch copies handed out under [`PinStrategy::Copy`], keyed by the
/// array and the copy's address so nested pins of one array stay distinct.
type CopyKey = (ArrayId, usize);

/// A relocating heap of byte arrays.
pub struct ManagedHeap {
    config: HeapConfig,
    arrays: HandleTable<HeapArray>,
    copies: IndexMap<CopyKey, Box<[u8]>>,
    live_bytes: usize,
    dead_bytes: usize,
    critical: u32,
    pending: bool,
    collections: u64,
    deferred: u64,
    relocations: u64,
}

impl ManagedHeap {
    /// Create an empty heap after validating `config`.
    pub fn new(config: HeapConfig) -> Result<Self, HeapError> {
        config.validate()?;
        Ok(Self {
            config,
            arrays: HandleTable::new(),
            copies: IndexMap::new(),
            live_bytes: 0,
            dead_bytes: 0,
            critical: 0,
            pending: false,
            collections: 0,
            deferred: 0,
            relocations: 0,
        })
    }

    /// The configuration the heap was built with.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    fn available(&self) -> usize {
        self.config
            .capacity_bytes
            .saturating_sub(self.live_bytes + self.dead_bytes)
    }

    /// Allocate a zero-filled array of `len` bytes.
    ///
    /// Runs a collection first if capacity is short. If a critical region
    /// is open the collection is deferred instead and the allocation fails
    /// with [`HeapError::CollectionBlocked`].
    pub fn allocate(&mut self, len: usize) -> Result<ArrayId, HeapError> {
        if len > self.config.max_array_len {
            return Err(HeapError::ArrayTooLarge {
                requested: len,
                max: self.config.max_array_len,
            });
        }
        if self.available() < len {
            if self.critical > 0 {
                self.defer();
                return Err(HeapError::CollectionBlocked {
                    active_critical: self.critical,
                });
            }
            self.run_collection();
            if self.available() < len {
                return Err(HeapError::CapacityExceeded {
                    requested: len,
                    available: self.available(),
                });
            }
        }
        self.live_bytes += len;
        let handle = self.arrays.insert(HeapArray {
            data: vec![0u8; len].into_boxed_slice(),
            pins: 0,
        });
        Ok(ArrayId(handle))
    }

    /// Allocate an array holding a copy of `bytes`.
    pub fn allocate_from(&mut self, bytes: &[u8]) -> Result<ArrayId, HeapError> {
        let array = self.allocate(bytes.len())?;
        self.write(array, 0, bytes)?;
        Ok(array)
    }

    /// Free an array. Its bytes are reclaimed by the next collection.
    pub fn free(&mut self, array: ArrayId) -> Result<(), HeapError> {
        let entry = self
            .arrays
            .get(array.0)
            .ok_or(HeapError::UnknownArray { array })?;
        if entry.pins > 0 {
            return Err(HeapError::ArrayPinned { array });
        }
        let len = entry.data.len();
        self.arrays.remove(array.0);
        self.live_bytes -= len;
        self.dead_bytes += len;
        Ok(())
    }

    /// Whether `array` names a live array.
    pub fn contains(&self, array: ArrayId) -> bool {
        self.arrays.contains(array.0)
    }

    /// Length of `array` in bytes.
    pub fn len(&self, array: ArrayId) -> Result<usize, HeapError> {
        self.read(array).map(<[u8]>::len)
    }

    /// Whether `array` is inside at least one critical region.
    pub fn is_pinned(&self, array: ArrayId) -> bool {
        self.arrays.get(array.0).is_some_and(|a| a.pins > 0)
    }

    /// Borrow the contents of `array`.
    pub fn read(&self, array: ArrayId) -> Result<&[u8], HeapError> {
        self.arrays
            .get(array.0)
            .map(|a| &*a.data)
            .ok_or(HeapError::UnknownArray { array })
    }

    /// Copy `bytes` into `array` starting at `offset`.
    ///
    /// Refused with [`HeapError::ArrayPinned`] while the array is inside a
    /// critical region; the region's holder owns the contents until unpin.
    pub fn write(&mut self, array: ArrayId, offset: usize, bytes: &[u8]) -> Result<(), HeapError> {
        let entry = self
            .arrays
            .get_mut(array.0)
            .ok_or(HeapError::UnknownArray { array })?;
        if entry.pins > 0 {
            return Err(HeapError::ArrayPinned { array });
        }
        let array_len = entry.data.len();
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= array_len)
            .ok_or(HeapError::OutOfBounds {
                array,
                offset,
                len: bytes.len(),
                array_len,
            })?;
        entry.data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Reclaim freed arrays and relocate every live one.
    ///
    /// Deferred while any critical region is open.
    pub fn collect(&mut self) -> CollectOutcome {
        if self.critical > 0 {
            self.defer();
            return CollectOutcome::Deferred {
                active_critical: self.critical,
            };
        }
        self.run_collection()
    }

    fn defer(&mut self) {
        self.pending = true;
        self.deferred += 1;
    }

    fn run_collection(&mut self) -> CollectOutcome {
        debug_assert_eq!(self.critical, 0, "collector ran inside a critical region");
        let reclaimed_bytes = std::mem::take(&mut self.dead_bytes);
        let mut relocated = 0;
        for (_, array) in self.arrays.iter_mut() {
            if array.data.is_empty() {
                continue;
            }
            // The new box is allocated while the old one is still live, so
            // the storage always lands at a different address.
            array.data = array.data.to_vec().into_boxed_slice();
            relocated += 1;
        }
        self.relocations += relocated as u64;
        self.collections += 1;
        self.pending = false;
        CollectOutcome::Completed {
            reclaimed_bytes,
            relocated,
        }
    }

    /// Number of open critical regions.
    pub fn active_critical(&self) -> u32 {
        self.critical
    }

    /// Snapshot of the heap counters.
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            live_arrays: self.arrays.len(),
            live_bytes: self.live_bytes,
            dead_bytes: self.dead_bytes,
            capacity_bytes: self.config.capacity_bytes,
            active_critical: self.critical,
            collection_pending: self.pending,
            collections: self.collections,
            deferred_collections: self.deferred,
            relocations: self.relocations,
        }
    }
}

// SAFETY: in-place regions point into a boxed slice whose owner is never
// reallocated while `pins > 0`: the only reallocation happens in
// `run_collection`, which is unreachable while `critical > 0`, and `free`
// refuses pinned arrays. Copy regions point into boxes held in `copies`
// until a non-`Commit` unpin removes them.
#[allow(unsafe_code)]
unsafe impl PinRuntime for ManagedHeap {
    fn pin_critical(&mut self, array: ArrayId) -> Result<RawRegion, PinFailureCause> {
        let strategy = self.config.pin_strategy;
        let entry = self
            .arrays
            .get_mut(array.0)
            .ok_or(PinFailureCause::InvalidHandle)?;
        let region = match strategy {
            PinStrategy::InPlace => {
                let ptr = NonNull::new(entry.data.as_mut_ptr())
                    .ok_or(PinFailureCause::NoBackingStorage)?;
                RawRegion::new(ptr, entry.data.len(), false)
            }
            PinStrategy::Copy if entry.data.is_empty() => RawRegion::empty(true),
            PinStrategy::Copy => {
                let mut copy = entry.data.clone();
                let ptr =
                    NonNull::new(copy.as_mut_ptr()).ok_or(PinFailureCause::NoBackingStorage)?;
                self.copies.insert((array, ptr.as_ptr() as usize), copy);
                RawRegion::new(ptr, entry.data.len(), true)
            }
        };
        entry.pins += 1;
        self.critical += 1;
        Ok(region)
    }

    fn unpin_critical(&mut self, array: ArrayId, region: RawRegion, mode: ReleaseMode) {
        let Some(entry) = self.arrays.get_mut(array.0) else {
            #[cfg(debug_assertions)]
            {
                eprintln!("pinshim: unpin of unknown array {array} ignored");
            }
            return;
        };
        if region.is_copy() && !region.is_empty() {
            let key = (array, region.as_mut_ptr() as usize);
            if mode.writes_back() {
                if let Some(copy) = self.copies.get(&key) {
                    entry.data.copy_from_slice(copy);
                }
            }
            if !mode.keeps_pin() {
                self.copies.shift_remove(&key);
            }
        }
        if mode.keeps_pin() {
            return;
        }
        entry.pins = entry.pins.saturating_sub(1);
        self.critical = self.critical.saturating_sub(1);
        if self.critical == 0 && self.pending {
            self.run_collection();
        }
    }
}
