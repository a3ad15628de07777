//! Config builder FFI: create and populate a `HeapConfig` behind an
//! opaque handle.
//!
//! C callers build a config incrementally, then pass the handle to
//! `pinshim_runtime_create`, which consumes it.

use std::sync::Mutex;

use pinshim_core::HandleTable;
use pinshim_heap::{HeapConfig, PinStrategy};

use crate::status::PinStatus;

static CONFIGS: Mutex<HandleTable<ConfigBuilder>> = Mutex::new(HandleTable::new());

/// Heap settings accumulated by FFI calls.
#[derive(Clone, Debug, Default)]
pub(crate) struct ConfigBuilder {
    capacity_bytes: Option<usize>,
    max_array_len: Option<usize>,
    pin_strategy: PinStrategy,
}

impl ConfigBuilder {
    /// Resolve unset fields to their defaults. Validation happens when
    /// the heap is built.
    pub(crate) fn build(&self) -> HeapConfig {
        let mut config = HeapConfig::with_capacity(
            self.capacity_bytes
                .unwrap_or(HeapConfig::DEFAULT_CAPACITY_BYTES),
        );
        if let Some(max) = self.max_array_len {
            config.max_array_len = max;
        }
        config.pin_strategy = self.pin_strategy;
        config
    }
}

pub(crate) fn configs() -> &'static Mutex<HandleTable<ConfigBuilder>> {
    &CONFIGS
}

// ── FFI functions ───────────────────────────────────────────────

/// Create a new config builder with default settings. Returns the
/// handle via `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_config_create(out: *mut u64) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return PinStatus::InvalidArgument as i32;
        }
        let handle = ffi_lock!(CONFIGS).insert(ConfigBuilder::default());
        // SAFETY: out is non-null and valid per caller contract.
        unsafe { *out = handle };
        PinStatus::Ok as i32
    })
}

/// Destroy a config builder without using it.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_config_destroy(handle: u64) -> i32 {
    ffi_guard!({
        match ffi_lock!(CONFIGS).remove(handle) {
            Some(_) => PinStatus::Ok as i32,
            None => PinStatus::InvalidHandle as i32,
        }
    })
}

/// Set the heap capacity in bytes.
///
/// Unless `pinshim_config_set_max_array_len` is also called, the
/// per-array limit follows the capacity.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_config_set_capacity(handle: u64, bytes: u64) -> i32 {
    ffi_guard!({
        let Ok(bytes) = usize::try_from(bytes) else {
            return PinStatus::InvalidArgument as i32;
        };
        let mut table = ffi_lock!(CONFIGS);
        match table.get_mut(handle) {
            Some(builder) => {
                builder.capacity_bytes = Some(bytes);
                PinStatus::Ok as i32
            }
            None => PinStatus::InvalidHandle as i32,
        }
    })
}

/// Set the largest single array, in bytes.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_config_set_max_array_len(handle: u64, len: u64) -> i32 {
    ffi_guard!({
        let Ok(len) = usize::try_from(len) else {
            return PinStatus::InvalidArgument as i32;
        };
        let mut table = ffi_lock!(CONFIGS);
        match table.get_mut(handle) {
            Some(builder) => {
                builder.max_array_len = Some(len);
                PinStatus::Ok as i32
            }
            None => PinStatus::InvalidHandle as i32,
        }
    })
}

/// Set the pin strategy (`PinshimPinStrategy`).
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_config_set_pin_strategy(handle: u64, strategy: i32) -> i32 {
    ffi_guard!({
        let Some(strategy) = PinStrategy::from_raw(strategy) else {
            return PinStatus::InvalidArgument as i32;
        };
        let mut table = ffi_lock!(CONFIGS);
        match table.get_mut(handle) {
            Some(builder) => {
                builder.pin_strategy = strategy;
                PinStatus::Ok as i32
            }
            None => PinStatus::InvalidHandle as i32,
        }
    })
}
