//! Runtime lifecycle FFI: create, collect, destroy.
//!
//! A runtime is a heap wrapped in its own shim, stored as
//! `Arc<Mutex<CriticalPin<ManagedHeap>>>` so the global `RUNTIMES` table
//! lock is only held for handle lookup. Distinct runtimes never contend.

use std::sync::{Arc, Mutex};

use pinshim_core::HandleTable;
use pinshim_critical::CriticalPin;
use pinshim_heap::ManagedHeap;

use crate::config::configs;
use crate::status::PinStatus;
use crate::types::PinshimCollectOutcome;

pub(crate) type ShimArc = Arc<Mutex<CriticalPin<ManagedHeap>>>;

static RUNTIMES: Mutex<HandleTable<ShimArc>> = Mutex::new(HandleTable::new());

/// Clone the Arc for a runtime handle, briefly locking the global table.
pub(crate) fn lookup(handle: u64) -> Result<ShimArc, PinStatus> {
    let table = RUNTIMES.lock().map_err(|_| PinStatus::InternalError)?;
    table.get(handle).cloned().ok_or(PinStatus::InvalidHandle)
}

/// Create a runtime from a config handle. Consumes the config.
///
/// On success writes the runtime handle to `out`. On failure the config
/// is still consumed.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_runtime_create(config_handle: u64, out: *mut u64) -> i32 {
    ffi_guard!({
        let builder = match ffi_lock!(configs()).remove(config_handle) {
            Some(b) => b,
            None => return PinStatus::InvalidHandle as i32,
        };
        if out.is_null() {
            return PinStatus::InvalidArgument as i32;
        }
        let heap = match ManagedHeap::new(builder.build()) {
            Ok(h) => h,
            Err(e) => return PinStatus::from(&e) as i32,
        };
        let handle = ffi_lock!(RUNTIMES).insert(Arc::new(Mutex::new(CriticalPin::new(heap))));
        // SAFETY: out is non-null and valid per caller contract.
        unsafe { *out = handle };
        PinStatus::Ok as i32
    })
}

/// Destroy a runtime. An outstanding pin is released with copy-back;
/// pointers obtained from `pinshim_acquire` are invalid afterwards.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_runtime_destroy(handle: u64) -> i32 {
    ffi_guard!({
        match ffi_lock!(RUNTIMES).remove(handle) {
            Some(_) => PinStatus::Ok as i32,
            None => PinStatus::InvalidHandle as i32,
        }
    })
}

/// Request a collection. It is deferred while a pin is held and runs
/// automatically at release.
///
/// `outcome_out` may be null.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_runtime_collect(
    handle: u64,
    outcome_out: *mut PinshimCollectOutcome,
) -> i32 {
    ffi_guard!({
        let arc = match lookup(handle) {
            Ok(a) => a,
            Err(s) => return s as i32,
        };
        let mut shim = ffi_lock!(arc);
        let outcome = shim.runtime_mut().collect();
        if !outcome_out.is_null() {
            // SAFETY: outcome_out is non-null and valid per caller contract.
            unsafe { *outcome_out = PinshimCollectOutcome::from_rust(&outcome) };
        }
        PinStatus::Ok as i32
    })
}
