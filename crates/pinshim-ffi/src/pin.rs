//! Acquire/release FFI.
//!
//! `pinshim_acquire` hands back the pinned bytes together with a token;
//! `pinshim_release` must name the same array and token. Tokens are the
//! shim's pin serials and start at 1, so `0` never releases anything.

use pinshim_core::{ArrayId, ReleaseMode};

use crate::runtime::lookup;
use crate::status::PinStatus;

/// Pin `array` and expose its bytes.
///
/// On success writes the release token to `token_out`, the start of the
/// pinned bytes to `ptr_out`, and their length to `len_out` (which may be
/// null). On any failure `*ptr_out` is set to null, provided `ptr_out`
/// itself is non-null.
///
/// The pointer stays valid until the matching `pinshim_release` ends the
/// pin or the runtime is destroyed. A zero-length array yields a
/// non-null, dangling pointer that must not be dereferenced.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_acquire(
    rt: u64,
    array: u64,
    token_out: *mut u64,
    ptr_out: *mut *mut u8,
    len_out: *mut u64,
) -> i32 {
    ffi_guard!({
        if ptr_out.is_null() {
            return PinStatus::InvalidArgument as i32;
        }
        // SAFETY: ptr_out is non-null and valid per caller contract.
        unsafe { *ptr_out = std::ptr::null_mut() };
        if token_out.is_null() {
            return PinStatus::InvalidArgument as i32;
        }
        let arc = match lookup(rt) {
            Ok(a) => a,
            Err(s) => return s as i32,
        };
        let mut shim = ffi_lock!(arc);
        let token = match shim.acquire(ArrayId(array)) {
            Ok(t) => t,
            Err(e) => return PinStatus::from(&e) as i32,
        };
        // SAFETY: all three pointers are valid per caller contract;
        // len_out is only written when non-null.
        unsafe {
            *token_out = token.serial();
            *ptr_out = token.ptr().as_ptr();
            if !len_out.is_null() {
                *len_out = token.len() as u64;
            }
        }
        PinStatus::Ok as i32
    })
}

/// End (or, with `PINSHIM_RELEASE_MODE_COMMIT`, publish) the pin on
/// `array` owned by `token`.
///
/// A release that does not match the held pin reports
/// `UnbalancedRelease`, `HandleMismatch` or `StaleToken` and leaves the
/// pin in place.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_release(rt: u64, array: u64, token: u64, mode: i32) -> i32 {
    ffi_guard!({
        let Some(mode) = ReleaseMode::from_raw(mode) else {
            return PinStatus::InvalidArgument as i32;
        };
        let arc = match lookup(rt) {
            Ok(a) => a,
            Err(s) => return s as i32,
        };
        let mut shim = ffi_lock!(arc);
        match shim.release_serial(ArrayId(array), token, mode) {
            Ok(()) => PinStatus::Ok as i32,
            Err(e) => PinStatus::from(&e) as i32,
        }
    })
}

/// Whether the runtime currently holds a pin. Writes 1 or 0 to `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_is_pinned_get(rt: u64, out: *mut u8) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return PinStatus::InvalidArgument as i32;
        }
        let arc = match lookup(rt) {
            Ok(a) => a,
            Err(s) => return s as i32,
        };
        let shim = ffi_lock!(arc);
        // SAFETY: out is non-null and valid per caller contract.
        unsafe { *out = u8::from(shim.is_pinned()) };
        PinStatus::Ok as i32
    })
}
