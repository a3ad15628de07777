//! Array FFI: allocate, free, and copy bytes in and out of a runtime's
//! heap.

use pinshim_core::ArrayId;

use crate::runtime::lookup;
use crate::status::PinStatus;

/// Allocate a zeroed array of `len` bytes. Returns its handle via `out`.
///
/// May run a collection first; fails with `CollectionBlocked` if one is
/// needed while a pin is held.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_array_alloc(rt: u64, len: u64, out: *mut u64) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return PinStatus::InvalidArgument as i32;
        }
        let Ok(len) = usize::try_from(len) else {
            return PinStatus::ArrayTooLarge as i32;
        };
        let arc = match lookup(rt) {
            Ok(a) => a,
            Err(s) => return s as i32,
        };
        let mut shim = ffi_lock!(arc);
        match shim.runtime_mut().allocate(len) {
            Ok(array) => {
                // SAFETY: out is non-null and valid per caller contract.
                unsafe { *out = array.0 };
                PinStatus::Ok as i32
            }
            Err(e) => PinStatus::from(&e) as i32,
        }
    })
}

/// Free an array. Fails with `ArrayPinned` while it is pinned.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_array_free(rt: u64, array: u64) -> i32 {
    ffi_guard!({
        let arc = match lookup(rt) {
            Ok(a) => a,
            Err(s) => return s as i32,
        };
        let mut shim = ffi_lock!(arc);
        match shim.runtime_mut().free(ArrayId(array)) {
            Ok(()) => PinStatus::Ok as i32,
            Err(e) => PinStatus::from(&e) as i32,
        }
    })
}

/// Length of an array in bytes, written to `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_array_len_get(rt: u64, array: u64, out: *mut u64) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return PinStatus::InvalidArgument as i32;
        }
        let arc = match lookup(rt) {
            Ok(a) => a,
            Err(s) => return s as i32,
        };
        let shim = ffi_lock!(arc);
        match shim.runtime().len(ArrayId(array)) {
            Ok(len) => {
                // SAFETY: out is non-null and valid per caller contract.
                unsafe { *out = len as u64 };
                PinStatus::Ok as i32
            }
            Err(e) => PinStatus::from(&e) as i32,
        }
    })
}

/// Copy the whole array into `buf`, which must hold at least its length.
///
/// `buf` may be null only for an empty array.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_array_read(rt: u64, array: u64, buf: *mut u8, cap: usize) -> i32 {
    ffi_guard!({
        let arc = match lookup(rt) {
            Ok(a) => a,
            Err(s) => return s as i32,
        };
        let shim = ffi_lock!(arc);
        let bytes = match shim.runtime().read(ArrayId(array)) {
            Ok(b) => b,
            Err(e) => return PinStatus::from(&e) as i32,
        };
        if bytes.is_empty() {
            return PinStatus::Ok as i32;
        }
        if buf.is_null() {
            return PinStatus::InvalidArgument as i32;
        }
        if cap < bytes.len() {
            return PinStatus::BufferTooSmall as i32;
        }
        // SAFETY: buf is non-null and valid for `cap >= bytes.len()` bytes
        // per caller contract, and cannot overlap heap storage.
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf, bytes.len()) };
        PinStatus::Ok as i32
    })
}

/// Copy `n` bytes from `data` into the array at `offset`.
///
/// `data` may be null only when `n == 0`. Fails with `ArrayPinned` while
/// the array is pinned; write through the acquired pointer instead.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_array_write(
    rt: u64,
    array: u64,
    offset: u64,
    data: *const u8,
    n: usize,
) -> i32 {
    ffi_guard!({
        if data.is_null() && n > 0 {
            return PinStatus::InvalidArgument as i32;
        }
        let Ok(offset) = usize::try_from(offset) else {
            return PinStatus::OutOfBounds as i32;
        };
        let arc = match lookup(rt) {
            Ok(a) => a,
            Err(s) => return s as i32,
        };
        let mut shim = ffi_lock!(arc);
        let src: &[u8] = if n == 0 {
            &[]
        } else {
            // SAFETY: data is non-null and valid for `n` bytes per caller
            // contract.
            unsafe { std::slice::from_raw_parts(data, n) }
        };
        match shim.runtime_mut().write(ArrayId(array), offset, src) {
            Ok(()) => PinStatus::Ok as i32,
            Err(e) => PinStatus::from(&e) as i32,
        }
    })
}
