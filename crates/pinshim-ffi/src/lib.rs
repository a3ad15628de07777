//! C ABI for the pinshim critical pin shim.
//!
//! Configs and runtimes live behind slot+generation `u64` handles; arrays
//! are named by the heap's own IDs. Every entry point returns a
//! [`PinStatus`] as `i32` and converts panics into
//! [`PinStatus::Panicked`]. The panic message can be read back with
//! [`pinshim_last_panic_message`].
//!
//! With the `jni` feature the crate also exports the JVM entry points for
//! `com.amazon.corretto.benchmark.hyperalloc.CriticalGC`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

use std::any::Any;
use std::cell::RefCell;
use std::ffi::c_char;

thread_local! {
    /// Message of the most recent panic caught at the boundary on this thread.
    pub(crate) static LAST_PANIC: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Store a caught panic payload in [`LAST_PANIC`].
pub(crate) fn record_panic(payload: &(dyn Any + Send)) {
    let msg = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    };
    LAST_PANIC.with(|cell| *cell.borrow_mut() = msg);
}

/// Run `$body` under `catch_unwind`, returning `$default` if it panics.
///
/// `return` inside the body returns from the guarded closure, not from
/// the enclosing function.
macro_rules! ffi_guard_or {
    ($default:expr, $body:block) => {{
        match ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| $body)) {
            Ok(value) => value,
            Err(payload) => {
                $crate::record_panic(payload.as_ref());
                $default
            }
        }
    }};
}

/// [`ffi_guard_or!`] for status-returning entry points.
macro_rules! ffi_guard {
    ($body:block) => {
        ffi_guard_or!($crate::status::PinStatus::Panicked as i32, $body)
    };
}

/// Lock a mutex, returning `InternalError` from the guarded body if it
/// is poisoned.
macro_rules! ffi_lock {
    ($mutex:expr) => {
        match $mutex.lock() {
            Ok(guard) => guard,
            Err(_) => return $crate::status::PinStatus::InternalError as i32,
        }
    };
}

pub mod array;
pub mod config;
#[cfg(feature = "jni")]
pub mod jni;
pub mod pin;
pub mod runtime;
pub mod stats;
pub mod status;
pub mod types;

pub use stats::PinshimStats;
pub use status::PinStatus;
pub use types::{PinshimCollectOutcome, PinshimPinStrategy, PinshimReleaseMode};

/// Copy the last caught panic message on this thread into `buf`.
///
/// Returns the full message length in bytes (excluding the terminator),
/// `0` if no panic has been caught, or `-1` if the length does not fit in
/// an `i32`. At most `cap - 1` bytes are written, always followed by a
/// NUL. Pass a null `buf` or `cap == 0` to query the length only.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pinshim_last_panic_message(buf: *mut c_char, cap: usize) -> i32 {
    LAST_PANIC.with(|cell| {
        let msg = cell.borrow();
        let Ok(len) = i32::try_from(msg.len()) else {
            return -1;
        };
        if buf.is_null() || cap == 0 {
            return len;
        }
        let n = msg.len().min(cap - 1);
        // SAFETY: caller guarantees `buf` is valid for `cap` bytes, and
        // `n + 1 <= cap`.
        unsafe {
            std::ptr::copy_nonoverlapping(msg.as_ptr(), buf.cast::<u8>(), n);
            *buf.add(n) = 0;
        }
        len
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PinStatus;

    #[test]
    fn guard_passes_through_normal_result() {
        let status = ffi_guard!({ PinStatus::Ok as i32 });
        assert_eq!(status, 0);
    }

    #[test]
    fn guard_catches_panic_and_stores_message() {
        LAST_PANIC.with(|cell| cell.borrow_mut().clear());
        assert_eq!(pinshim_last_panic_message(std::ptr::null_mut(), 0), 0);

        let status = ffi_guard!({
            panic!("deliberate panic inside guarded body");
        });
        assert_eq!(status, PinStatus::Panicked as i32);

        let len = pinshim_last_panic_message(std::ptr::null_mut(), 0);
        assert!(len > 0);
        let mut buf = vec![0u8; len as usize + 1];
        let len2 = pinshim_last_panic_message(buf.as_mut_ptr().cast(), buf.len());
        assert_eq!(len, len2);
        let msg = std::str::from_utf8(&buf[..len2 as usize]).unwrap();
        assert_eq!(msg, "deliberate panic inside guarded body");
    }

    #[test]
    fn formatted_panic_message_is_captured() {
        let code = 7;
        let value = ffi_guard_or!(u8::MAX, {
            panic!("code {code}");
        });
        assert_eq!(value, u8::MAX);
        let mut buf = [0u8; 32];
        let len = pinshim_last_panic_message(buf.as_mut_ptr().cast(), buf.len());
        assert_eq!(&buf[..len as usize], b"code 7");
    }

    #[test]
    fn short_buffer_truncates_and_terminates() {
        let _ = ffi_guard!({
            panic!("0123456789");
        });
        let mut buf = [0xFFu8; 5];
        let len = pinshim_last_panic_message(buf.as_mut_ptr().cast(), buf.len());
        assert_eq!(len, 10);
        assert_eq!(&buf, b"0123\0");
    }
}
