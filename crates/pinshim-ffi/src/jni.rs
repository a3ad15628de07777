//! JVM entry points for `com.amazon.corretto.benchmark.hyperalloc.CriticalGC`.
//!
//! `acquire(byte[])` and `release(byte[])` share one process-wide
//! [`CriticalPin`] over `JniRuntime`, which drives the environment's
//! critical get/release pair (`isCopy` null, mode 0). The array is pinned
//! through a global reference taken before the critical region opens and
//! released through that same reference, so a release always closes the
//! region its acquire opened.
//!
//! Misuse of `release` is reported to Java as `IllegalStateException`. A
//! second `acquire` is refused but cannot throw: the thread is inside a
//! critical region, where no other JNI call is allowed. Debug builds log
//! the refusal on stderr.

use std::ffi::{c_void, CStr};
use std::ptr::{self, NonNull};
use std::sync::Mutex;

use jni_sys::{jbyteArray, jclass, jint, jobject, JNIEnv, JNINativeInterface_, JNI_FALSE};
use pinshim_core::{ArrayId, PinFailureCause, PinRuntime, RawRegion, ReleaseMode};
use pinshim_critical::CriticalPin;

static SLOT: Mutex<Option<CriticalPin<JniRuntime>>> = Mutex::new(None);

const ILLEGAL_STATE: &CStr = c"java/lang/IllegalStateException";

/// A `JNIEnv*` for the current native call.
#[derive(Clone, Copy)]
struct Env(*mut JNIEnv);

// Each wrapper requires that `self.0` is the calling thread's live
// environment and that the arguments are references valid in it.
#[allow(unsafe_code)]
impl Env {
    unsafe fn table(&self) -> &JNINativeInterface_ {
        &**self.0
    }

    unsafe fn new_global_ref(self, obj: jobject) -> jobject {
        match self.table().NewGlobalRef {
            Some(f) => f(self.0, obj),
            None => ptr::null_mut(),
        }
    }

    unsafe fn delete_global_ref(self, obj: jobject) {
        if let Some(f) = self.table().DeleteGlobalRef {
            f(self.0, obj);
        }
    }

    unsafe fn delete_local_ref(self, obj: jobject) {
        if let Some(f) = self.table().DeleteLocalRef {
            f(self.0, obj);
        }
    }

    unsafe fn array_length(self, array: jobject) -> usize {
        match self.table().GetArrayLength {
            Some(f) => usize::try_from(f(self.0, array)).unwrap_or(0),
            None => 0,
        }
    }

    unsafe fn get_critical(self, array: jobject) -> *mut c_void {
        match self.table().GetPrimitiveArrayCritical {
            Some(f) => f(self.0, array, ptr::null_mut()),
            None => ptr::null_mut(),
        }
    }

    unsafe fn release_critical(self, array: jobject, carray: *mut c_void, mode: jint) {
        if let Some(f) = self.table().ReleasePrimitiveArrayCritical {
            f(self.0, array, carray, mode);
        }
    }

    unsafe fn is_same_object(self, a: jobject, b: jobject) -> bool {
        match self.table().IsSameObject {
            Some(f) => f(self.0, a, b) != JNI_FALSE,
            None => false,
        }
    }

    /// Throw `IllegalStateException(msg)`. Must not be called inside a
    /// critical region.
    unsafe fn throw_illegal_state(self, msg: &CStr) {
        let Some(find_class) = self.table().FindClass else {
            return;
        };
        let class: jclass = find_class(self.0, ILLEGAL_STATE.as_ptr());
        if class.is_null() {
            // FindClass left NoClassDefFoundError pending.
            return;
        }
        if let Some(throw_new) = self.table().ThrowNew {
            throw_new(self.0, class, msg.as_ptr());
        }
        self.delete_local_ref(class);
    }
}

#[derive(Clone, Copy)]
struct Pinned {
    global: jobject,
    carray: *mut c_void,
}

/// [`PinRuntime`] over the calling thread's JNI environment.
///
/// `env` and `incoming` are installed by `enter` for the
/// duration of one entry-point call.
struct JniRuntime {
    env: Option<Env>,
    incoming: jobject,
    pinned: Option<Pinned>,
    released: Option<jobject>,
    next_array: u64,
}

// SAFETY: `env` and `incoming` are cleared by `leave` before the slot lock
// is released, so they never outlive the call that installed them. Global
// references and critical pointers may be used from any thread.
#[allow(unsafe_code)]
unsafe impl Send for JniRuntime {}

impl JniRuntime {
    fn new() -> Self {
        Self {
            env: None,
            incoming: ptr::null_mut(),
            pinned: None,
            released: None,
            next_array: 0,
        }
    }

    /// Install the call's environment and array; returns a fresh ID for it.
    fn enter(&mut self, env: Env, array: jobject) -> ArrayId {
        self.env = Some(env);
        self.incoming = array;
        self.next_array += 1;
        ArrayId(self.next_array)
    }

    fn leave(&mut self) {
        self.env = None;
        self.incoming = ptr::null_mut();
    }

    /// Global reference of the most recently ended pin, for the caller to
    /// check and delete once the critical region is closed.
    fn take_released(&mut self) -> Option<jobject> {
        self.released.take()
    }
}

// SAFETY: the region is the pointer returned by GetPrimitiveArrayCritical
// for a global reference that stays alive until the matching
// ReleasePrimitiveArrayCritical; the VM keeps it valid and unmoved until
// then.
#[allow(unsafe_code)]
unsafe impl PinRuntime for JniRuntime {
    fn pin_critical(&mut self, _array: ArrayId) -> Result<RawRegion, PinFailureCause> {
        let env = self.env.ok_or_else(|| PinFailureCause::Refused {
            reason: "no JNI environment installed".into(),
        })?;
        // SAFETY: `env` and `incoming` belong to the current native call.
        unsafe {
            let global = env.new_global_ref(self.incoming);
            if global.is_null() {
                return Err(PinFailureCause::InvalidHandle);
            }
            let len = env.array_length(global);
            let carray = env.get_critical(global);
            let Some(ptr) = NonNull::new(carray.cast::<u8>()) else {
                env.delete_global_ref(global);
                return Err(PinFailureCause::NoBackingStorage);
            };
            self.pinned = Some(Pinned { global, carray });
            Ok(RawRegion::new(ptr, len, false))
        }
    }

    fn unpin_critical(&mut self, _array: ArrayId, _region: RawRegion, mode: ReleaseMode) {
        let (Some(env), Some(pinned)) = (self.env, self.pinned) else {
            return;
        };
        // SAFETY: `pinned` is the reference/pointer pair from the matching
        // pin, and `env` belongs to the current native call.
        unsafe { env.release_critical(pinned.global, pinned.carray, mode as jint) };
        if !mode.keeps_pin() {
            self.pinned = None;
            self.released = Some(pinned.global);
        }
    }
}

/// Run `f` on the process-wide shim with `env`/`array` installed.
///
/// Returns `None` if an earlier panic poisoned the slot.
fn with_shim<T>(
    env: Env,
    array: jobject,
    f: impl FnOnce(&mut CriticalPin<JniRuntime>, ArrayId) -> T,
) -> Option<T> {
    let mut slot = SLOT.lock().ok()?;
    let shim = slot.get_or_insert_with(|| CriticalPin::new(JniRuntime::new()));
    let id = shim.runtime_mut().enter(env, array);
    let out = f(&mut *shim, id);
    shim.runtime_mut().leave();
    Some(out)
}

/// `static native void acquire(byte[] arr)`.
#[no_mangle]
#[allow(unsafe_code, non_snake_case)]
pub extern "system" fn Java_com_amazon_corretto_benchmark_hyperalloc_CriticalGC_acquire(
    env: *mut JNIEnv,
    _class: jclass,
    array: jbyteArray,
) {
    ffi_guard_or!((), {
        let result = with_shim(Env(env), array, |shim, id| shim.acquire(id).map(|_token| ()));
        #[cfg(debug_assertions)]
        {
            match &result {
                Some(Ok(())) => {}
                Some(Err(e)) => eprintln!("pinshim: CriticalGC.acquire refused: {e}"),
                None => eprintln!("pinshim: CriticalGC.acquire skipped, shim state poisoned"),
            }
        }
        #[cfg(not(debug_assertions))]
        let _ = result;
    })
}

/// `static native void release(byte[] arr)`.
#[no_mangle]
#[allow(unsafe_code, non_snake_case)]
pub extern "system" fn Java_com_amazon_corretto_benchmark_hyperalloc_CriticalGC_release(
    env: *mut JNIEnv,
    _class: jclass,
    array: jbyteArray,
) {
    ffi_guard_or!((), {
        let env = Env(env);
        let outcome = with_shim(env, array, |shim, id| {
            let released = shim.release_pinned(id, ReleaseMode::CopyBack);
            (released, shim.runtime_mut().take_released())
        });
        // The critical region is closed here, so JNI calls are allowed.
        // SAFETY: `env` is the caller's environment; `global` is the
        // reference taken by the matching acquire.
        unsafe {
            match outcome {
                None => {
                    env.throw_illegal_state(c"pinshim: shim state poisoned by an earlier panic")
                }
                Some((Err(_), _)) => {
                    env.throw_illegal_state(c"CriticalGC.release without a matching acquire")
                }
                Some((Ok(_), global)) => {
                    if let Some(global) = global {
                        let same = env.is_same_object(global, array);
                        env.delete_global_ref(global);
                        if !same {
                            env.throw_illegal_state(
                                c"CriticalGC.release called with a different array than acquire",
                            );
                        }
                    }
                }
            }
        }
    })
}
