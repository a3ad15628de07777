//! pinshim: balanced critical pinning of managed arrays for native code.
//!
//! This is the facade crate that re-exports the public API from the
//! pinshim sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use pinshim::prelude::*;
//!
//! let mut heap = ManagedHeap::new(HeapConfig::with_capacity(4096)).unwrap();
//! let array = heap.allocate_from(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
//! let mut shim = CriticalPin::new(heap);
//!
//! // Scoped form: the guard releases on every exit path.
//! {
//!     let mut guard = shim.pin(array).unwrap();
//!     assert_eq!(guard.as_slice(), &[0xDE, 0xAD, 0xBE, 0xEF]);
//!     guard.as_mut_slice()[0] = 0x01;
//! }
//! assert_eq!(shim.runtime().read(array).unwrap()[0], 0x01);
//!
//! // Token form: the pin outlives any lexical scope until released.
//! let token = shim.acquire(array).unwrap();
//! assert!(matches!(shim.acquire(array), Err(PinError::AlreadyPinned { .. })));
//! shim.release(array, token).unwrap();
//! assert_eq!(shim.state(), PinState::Unpinned);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `pinshim-core` | IDs, regions, release modes, errors, `PinRuntime` |
//! | [`heap`] | `pinshim-heap` | Relocating reference heap |
//! | [`critical`] | `pinshim-critical` | The shim, tokens and guards |
//! | `ffi` | `pinshim-ffi` | C ABI and JNI entry points (feature `ffi`) |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and the host-runtime trait (`pinshim-core`).
///
/// Implement [`types::PinRuntime`] to put the shim in front of another
/// memory manager.
pub use pinshim_core as types;

/// Relocating managed byte-array heap (`pinshim-heap`).
pub use pinshim_heap as heap;

/// The critical pin shim (`pinshim-critical`).
pub use pinshim_critical as critical;

/// C ABI and JNI entry points (`pinshim-ffi`).
#[cfg(feature = "ffi")]
pub use pinshim_ffi as ffi;

/// Common imports for typical pinshim usage.
pub mod prelude {
    // Core
    pub use pinshim_core::{
        ArrayId, PinError, PinFailureCause, PinRuntime, RawRegion, ReleaseFault, ReleaseMode,
    };

    // Heap
    pub use pinshim_heap::{
        CollectOutcome, HeapConfig, HeapError, HeapStats, ManagedHeap, PinStrategy,
    };

    // Shim
    pub use pinshim_critical::{CriticalPin, PinCounters, PinGuard, PinState, PinToken};
}
