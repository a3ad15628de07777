//! The critical pin shim.
//!
//! [`CriticalPin`] wraps a [`PinRuntime`](pinshim_core::PinRuntime) and
//! tracks at most one pinned array at a time. It offers two surfaces over
//! the same two-state machine (Unpinned ⇄ Pinned):
//!
//! - **Token form**: [`CriticalPin::acquire`] returns a [`PinToken`] that
//!   [`CriticalPin::release`] requires. Used where the pin must outlive a
//!   lexical scope, e.g. across a C boundary.
//! - **Scoped form**: [`CriticalPin::pin`] returns a [`PinGuard`] that
//!   mutably borrows the shim and releases on every exit path.
//!
//! A second acquire while pinned, a release with nothing pinned, a release
//! naming the wrong array, and a release with an old token are all
//! reported as [`PinError`](pinshim_core::PinError)s and leave the state
//! untouched.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod guard;
pub mod shim;
pub mod state;

pub use guard::PinGuard;
pub use shim::CriticalPin;
pub use state::{PinCounters, PinState, PinToken};
