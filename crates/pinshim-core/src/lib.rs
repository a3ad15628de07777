//! Core types and traits for pinshim.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by every other crate in the workspace: array IDs,
//! pinned regions, release modes, error types, the slot+generation
//! [`HandleTable`], and the [`PinRuntime`] trait through which a host
//! runtime exposes its critical pin/unpin pair.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod error;
pub mod handle;
pub mod id;
pub mod region;
pub mod traits;

pub use error::{PinError, PinFailureCause, ReleaseFault};
pub use handle::HandleTable;
pub use id::ArrayId;
pub use region::{RawRegion, ReleaseMode};
pub use traits::PinRuntime;
