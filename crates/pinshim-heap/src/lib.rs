//! Relocating managed byte-array heap for pinshim.
//!
//! [`ManagedHeap`] is the reference host runtime behind the shim. It
//! stores byte arrays, relocates every live array on collection, and
//! implements [`PinRuntime`](pinshim_core::PinRuntime) with the
//! critical-region discipline: while any critical region is open the
//! collector is locked out, and a collection requested in the meantime
//! runs when the last region closes.
//!
//! # Layout
//!
//! ```text
//! ManagedHeap
//! ├── HandleTable<HeapArray>   (ArrayId → boxed storage + pin count)
//! ├── IndexMap<(ArrayId, addr), Box<[u8]>>  (scratch copies, PinStrategy::Copy)
//! └── accounting               (live/dead bytes, critical depth, pending GC)
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod heap;
pub mod stats;

pub use config::{HeapConfig, PinStrategy};
pub use error::HeapError;
pub use heap::ManagedHeap;
pub use stats::{CollectOutcome, HeapStats};
