//! Strongly-typed identifiers.

use std::fmt;

/// Identifies a runtime-managed byte array.
///
/// Opaque to the shim: the host runtime decides the encoding. The
/// reference heap uses the slot+generation encoding of
/// [`HandleTable`](crate::HandleTable), so a freed array's ID never
/// resolves again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(pub u64);

impl fmt::Display for ArrayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ArrayId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
