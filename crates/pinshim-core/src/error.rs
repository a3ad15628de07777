//! Error types for pin acquisition and release.
//!
//! Two contract violations exist at the boundary: a pin that cannot be
//! established ([`PinError::PinFailure`]) and a release with no matching
//! acquire ([`PinError::UnbalancedRelease`]). A second acquire while a pin
//! is held is reported as [`PinError::AlreadyPinned`] instead of silently
//! replacing the held pointer.

use std::error::Error;
use std::fmt;

use crate::id::ArrayId;

/// Why the host runtime could not pin an array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PinFailureCause {
    /// The array handle does not name a live array.
    InvalidHandle,
    /// The array has no backing storage that can be exposed.
    NoBackingStorage,
    /// The runtime declined the pin for a runtime-specific reason.
    Refused {
        /// Human-readable description from the runtime.
        reason: String,
    },
}

impl fmt::Display for PinFailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle => write!(f, "invalid array handle"),
            Self::NoBackingStorage => write!(f, "no backing storage"),
            Self::Refused { reason } => write!(f, "refused: {reason}"),
        }
    }
}

impl Error for PinFailureCause {}

/// Why a release did not match the held pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseFault {
    /// Nothing is pinned.
    NotPinned,
    /// A different array is pinned. The held pin is left intact.
    HandleMismatch {
        /// The array actually pinned.
        pinned: ArrayId,
    },
    /// The token belongs to an earlier pin.
    StaleToken,
}

impl fmt::Display for ReleaseFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPinned => write!(f, "nothing is pinned"),
            Self::HandleMismatch { pinned } => write!(f, "array {pinned} is pinned instead"),
            Self::StaleToken => write!(f, "token is from an earlier pin"),
        }
    }
}

/// Errors from the critical pin shim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PinError {
    /// The runtime could not establish the pin.
    PinFailure {
        /// The array that was requested.
        array: ArrayId,
        /// What the runtime reported.
        cause: PinFailureCause,
    },
    /// A release did not match the held pin.
    UnbalancedRelease {
        /// The array named by the release.
        array: ArrayId,
        /// How the release failed to match.
        fault: ReleaseFault,
    },
    /// An acquire arrived while a pin is already held.
    AlreadyPinned {
        /// The array currently pinned.
        held: ArrayId,
    },
}

impl PinError {
    /// The array named by the failing call.
    pub fn array(&self) -> ArrayId {
        match self {
            Self::PinFailure { array, .. } | Self::UnbalancedRelease { array, .. } => *array,
            Self::AlreadyPinned { held } => *held,
        }
    }
}

impl fmt::Display for PinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PinFailure { array, cause } => {
                write!(f, "cannot pin array {array}: {cause}")
            }
            Self::UnbalancedRelease { array, fault } => {
                write!(f, "unbalanced release of array {array}: {fault}")
            }
            Self::AlreadyPinned { held } => {
                write!(f, "array {held} is already pinned")
            }
        }
    }
}

impl Error for PinError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PinFailure { cause, .. } => Some(cause),
            _ => None,
        }
    }
}
