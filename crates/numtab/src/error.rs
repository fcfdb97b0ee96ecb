//! Error types shared by every table, tensor and serialization operation.

use thiserror::Error;

use crate::codec::{DeserializeError, SerializeError};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by numtab operations.
///
/// Every error is reported synchronously at the offending call. Nothing in
/// the crate retries internally.
#[derive(Debug, Error)]
pub enum Error {
    /// An index or count lies outside valid bounds.
    ///
    /// Detected before any memory access; ranges are never clamped.
    #[error("{what} {index} out of range (bound {bound})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        bound: usize,
    },

    /// Structural mismatch between composed objects or between a buffer
    /// and the shape it should fill.
    #[error("{what} mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Operation attempted on a packed or disposed object, or an invalid
    /// state transition.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// The layout does not support the requested operation or kind.
    #[error("unsupported conversion: {0}")]
    UnsupportedConversion(String),

    /// Backing storage could not be allocated.
    #[error("allocation of {elements} elements failed")]
    AllocationFailure { elements: usize },

    /// Key lookup in a keyed collection failed.
    #[error("key {0} not found")]
    KeyNotFound(i64),

    /// Encoding an object to bytes failed.
    #[error(transparent)]
    Serialize(#[from] SerializeError),

    /// Decoding an object from bytes failed.
    #[error(transparent)]
    Deserialize(#[from] DeserializeError),
}

impl Error {
    pub(crate) fn out_of_range(what: &'static str, index: usize, bound: usize) -> Self {
        Self::OutOfRange { what, index, bound }
    }

    pub(crate) fn mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }
}

/// Check that `[start, start + count)` fits in `len` items.
///
/// Overflowing ranges are reported as out of range.
pub(crate) fn check_range(what: &'static str, start: usize, count: usize, len: usize) -> Result<()> {
    match start.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        Some(end) => Err(Error::out_of_range(what, end, len)),
        None => Err(Error::out_of_range(what, usize::MAX, len)),
    }
}

/// Check that `index < len`.
pub(crate) fn check_index(what: &'static str, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(Error::out_of_range(what, index, len))
    }
}
