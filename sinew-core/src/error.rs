//! Error types.
//!
//! Stale node references are never errors: dead weak references are skipped
//! or discarded by the patch applier. Everything that can go wrong through the
//! public API is listed here.

use thiserror::Error;

use crate::reactive::Key;

/// Errors produced by state objects, the flush loop and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A sequence operation was used on a mapping.
    #[error("object is not a sequence")]
    NotASequence,

    /// A mapping operation was used on a sequence.
    #[error("object is not a mapping")]
    NotAMapping,

    /// Plain data used to build an object was a scalar.
    #[error("plain data is not a mapping or a sequence")]
    NotAnObject,

    /// A sequence write targeted an index past its end.
    #[error("index {index} out of bounds for sequence of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// The key cannot be written on this kind of object.
    #[error("key `{0}` cannot be written on this object")]
    InvalidKey(Key),

    /// `flush` was called from inside a running flush.
    #[error("a flush is already in progress")]
    FlushInProgress,

    /// The flush processed more changes than the configured limit.
    #[error("flush exceeded {limit} changes; remaining changes were dropped")]
    FlushOverflow { limit: usize },

    /// The runtime configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = Error::IndexOutOfBounds { index: 4, len: 2 };
        assert_eq!(
            err.to_string(),
            "index 4 out of bounds for sequence of length 2"
        );

        let err = Error::InvalidKey(Key::Length);
        assert_eq!(err.to_string(), "key `length` cannot be written on this object");
    }
}
