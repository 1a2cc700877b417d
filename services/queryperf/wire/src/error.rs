//! Wire codec error types.

use thiserror::Error;

/// DNS wire errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Buffer ends before the structure being read
    #[error("truncated message: need {needed} bytes, have {actual}")]
    Truncated {
        /// Bytes required
        needed: usize,
        /// Bytes available
        actual: usize,
    },

    /// Empty label inside a name (e.g. `a..b`)
    #[error("empty label in name {0:?}")]
    EmptyLabel(String),

    /// Label longer than 63 bytes
    #[error("label too long ({0} bytes)")]
    LabelTooLong(usize),

    /// Encoded name longer than 255 bytes
    #[error("name too long ({0} bytes)")]
    NameTooLong(usize),

    /// Unrecognized record type mnemonic
    #[error("unknown record type {0:?}")]
    UnknownType(String),
}
