//! Error types shared by construction, querying and serialization.

use std::io;
use thiserror::Error;

/// Failures surfaced by the index core.
///
/// Builds are whole-or-nothing: no error here is retried internally.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Malformed parenthesized tree input (unbalanced parens, missing or
    /// invalid label byte, trailing garbage).
    #[error("invalid tree input: {0}")]
    InvalidTree(String),

    /// The forest exceeds what 32-bit node indices can address.
    #[error("forest has {0} nodes; 32-bit node indices overflow, rebuild with wider indices")]
    TooManyNodes(u64),

    /// A ranked-child lookup outside the node's degree. Programmer error.
    #[error("ranked child {k} requested from a node of degree {degree}")]
    OutOfRange { k: u64, degree: u64 },

    /// The file does not start with the index magic tag.
    #[error("not a TBWT index file (bad magic); check the filename or rebuild the index")]
    BadMagic,

    /// The file carries an index format version this build cannot read.
    #[error("unsupported index version {0}; rebuild the index")]
    VersionMismatch(u32),

    /// The file ended in the middle of a field.
    #[error("unexpected end of index file; rebuild the index")]
    Truncated,

    /// Any other I/O failure during save or load.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Maps read errors to `Truncated` when the file ran out mid-field.
pub(crate) fn read_error(e: io::Error) -> IndexError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        IndexError::Truncated
    } else {
        IndexError::Io(e)
    }
}
