use std::io;
use thiserror::Error;

/// Unified error type for all JParque operations.
///
/// Absence is not an error: lookups for keys or records that do not exist
/// return `Ok(None)` (or an empty collection), never `Err`. The variants
/// below cover the genuine failure modes of the two engines.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the underlying file or a compression library.
    ///
    /// The source `io::Error` carries the detail (permission denied, disk
    /// full, unexpected EOF, ...).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// On-disk state that cannot be interpreted: magic mismatch, invalid
    /// page role, a cycle in an overflow chain, inconsistent sizes, or an
    /// unknown type tag in a header. The operation is aborted.
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// Invalid caller input, surfaced at serialize time: a missing required
    /// field, a wrong scalar type, or a repeated field that is not
    /// list-shaped.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A requested capability that this implementation deliberately does
    /// not provide, e.g. an unimplemented compression codec or an in-place
    /// value update of a different size.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An internal invariant was violated. Seeing this variant indicates a
    /// bug rather than bad input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for corruption errors built from formatted
    /// context.
    #[inline]
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    /// Convenience constructor for invalid-argument errors.
    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
