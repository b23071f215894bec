//! Error and result definitions shared by every JParque crate.
//!
//! All fallible operations across the workspace return [`Result<T>`], with a
//! single [`Error`] enum rather than crate-specific error types. Errors
//! propagate naturally with `?` across crate boundaries, and callers can
//! match on variants when they need programmatic handling.

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
