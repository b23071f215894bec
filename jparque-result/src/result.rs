use crate::error::Error;

/// Result type alias used throughout JParque.
pub type Result<T> = std::result::Result<T, Error>;
