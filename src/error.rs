use std::collections::TryReserveError;
use std::{error, fmt};

/// Errors reported by fallible tree operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The arena could not grow to hold another node.
    AllocFailed(TryReserveError),
    /// Every slot addressable by the index type is in use.
    IndexExhausted,
    /// The handle is stale, vacant, out of range, or points at the sentinel.
    InvalidHandle,
    /// A deserialized arena does not form a valid red-black tree.
    CorruptLayout(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::AllocFailed(err) => write!(f, "node allocation failed: {err}"),
            Error::IndexExhausted => write!(f, "reached maximum number of nodes"),
            Error::InvalidHandle => write!(f, "handle does not refer to a live node"),
            Error::CorruptLayout(reason) => write!(f, "corrupt tree layout: {reason}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::AllocFailed(err) => Some(err),
            Error::IndexExhausted | Error::InvalidHandle | Error::CorruptLayout(_) => None,
        }
    }
}

impl From<TryReserveError> for Error {
    fn from(err: TryReserveError) -> Self {
        Error::AllocFailed(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
