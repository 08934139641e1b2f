//! Error taxonomy shared by the bitmap engine and the iterator pipeline

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// A boxed error raised by a user delegate or an upstream source.
pub type FaultSource = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    /// A bit offset or a count parameter is outside the addressable range
    #[error("offset or count {0} is out of range")]
    OutOfRange(u64),

    /// A usage violation, e.g. reading the current item of an iterator that
    /// is not running
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// The iterator has been disposed; no further operation is possible
    #[error("the iterator has been disposed")]
    Disposed,

    /// The cancellation signal fired while a pull was pending
    #[error("the operation was cancelled")]
    Cancelled,

    /// An error surfaced from an upstream source or a user delegate,
    /// propagated unchanged after cleanup
    #[error("upstream fault: {0}")]
    Fault(#[source] FaultSource),

    /// Malformed compressed input (best-effort detection)
    #[error("malformed bitmap data: {0}")]
    Malformed(&'static str),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps an arbitrary error as an upstream fault
    pub fn fault<E>(source: E) -> Self
    where
        E: Into<FaultSource>,
    {
        Error::Fault(source.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
