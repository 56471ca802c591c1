//! Error type shared by every writer component.
use thiserror::Error;

/// Main error type for spreadsheet writing.
///
/// Running out of buffer space is deliberately absent: it is reported as
/// [`WriteOutcome::InsufficientSpace`](crate::WriteOutcome) and absorbed by
/// the spreadsheet's flush-and-retry path.
#[derive(Error, Debug)]
pub enum Error {
    /// The destination stream rejected a write. The document is abandoned.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// API misuse, such as writing a row with no worksheet open.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Input rejected before any bytes were written.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A previous write failed or was cancelled mid-flush.
    #[error("Spreadsheet is unusable after a failed or cancelled write")]
    Poisoned,

    /// Archive limits exceeded.
    #[error("ZIP error: {0}")]
    Zip(String),
}

impl Error {
    pub(crate) fn invalid_operation(msg: impl Into<String>) -> Self {
        Error::InvalidOperation(msg.into())
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Whether the error leaves the output in an unknown state.
    ///
    /// Argument and operation errors are raised before anything is written,
    /// so the document stays usable after them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Zip(_) | Error::Poisoned)
    }
}

/// Result type for spreadstream operations.
pub type Result<T> = std::result::Result<T, Error>;
