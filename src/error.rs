//! Error types for serial sessions

use std::io;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Every way a session operation can fail
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value was out of range. Nothing was sent to the device.
    #[error("invalid {parameter}: {value}")]
    InvalidParameter {
        parameter: &'static str,
        value: String,
    },

    /// The device driver reported a failure
    #[error("failed to {operation}: {source}")]
    Device {
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    /// A read or write deadline elapsed
    #[error("operation timed out")]
    Timeout,

    /// The session has already been closed
    #[error("serial session is closed")]
    Closed,

    /// A response pattern failed to compile
    #[error("malformed pattern #{index} {pattern:?}: {source}")]
    MalformedPattern {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The device transferred no data where one byte was expected
    #[error("device returned no data")]
    ShortRead,
}

impl Error {
    pub(crate) fn invalid(parameter: &'static str, value: impl ToString) -> Self {
        Error::InvalidParameter {
            parameter,
            value: value.to_string(),
        }
    }

    /// Wrap a driver I/O error, folding `TimedOut` into [`Error::Timeout`].
    pub(crate) fn device(operation: &'static str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::TimedOut {
            Error::Timeout
        } else {
            Error::Device { operation, source }
        }
    }

    /// Whether this error is a deadline expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Device { source, .. } => source.kind(),
            Error::Timeout => io::ErrorKind::TimedOut,
            Error::Closed => io::ErrorKind::NotConnected,
            Error::InvalidParameter { .. } | Error::MalformedPattern { .. } => {
                io::ErrorKind::InvalidInput
            }
            Error::ShortRead => io::ErrorKind::UnexpectedEof,
        };
        io::Error::new(kind, err)
    }
}
