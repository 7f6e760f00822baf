use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Chunkbuf errors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// Invalid user input: bad argument combinations, ranges beyond a
    /// caller-supplied buffer, malformed configuration.
    InvalidInput(String),
    /// A logical index outside the addressable range of the sequence.
    OutOfRange(String),
    /// Growth would exceed the configured maximum capacity.
    CapacityExceeded {
        /// Total number of elements the operation would have required.
        requested: usize,
        /// The configured capacity ceiling.
        max: usize,
    },
    /// An IO error.
    IO(String),
    /// An operation was attempted on a closed stream.
    Closed,
    /// A write was attempted on a read-only stream.
    ReadOnly,
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::OutOfRange(msg) => write!(f, "index out of range: {msg}"),
            Error::CapacityExceeded { requested, max } => {
                write!(f, "capacity exceeded: requested {requested} elements, maximum {max}")
            }
            Error::IO(msg) => write!(f, "io error: {msg}"),
            Error::Closed => write!(f, "operation on a closed stream"),
            Error::ReadOnly => write!(f, "write attempted on a read-only stream"),
        }
    }
}

/// Constructs an Error::InvalidInput for the given format string.
#[macro_export]
macro_rules! errinput {
    ($($args:tt)*) => { $crate::error::Error::InvalidInput(format!($($args)*)).into() };
}

/// Constructs an Error::OutOfRange for the given format string.
#[macro_export]
macro_rules! errrange {
    ($($args:tt)*) => { $crate::error::Error::OutOfRange(format!($($args)*)).into() };
}

/// A chunkbuf Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<Error> for Result<T> {
    fn from(error: Error) -> Self {
        Err(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err.to_string())
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        let kind = match &err {
            Error::InvalidInput(_) | Error::OutOfRange(_) => ErrorKind::InvalidInput,
            Error::CapacityExceeded { .. } => ErrorKind::OutOfMemory,
            Error::IO(_) => ErrorKind::Other,
            Error::Closed => ErrorKind::BrokenPipe,
            Error::ReadOnly => ErrorKind::PermissionDenied,
        };
        std::io::Error::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::InvalidInput("count exceeds buffer".into()).to_string(),
            "invalid input: count exceeds buffer"
        );
        assert_eq!(
            Error::CapacityExceeded { requested: 10, max: 4 }.to_string(),
            "capacity exceeded: requested 10 elements, maximum 4"
        );
        assert_eq!(Error::Closed.to_string(), "operation on a closed stream");
    }

    #[test]
    fn test_macros_produce_results() {
        fn fails() -> Result<()> {
            errinput!("bad count {}", 3)
        }
        assert_eq!(fails(), Err(Error::InvalidInput("bad count 3".into())));

        fn out_of_range() -> Result<u8> {
            errrange!("index {} beyond length {}", 9, 4)
        }
        assert_eq!(
            out_of_range(),
            Err(Error::OutOfRange("index 9 beyond length 4".into()))
        );
    }

    #[test]
    fn test_io_error_round_trip_kinds() {
        let io: std::io::Error = Error::ReadOnly.into();
        assert_eq!(io.kind(), std::io::ErrorKind::PermissionDenied);
        let back: Error = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire").into();
        assert_eq!(back, Error::IO("disk on fire".into()));
    }
}
