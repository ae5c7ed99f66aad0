//! Defines [`Error`], representing all errors returned by this crate.
use std::fmt::{Debug, Display, Formatter};

/// Enum with all errors in this crate.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Returned when functionality is not yet available.
    NotYetImplemented(String),
    /// Wrapper for an error triggered by a dependency
    External(String, Box<dyn std::error::Error + Send + Sync>),
    /// Wrapper for IO errors
    Io(std::io::Error),
    /// When an invalid argument is passed to a function.
    InvalidArgumentError(String),
    /// Error during import or export to/from an external format
    OutOfSpec(String),
    /// The schema of a message differs from the one declared for the stream or file
    SchemaMismatch(String),
    /// A nested type exceeded the maximum allowed nesting depth
    RecursionLimit(usize),
    /// Error while compressing or decompressing a body buffer
    Compression(String),
    /// A length does not fit in the 32-bit limit of the format
    SizeLimit(String),
    /// Whenever pushing to a container fails because it does not support more entries.
    Overflow,
}

impl Error {
    /// Wraps an external error in an `Error`.
    pub fn from_external_error(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::External("".to_string(), Box::new(error))
    }

    pub(crate) fn oos<A: Into<String>>(msg: A) -> Self {
        Self::OutOfSpec(msg.into())
    }

    pub(crate) fn nyi<A: Into<String>>(msg: A) -> Self {
        Self::NotYetImplemented(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(error: std::str::Utf8Error) -> Self {
        Error::External("".to_string(), Box::new(error))
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Error {
        Error::Overflow
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotYetImplemented(source) => {
                write!(f, "Not yet implemented: {}", &source)
            }
            Error::External(message, source) => {
                write!(f, "External error{}: {}", message, &source)
            }
            Error::Io(desc) => write!(f, "Io error: {}", desc),
            Error::InvalidArgumentError(desc) => {
                write!(f, "Invalid argument error: {}", desc)
            }
            Error::OutOfSpec(message) => {
                write!(f, "{}", message)
            }
            Error::SchemaMismatch(desc) => write!(f, "Schema mismatch: {}", desc),
            Error::RecursionLimit(depth) => {
                write!(f, "Nesting depth exceeds the maximum of {}", depth)
            }
            Error::Compression(desc) => write!(f, "Compression error: {}", desc),
            Error::SizeLimit(desc) => write!(f, "Size limit exceeded: {}", desc),
            Error::Overflow => {
                write!(f, "Operation overflew the backing container.")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Typedef for a [`std::result::Result`] of an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
