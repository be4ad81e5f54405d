use alloc::string::String;
use core::fmt;

/// Errors raised by the core numerical primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The convolution backend rejected its inputs.
    Conv {
        /// Backend error message.
        reason: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Conv { reason } => write!(f, "Convolution failed: {reason}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result alias for the core primitives.
pub type Result<T> = core::result::Result<T, Error>;
