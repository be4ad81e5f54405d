use crate::kernel::{ConfigError, ExecInvariantViolation};
use core::fmt;

/// Errors raised whilst configuring or evaluating the convolution explorer.
///
/// Every variant rejects the mutation that produced it; the explorer keeps serving the last
/// valid configuration and its derived signals.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A sampling range with `max <= min` or a non-finite bound.
    InvalidDomain {
        /// Which range was being set, e.g. `x_range`.
        arg: &'static str,
        /// Requested lower bound.
        min: f64,
        /// Requested upper bound.
        max: f64,
    },
    /// A scalar setting or function argument outside its domain.
    InvalidParameter {
        /// Name of the setting or function.
        arg: &'static str,
        /// Explaining why the value is invalid.
        reason: String,
    },
    /// Formula text that does not parse.
    ExpressionSyntax {
        /// Byte offset into the formula.
        position: usize,
        /// What the parser expected.
        reason: String,
    },
    /// Formula references a name outside the fixed function registry.
    UnknownIdentifier {
        /// The offending name.
        name: String,
    },
    /// Arrays of incompatible length met in a formula or a buffer contract.
    LengthMismatch {
        /// Name of the argument.
        arg: &'static str,
        /// Required length.
        expected: usize,
        /// Received length.
        got: usize,
    },
    /// A kernel execution precondition failed.
    Exec(ExecInvariantViolation),
    /// The core convolution primitive failed.
    Conv {
        /// Backend error message.
        reason: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidDomain { arg, min, max } => {
                write!(f, "Invalid domain `{arg}`: [{min}, {max}] requires max > min")
            }
            Error::InvalidParameter { arg, reason } => {
                write!(f, "Invalid parameter `{arg}`: {reason}")
            }
            Error::ExpressionSyntax { position, reason } => {
                write!(f, "Syntax error at offset {position}: {reason}")
            }
            Error::UnknownIdentifier { name } => {
                write!(f, "Unknown identifier `{name}`")
            }
            Error::LengthMismatch { arg, expected, got } => {
                write!(
                    f,
                    "Length mismatch on `{arg}`. Expected {expected}, got {got}."
                )
            }
            Error::Exec(err) => write!(f, "{err}"),
            Error::Conv { reason } => write!(f, "Convolution failed: {reason}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Exec(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(value: ConfigError) -> Self {
        match value {
            ConfigError::InvalidDomain { arg, min, max } => Error::InvalidDomain { arg, min, max },
            ConfigError::InvalidArgument { arg, reason } => Error::InvalidParameter {
                arg,
                reason: reason.to_string(),
            },
            ConfigError::LengthMismatch { arg, expected, got } => {
                Error::LengthMismatch { arg, expected, got }
            }
            other => Error::Exec(ExecInvariantViolation::Config(other)),
        }
    }
}

impl From<ExecInvariantViolation> for Error {
    fn from(value: ExecInvariantViolation) -> Self {
        match value {
            ExecInvariantViolation::Config(err) => err.into(),
            other => Error::Exec(other),
        }
    }
}

impl From<echoconv_core::Error> for Error {
    fn from(value: echoconv_core::Error) -> Self {
        match value {
            echoconv_core::Error::Conv { reason } => Error::Conv { reason },
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_onto_the_taxonomy() {
        let err: Error = ConfigError::InvalidDomain {
            arg: "x_range",
            min: 2.0,
            max: 1.0,
        }
        .into();
        assert_eq!(
            err,
            Error::InvalidDomain {
                arg: "x_range",
                min: 2.0,
                max: 1.0
            }
        );

        let err: Error = ConfigError::InvalidArgument {
            arg: "echo_rate",
            reason: "echo rate must be positive",
        }
        .into();
        assert!(matches!(err, Error::InvalidParameter { arg: "echo_rate", .. }));
    }

    #[test]
    fn nested_config_violation_is_unwrapped() {
        let err: Error = ExecInvariantViolation::Config(ConfigError::LengthMismatch {
            arg: "out",
            expected: 3,
            got: 2,
        })
        .into();
        assert_eq!(
            err,
            Error::LengthMismatch {
                arg: "out",
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    fn display_names_the_offender() {
        let err = Error::UnknownIdentifier {
            name: "system".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown identifier `system`");
    }
}
