//! Sampling, convolution and echo decomposition of the two explored signals.

mod convolve;
mod echo;
mod sampling;
/// Trait-first signal capabilities.
pub mod traits;

pub use convolve::*;
pub use echo::*;
pub use sampling::*;

use core::fmt;
use serde::{Deserialize, Serialize};

/// Which of the two signals a setting applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalId {
    /// The input signal `x(t)`.
    X,
    /// The impulse response `h(t)`.
    H,
}

impl SignalId {
    /// Both signals, x first.
    pub const ALL: [SignalId; 2] = [SignalId::X, SignalId::H];

    /// Lowercase name, `x` or `h`.
    pub fn as_str(self) -> &'static str {
        match self {
            SignalId::X => "x",
            SignalId::H => "h",
        }
    }

    pub(crate) fn range_arg(self) -> &'static str {
        match self {
            SignalId::X => "x_range",
            SignalId::H => "h_range",
        }
    }

    pub(crate) fn point_count_arg(self) -> &'static str {
        match self {
            SignalId::X => "x_point_count",
            SignalId::H => "h_point_count",
        }
    }

    pub(crate) fn expression_arg(self) -> &'static str {
        match self {
            SignalId::X => "x_expression",
            SignalId::H => "h_expression",
        }
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
