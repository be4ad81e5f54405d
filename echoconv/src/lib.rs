//! Reconstruct the convolution integral of two sampled signals.
//!
//! `echoconv` samples two formulas, x(t) and h(t), over independent ranges, convolves them,
//! and splits the convolution at an evaluation point `tau` into weighted, shifted copies of
//! h ("echoes") whose running sum approaches the convolution value.
//!
//! ```
//! use echoconv::{ConvolutionExplorer, SignalId};
//!
//! let mut explorer = ConvolutionExplorer::new();
//! explorer.set_expression(SignalId::H, "exp(-2 * t)").unwrap();
//! explorer.set_echo_rate(1000.0).unwrap();
//! explorer.set_tau(3.0).unwrap();
//!
//! let decomposition = explorer.decompose();
//! let exact = explorer.convolution_at_tau().unwrap();
//! assert!((decomposition.running_sum - exact).abs() < 0.02);
//! ```

/// Explorer configuration records
pub mod config;
/// Error taxonomy
pub mod error;
/// Explorer state
pub mod explorer;
/// Sandboxed formula evaluation
pub mod expr;
/// Shared kernel substrate
pub mod kernel;
/// Debug plotting through a Python subprocess
pub mod plot;
/// Sampling, convolution and echo decomposition
pub mod signal;

pub use config::{ExplorerConfig, SignalConfig};
pub use error::{Error, Result};
pub use explorer::ConvolutionExplorer;
pub use expr::Expression;
pub use signal::SignalId;

pub use ndarray;
