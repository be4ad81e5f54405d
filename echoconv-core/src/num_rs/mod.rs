//! Ports of the numpy routines the engine relies on.

mod convolve;

pub use convolve::*;
