//! Numerical primitives shared by the `echoconv` engine.
//!
//! The convolution here follows `numpy.convolve` in `full` mode: the second argument is
//! the kernel and the output holds every point of overlap.

#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

mod error;
pub mod num_rs;

pub use error::*;
