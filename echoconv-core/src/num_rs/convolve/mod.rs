use crate::{Error, Result};
use alloc::string::ToString;
use ndarray::{Array1, ArrayView1};
use ndarray_conv::{ConvExt, ConvMode, PaddingMode};

/// Discrete, linear convolution of two one-dimensional sequences, matching `numpy.convolve`
/// in its default `full` mode. `v` is taken as the convolution kernel.
///
/// # Parameters
/// * `a` : (N,) [[array_like]]([ndarray::Array1])
///   Signal to be (linearly) convolved.
/// * `v` : (M,) [[array_like]]([ndarray::Array1])
///   Kernel. Should not be longer than `a`; callers that cannot guarantee this swap the
///   operands, which is harmless since convolution commutes.
///
/// Returns the convolution at each point of overlap, with an output shape of (N+M-1,).
///
/// # Examples
/// ```
/// use ndarray::array;
/// use echoconv_core::num_rs::convolve;
///
/// let a = array![1., 2., 3.];
/// let v = array![0., 1., 0.5];
///
/// let expected = array![0., 1., 2.5, 4., 1.5];
/// let result = convolve((&a).into(), (&v).into()).unwrap();
/// assert_eq!(result, expected);
/// ```
/// A short kernel against a longer signal, the usual shape when x and h are sampled over
/// different ranges:
/// ```
/// use ndarray::array;
/// use echoconv_core::num_rs::convolve;
///
/// let a = array![1., 1., 1., 1.];
/// let v = array![1., -1.];
///
/// let result = convolve((&a).into(), (&v).into()).unwrap();
/// assert_eq!(result, array![1., 0., 0., 0., -1.]);
/// ```
pub fn convolve<T>(a: ArrayView1<T>, v: ArrayView1<T>) -> Result<Array1<T>>
where
    T: num_traits::NumAssign + core::marker::Copy,
{
    a.conv(&v, ConvMode::Full, PaddingMode::Zeros)
        .map_err(|e| Error::Conv {
            reason: e.to_string(),
        })
}
