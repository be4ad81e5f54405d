//! Discrete approximation of the convolution integral.
//!
//! The integral `∫ x(τ) h(t − τ) dτ` is approximated by the full discrete convolution of the
//! two sample sequences, each output sample weighted by x's step.
//!
//! The output axis starts at x's minimum and advances by x's step. This is exact only when x
//! and h share a step and h starts at zero. With independent ranges it is an approximation,
//! and it is the grid the echo reconstruction is compared on.

use crate::error::Result;
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read1D, Write1D};
use crate::signal::sampling::{SampledSignal, SamplingKernel};
use crate::signal::traits::Convolve1D;
use echoconv_core::num_rs;
use ndarray::{Array1, ArrayView1};

/// Constructor config for [`ConvolveKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvolveConfig {
    /// Weight applied to every output sample, the integration step.
    pub scale: f64,
}

impl Default for ConvolveConfig {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

/// Trait-first scaled full 1D convolution kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvolveKernel {
    scale: f64,
}

impl ConvolveKernel {
    /// Return configured output weight.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Output length for non-empty inputs of length `n` and `m`.
    pub fn output_len(&self, n: usize, m: usize) -> usize {
        n + m - 1
    }

    fn compute(&self, in1: &[f64], in2: &[f64]) -> Result<Array1<f64>> {
        // numpy takes the second operand as the kernel; keep the longer one as the signal.
        let (a, v) = if in1.len() >= in2.len() {
            (in1, in2)
        } else {
            (in2, in1)
        };
        let raw = num_rs::convolve(ArrayView1::from(a), ArrayView1::from(v))?;
        Ok(raw.mapv_into(|y| y * self.scale))
    }
}

impl KernelLifecycle for ConvolveKernel {
    type Config = ConvolveConfig;

    fn try_new(config: Self::Config) -> core::result::Result<Self, ConfigError> {
        if !config.scale.is_finite() || config.scale <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "scale",
                reason: "scale must be finite and > 0",
            });
        }
        Ok(Self {
            scale: config.scale,
        })
    }
}

fn read_pair<'a, I1, I2>(
    in1: &'a I1,
    in2: &'a I2,
) -> core::result::Result<(&'a [f64], &'a [f64]), ExecInvariantViolation>
where
    I1: Read1D<f64> + ?Sized,
    I2: Read1D<f64> + ?Sized,
{
    let in1 = in1.read_slice().map_err(ExecInvariantViolation::from)?;
    let in2 = in2.read_slice().map_err(ExecInvariantViolation::from)?;
    if in1.is_empty() || in2.is_empty() {
        return Err(ExecInvariantViolation::InvalidState {
            reason: "convolution inputs must be non-empty",
        });
    }
    Ok((in1, in2))
}

impl Convolve1D<f64> for ConvolveKernel {
    fn run_into<I1, I2, O>(
        &self,
        in1: &I1,
        in2: &I2,
        out: &mut O,
    ) -> core::result::Result<(), ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized,
        O: Write1D<f64> + ?Sized,
    {
        let (in1, in2) = read_pair(in1, in2)?;
        let out = out
            .write_slice_mut()
            .map_err(ExecInvariantViolation::from)?;
        let expected = self.output_len(in1.len(), in2.len());
        if out.len() != expected {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "out",
                expected,
                got: out.len(),
            });
        }
        let y = self
            .compute(in1, in2)
            .map_err(|_| ExecInvariantViolation::InvalidState {
                reason: "convolution backend rejected the inputs",
            })?;
        out.iter_mut().zip(y.iter()).for_each(|(o, v)| *o = *v);
        Ok(())
    }

    fn run_alloc<I1, I2>(
        &self,
        in1: &I1,
        in2: &I2,
    ) -> core::result::Result<Vec<f64>, ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized,
    {
        let (in1, in2) = read_pair(in1, in2)?;
        self.compute(in1, in2)
            .map(|y| y.to_vec())
            .map_err(|_| ExecInvariantViolation::InvalidState {
                reason: "convolution backend rejected the inputs",
            })
    }
}

/// Sampled approximation of `(x * h)(t)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvolutionResult {
    /// `axis[n] = min_x + n * step_x`.
    pub axis: Array1<f64>,
    /// Step-weighted full convolution of the two sample sequences.
    pub values: Array1<f64>,
}

impl ConvolutionResult {
    /// Number of output samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` when no output was produced.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of the output sample nearest to `t`, if `t` lies on the axis.
    pub fn index_of(&self, t: f64) -> Option<usize> {
        if self.axis.len() < 2 {
            return (self.axis.len() == 1).then_some(0);
        }
        let origin = self.axis[0];
        let step = self.axis[1] - origin;
        let idx = ((t - origin) / step).round();
        if !idx.is_finite() || idx < 0.0 || idx >= self.axis.len() as f64 {
            return None;
        }
        Some(idx as usize)
    }

    /// Value at the output sample nearest to `t`.
    pub fn value_at(&self, t: f64) -> Option<f64> {
        self.index_of(t).map(|idx| self.values[idx])
    }
}

/// Convolve two sampled signals, weighting by x's step and laying the output on x's grid.
pub fn convolve_signals(
    x_domain: &SamplingKernel,
    x: &SampledSignal,
    h: &SampledSignal,
) -> Result<ConvolutionResult> {
    let kernel = ConvolveKernel::try_new(ConvolveConfig {
        scale: x_domain.step(),
    })?;
    let mut values = Array1::<f64>::zeros(kernel.output_len(x.len(), h.len()));
    kernel.run_into(&x.values, &h.values, &mut values)?;
    let step = x_domain.step();
    let axis = Array1::from_iter((0..values.len()).map(|n| x_domain.min() + n as f64 * step));
    Ok(ConvolutionResult { axis, values })
}
