//! Reconstruction of the convolution integral as a sum of weighted, shifted copies of h.
//!
//! For an evaluation point `tau` the integral is split into echoes spaced `echo_points`
//! samples of x apart. Echo `k` is h, scaled by `x[k * echo_points]` and shifted to the
//! instant that sample stands for; where it crosses `tau` it contributes one rectangle of
//! width `echo_points * step_x` to the running sum.

use crate::error::{Error, Result};
use crate::kernel::{ConfigError, KernelLifecycle};
use crate::signal::sampling::{SampledSignal, SamplingKernel};
use ndarray::Array1;
use num_traits::ToPrimitive;

/// Samples of x between neighbouring echoes for a given echo rate.
///
/// `floor(point_count / rate)`; fails unless the rate is finite, positive and leaves at
/// least one sample per echo.
pub fn echo_points_for_rate(point_count: usize, rate: f64) -> Result<usize> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(Error::InvalidParameter {
            arg: "echo_rate",
            reason: format!("echo rate must be finite and > 0, got {rate}"),
        });
    }
    match (point_count as f64 / rate).floor().to_usize() {
        Some(points) if points >= 1 => Ok(points),
        _ => Err(Error::InvalidParameter {
            arg: "echo_rate",
            reason: format!("echo rate {rate} leaves no sample of {point_count} per echo"),
        }),
    }
}

/// Number of echoes between `min_x` and `tau`, `floor((tau - min_x) / (step_x * echo_points))`.
///
/// Zero when `tau` does not lie past `min_x`. A count that does not fit in `usize` is an
/// [`Error::InvalidParameter`] on `tau`.
pub fn echo_count(tau: f64, min_x: f64, step_x: f64, echo_points: usize) -> Result<usize> {
    let stride = step_x * echo_points as f64;
    let count = ((tau - min_x) / stride).floor();
    if count <= 0.0 {
        return Ok(0);
    }
    count.to_usize().ok_or_else(|| Error::InvalidParameter {
        arg: "tau",
        reason: format!("tau {tau} lies {count} echoes past {min_x}, too many to count"),
    })
}

/// Most echoes one decomposition of `x` and `h` builds: one per sample of their full
/// convolution.
pub fn max_echo_count(x: &SampledSignal, h: &SampledSignal) -> usize {
    (x.len() + h.len()).saturating_sub(1)
}

/// Echo positions `tau - k * echo_points * step_x` for every echo in [`echo_count`].
///
/// The count is not bounded here; [`EchoKernel::shifts`] caps it at [`max_echo_count`].
pub fn compute_echo_shifts(
    tau: f64,
    min_x: f64,
    step_x: f64,
    echo_points: usize,
) -> Result<Vec<f64>> {
    let count = echo_count(tau, min_x, step_x, echo_points)?;
    Ok(shifts_from(tau, step_x * echo_points as f64, count))
}

fn shifts_from(tau: f64, stride: f64, count: usize) -> Vec<f64> {
    (0..count).map(|k| tau - k as f64 * stride).collect()
}

/// Height of one echo where it crosses `tau`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intersection {
    /// `weight * h[idx(tau - origin)]`.
    Value(f64),
    /// `tau - origin` precedes h's first sample or has no later sample, or the echo lies
    /// past the end of x. The echo adds nothing to the running sum.
    OutOfRange,
}

impl Intersection {
    /// The height, if the echo crosses `tau` inside h.
    pub fn value(self) -> Option<f64> {
        match self {
            Intersection::Value(value) => Some(value),
            Intersection::OutOfRange => None,
        }
    }

    pub fn is_in_range(self) -> bool {
        matches!(self, Intersection::Value(_))
    }
}

/// One weighted, shifted copy of h.
#[derive(Debug, Clone, PartialEq)]
pub struct EchoTerm {
    /// Echo number `k`.
    pub index: usize,
    /// `tau - k * echo_points * step_x`.
    pub shift: f64,
    /// Instant of the x sample this echo stands for, `min_x + (tau - shift)`.
    pub origin: f64,
    /// `x[k * echo_points]`, or zero past the end of x.
    pub weight: f64,
    /// h's axis moved to start at `origin`.
    pub shifted_axis: Array1<f64>,
    /// h's values scaled by `weight`.
    pub weighted_values: Array1<f64>,
    /// Height of the echo where it crosses `tau`.
    pub intersection: Intersection,
}

impl EchoTerm {
    /// Area this echo adds to the running sum.
    pub fn contribution(&self, echo_points: usize, step_x: f64) -> f64 {
        self.intersection.value().unwrap_or(0.0) * echo_points as f64 * step_x
    }
}

/// All echoes at one evaluation point and their running sum.
#[derive(Debug, Clone, PartialEq)]
pub struct EchoDecomposition {
    /// Evaluation point.
    pub tau: f64,
    /// Samples of x between neighbouring echoes.
    pub echo_points: usize,
    /// x's integration step.
    pub step_x: f64,
    /// One entry per echo, nearest to `tau` first.
    pub terms: Vec<EchoTerm>,
    /// Sum of every term's contribution.
    pub running_sum: f64,
    /// Convolution sample nearest to `tau`, when it was available for comparison.
    pub convolution_value: Option<f64>,
}

impl EchoDecomposition {
    /// Running sum after each echo.
    pub fn partial_sums(&self) -> Vec<f64> {
        self.terms
            .iter()
            .scan(0.0, |acc, term| {
                *acc += term.contribution(self.echo_points, self.step_x);
                Some(*acc)
            })
            .collect()
    }

    /// `convolution_value - running_sum`.
    pub fn discrepancy(&self) -> Option<f64> {
        self.convolution_value.map(|value| value - self.running_sum)
    }

    /// Attach the convolution sample the running sum approximates.
    pub fn with_convolution_value(mut self, value: Option<f64>) -> Self {
        self.convolution_value = value;
        self
    }
}

/// Constructor config for [`EchoKernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoConfig {
    /// Samples of x between neighbouring echoes.
    pub echo_points: usize,
}

/// Builds [`EchoDecomposition`]s for a fixed echo spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoKernel {
    echo_points: usize,
}

impl EchoKernel {
    /// Return the configured echo spacing.
    pub fn echo_points(&self) -> usize {
        self.echo_points
    }

    /// Echo positions at `tau`.
    ///
    /// Fails on `tau` when it needs more than [`max_echo_count`] echoes.
    pub fn shifts(
        &self,
        tau: f64,
        x_domain: &SamplingKernel,
        x: &SampledSignal,
        h: &SampledSignal,
    ) -> Result<Vec<f64>> {
        let count = echo_count(tau, x_domain.min(), x_domain.step(), self.echo_points)?;
        let limit = max_echo_count(x, h);
        if count > limit {
            return Err(Error::InvalidParameter {
                arg: "tau",
                reason: format!(
                    "tau {tau} needs {count} echoes, more than the {limit} convolution samples"
                ),
            });
        }
        Ok(shifts_from(
            tau,
            x_domain.step() * self.echo_points as f64,
            count,
        ))
    }

    /// Decompose the convolution of `x` and `h` at `tau`.
    pub fn decompose(
        &self,
        tau: f64,
        x_domain: &SamplingKernel,
        x: &SampledSignal,
        h: &SampledSignal,
    ) -> Result<EchoDecomposition> {
        let shifts = self.shifts(tau, x_domain, x, h)?;
        Ok(self.decompose_at(tau, &shifts, x_domain, x, h))
    }

    /// Build one term per entry of `shifts`, as returned by [`EchoKernel::shifts`].
    pub fn decompose_at(
        &self,
        tau: f64,
        shifts: &[f64],
        x_domain: &SamplingKernel,
        x: &SampledSignal,
        h: &SampledSignal,
    ) -> EchoDecomposition {
        let step_x = x_domain.step();
        let terms: Vec<EchoTerm> = shifts
            .iter()
            .copied()
            .enumerate()
            .map(|(k, shift)| {
                let origin = x_domain.min() + (tau - shift);
                let weight = x
                    .values
                    .get(k * self.echo_points)
                    .copied()
                    .unwrap_or(0.0);
                let intersection = (k * self.echo_points < x.len())
                    .then(|| h.index_after(tau - origin))
                    .flatten()
                    .map_or(Intersection::OutOfRange, |idx| {
                        Intersection::Value(weight * h.values[idx])
                    });
                log::trace!(
                    "echo {k}: shift={shift:.6} origin={origin:.6} weight={weight} intersection={intersection:?}"
                );
                EchoTerm {
                    index: k,
                    shift,
                    origin,
                    weight,
                    shifted_axis: &h.axis + origin,
                    weighted_values: &h.values * weight,
                    intersection,
                }
            })
            .collect();
        let running_sum = terms
            .iter()
            .map(|term| term.contribution(self.echo_points, step_x))
            .sum();
        EchoDecomposition {
            tau,
            echo_points: self.echo_points,
            step_x,
            terms,
            running_sum,
            convolution_value: None,
        }
    }
}

impl KernelLifecycle for EchoKernel {
    type Config = EchoConfig;

    fn try_new(config: Self::Config) -> core::result::Result<Self, ConfigError> {
        if config.echo_points == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "echo_points",
                reason: "echo spacing must be at least one sample",
            });
        }
        Ok(Self {
            echo_points: config.echo_points,
        })
    }
}
