//! Sampling domains and the signals evaluated over them.

use crate::kernel::{ConfigError, KernelLifecycle};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Constructor config for [`SamplingKernel`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// First sample instant.
    pub min: f64,
    /// Last sample instant.
    pub max: f64,
    /// Number of samples, at least two.
    pub point_count: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 10.0,
            point_count: 1000,
        }
    }
}

/// A validated sampling domain `[min, max]` with `point_count` evenly spaced instants.
///
/// Two spacings are derived from the same interval and differ:
///
/// * [`SamplingKernel::spacing`] is the distance between neighbouring axis instants,
///   `(max - min) / (point_count - 1)`, because the axis includes both end points.
/// * [`SamplingKernel::step`] is `(max - min) / point_count`, the integration weight of one
///   sample and the unit of the echo stride.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingKernel {
    min: f64,
    max: f64,
    point_count: usize,
}

impl SamplingKernel {
    /// Return the first sample instant.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Return the last sample instant.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Return the number of samples.
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Integration weight of one sample.
    pub fn step(&self) -> f64 {
        (self.max - self.min) / self.point_count as f64
    }

    /// Distance between neighbouring axis instants.
    pub fn spacing(&self) -> f64 {
        (self.max - self.min) / (self.point_count - 1) as f64
    }

    /// Return the config this kernel was built from.
    pub fn config(&self) -> SamplingConfig {
        SamplingConfig {
            min: self.min,
            max: self.max,
            point_count: self.point_count,
        }
    }

    /// Allocate the time axis.
    pub fn axis(&self) -> Array1<f64> {
        Array1::linspace(self.min, self.max, self.point_count)
    }
}

impl KernelLifecycle for SamplingKernel {
    type Config = SamplingConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if !config.min.is_finite() || !config.max.is_finite() || config.max <= config.min {
            return Err(ConfigError::InvalidDomain {
                arg: "range",
                min: config.min,
                max: config.max,
            });
        }
        if config.point_count < 2 {
            return Err(ConfigError::InvalidArgument {
                arg: "point_count",
                reason: "point count must be at least 2",
            });
        }
        Ok(Self {
            min: config.min,
            max: config.max,
            point_count: config.point_count,
        })
    }
}

/// A time axis paired with the values of a formula evaluated on it.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledSignal {
    /// Sample instants.
    pub axis: Array1<f64>,
    /// Signal value at each instant.
    pub values: Array1<f64>,
}

impl SampledSignal {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` when the signal holds no samples.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of the first sample whose instant lies strictly after `t`.
    ///
    /// `None` when `t` precedes the first instant or no later instant exists; in both cases
    /// the signal has no sample to offer at `t`.
    pub fn index_after(&self, t: f64) -> Option<usize> {
        let axis = self.axis.as_slice()?;
        let first = *axis.first()?;
        if t < first {
            return None;
        }
        let idx = axis.partition_point(|&v| v <= t);
        (idx < axis.len()).then_some(idx)
    }
}
