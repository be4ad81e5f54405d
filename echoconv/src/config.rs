//! Plain configuration records for the explorer.
//!
//! These carry no validation of their own; [`crate::explorer::ConvolutionExplorer`] validates
//! a whole record before committing it.

use crate::error::{Error, Result};
use crate::signal::{SamplingConfig, SignalId};
use serde::{Deserialize, Serialize};

/// Input pulse shown when the explorer starts.
pub const DEFAULT_X_EXPRESSION: &str = "hstack((zeros(200), ones(300), zeros(500)))";
/// Impulse response shown when the explorer starts.
pub const DEFAULT_H_EXPRESSION: &str = "exp(-t)";

/// Sampling domain and formula of one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Range and point count.
    pub domain: SamplingConfig,
    /// Formula over `t`.
    pub expression: String,
}

/// Everything the explorer derives its state from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Input signal.
    pub x: SignalConfig,
    /// Impulse response.
    pub h: SignalConfig,
    /// Evaluation point of the echo decomposition.
    pub tau: f64,
    /// Echoes per x range; `echo_points = floor(x.point_count / echo_rate)`.
    pub echo_rate: f64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            x: SignalConfig {
                domain: SamplingConfig::default(),
                expression: DEFAULT_X_EXPRESSION.to_string(),
            },
            h: SignalConfig {
                domain: SamplingConfig::default(),
                expression: DEFAULT_H_EXPRESSION.to_string(),
            },
            tau: 1.0,
            echo_rate: 1.0,
        }
    }
}

impl ExplorerConfig {
    /// Borrow one signal's settings.
    pub fn signal(&self, signal: SignalId) -> &SignalConfig {
        match signal {
            SignalId::X => &self.x,
            SignalId::H => &self.h,
        }
    }

    /// Mutably borrow one signal's settings.
    pub fn signal_mut(&mut self, signal: SignalId) -> &mut SignalConfig {
        match signal {
            SignalId::X => &mut self.x,
            SignalId::H => &mut self.h,
        }
    }

    /// Parse a config from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| Error::InvalidParameter {
            arg: "config",
            reason: err.to_string(),
        })
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| Error::InvalidParameter {
            arg: "config",
            reason: err.to_string(),
        })
    }
}
